use crate::error::{CompilerError, Result};
use crate::RenderMode;
use serde::{Deserialize, Serialize};
use std::fs;

/// Project settings read from `--config`. Command-line flags win over
/// anything set here.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub mode: Option<RenderMode>,
    pub page_path: Option<String>,
    pub route_name: Option<String>,
    pub bundle_name: Option<String>,
    pub module_name: Option<String>,
    pub allow_partial: Option<bool>,
    pub emit_source_position: Option<bool>,
    pub max_file_size: Option<u64>,
    pub output_directory: Option<String>,
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("Config file {}: {}", config_path, e),
    })?;

    let config = if config_path.ends_with(".json") {
        serde_json::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })?
    } else if config_path.ends_with(".toml") {
        toml::from_str(&config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })?
    } else {
        return Err(CompilerError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        });
    };
    log::info!("Loaded configuration from {}", config_path);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etsc.toml");
        fs::write(&path, "mode = \"full\"\nbundle_name = \"com.example\"\nallow_partial = true\n").unwrap();

        let config = load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.mode, Some(RenderMode::Full));
        assert_eq!(config.bundle_name.as_deref(), Some("com.example"));
        assert_eq!(config.allow_partial, Some(true));
        assert!(config.route_name.is_none());
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etsc.json");
        fs::write(&path, r#"{"module_name": "entry", "max_file_size": 4096}"#).unwrap();

        let config = load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.module_name.as_deref(), Some("entry"));
        assert_eq!(config.max_file_size, Some(4096));
    }

    #[test]
    fn test_rejects_unknown_extension_and_bad_mode() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("etsc.yaml");
        fs::write(&yaml, "mode: full\n").unwrap();
        assert!(load(yaml.to_str().unwrap()).is_err());

        let toml_path = dir.path().join("bad.toml");
        fs::write(&toml_path, "mode = \"fast\"\n").unwrap();
        assert!(matches!(
            load(toml_path.to_str().unwrap()),
            Err(CompilerError::InvalidFormat { .. })
        ));
    }
}
