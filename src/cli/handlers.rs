use super::{EnhancedCli, OutputFormat};
use crate::{
    analyze_file, check_source, compile_file_with_options, CompilationStats, CompilerError, CompilerOptions,
    Diagnostics, FileAnalysis, Result,
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Instant;

fn input_arg(matches: &clap::ArgMatches) -> Result<&String> {
    matches.get_one::<String>("input").ok_or_else(|| CompilerError::InvalidFormat {
        message: "missing input path".to_string(),
    })
}

fn watch_error(context: &str, err: notify::Error) -> CompilerError {
    CompilerError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("{}: {}", context, err),
    ))
}

/// `Index.ets` compiles to `Index.js`, next to the input or under the
/// configured output directory.
fn default_output_path(input_path: &str, output_directory: Option<&str>) -> String {
    let js = Path::new(input_path).with_extension("js");
    match (output_directory, js.file_name()) {
        (Some(dir), Some(name)) => PathBuf::from(dir).join(name).to_string_lossy().into_owned(),
        _ => js.to_string_lossy().into_owned(),
    }
}

// --- COMPILE ---
pub fn handle_compile_command(cli: &EnhancedCli, matches: &clap::ArgMatches) -> Result<()> {
    let input_path = input_arg(matches)?;
    let output_path = matches
        .get_one::<String>("output")
        .cloned()
        .unwrap_or_else(|| default_output_path(input_path, cli.output_directory()));

    let options = cli.build_compiler_options(matches)?;

    if matches.get_flag("watch") {
        watch_and_compile(input_path, &output_path, &options)
    } else {
        compile_single_file(input_path, &output_path, &options, matches.get_flag("stats"))
    }
}

fn compile_single_file(input_path: &str, output_path: &str, options: &CompilerOptions, show_stats: bool) -> Result<()> {
    println!("🔨 Compiling {} -> {}", input_path, output_path);

    let compile_start = Instant::now();
    let stats = compile_file_with_options(input_path, output_path, options)?;
    let compile_time = compile_start.elapsed();

    println!("✅ Compilation successful!");
    println!("   Components: {}", stats.component_count);
    println!("   Output: {} bytes", stats.output_size);
    println!("   Time: {:.2}ms", compile_time.as_millis());
    if stats.warning_count > 0 {
        println!("   ⚠️  {} warnings", stats.warning_count);
    }
    if stats.error_count > 0 {
        println!("   ⚠️  {} declarations skipped", stats.error_count);
    }

    if show_stats {
        print_detailed_stats(&stats);
    }
    Ok(())
}

fn watch_and_compile(input_path: &str, output_path: &str, options: &CompilerOptions) -> Result<()> {
    println!("👀 Watching {} for changes...", input_path);

    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if let Err(e) = tx.send(event) {
                    eprintln!("Watch error: {}", e);
                }
            }
        },
        notify::Config::default(),
    )
    .map_err(|e| watch_error("Failed to create file watcher", e))?;

    watcher
        .watch(Path::new(input_path), RecursiveMode::NonRecursive)
        .map_err(|e| watch_error("Failed to watch file", e))?;

    match compile_file_with_options(input_path, output_path, options) {
        Ok(_) => println!("✅ Initial compilation successful"),
        Err(e) => eprintln!("❌ Initial compilation failed: {}", e),
    }

    loop {
        match rx.recv() {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    continue;
                }
                println!("🔄 File changed, recompiling...");
                match compile_file_with_options(input_path, output_path, options) {
                    Ok(stats) => println!(
                        "✅ Recompiled successfully ({} bytes, {}ms)",
                        stats.output_size, stats.compile_time_ms
                    ),
                    Err(e) => eprintln!("❌ Compilation failed: {}", e),
                }
            }
            Err(e) => {
                eprintln!("Watch error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

fn print_detailed_stats(stats: &CompilationStats) {
    println!("\n📊 Detailed Statistics:");
    println!("   Source: {} bytes, {} lines", stats.source_size, stats.source_lines);
    println!("   Output: {} bytes", stats.output_size);
    println!("   Declarations: {}", stats.item_count);
    println!("   Components: {}", stats.component_count);
    println!("   Global builders: {}", stats.builder_count);
    println!("   Errors: {}", stats.error_count);
    println!("   Warnings: {}", stats.warning_count);
    println!("   Compile time: {}ms", stats.compile_time_ms);
}

// --- CHECK ---
pub fn handle_check_command(cli: &EnhancedCli, matches: &clap::ArgMatches) -> Result<()> {
    let input_path = input_arg(matches)?;
    let recursive = matches.get_flag("recursive");
    let options = cli.config_options();

    let result = if recursive && Path::new(input_path).is_dir() {
        check_directory_recursive(input_path, &options)
    } else {
        check_single_file(Path::new(input_path), &options).map(|_| ())
    };
    log::debug!("check finished in {}ms", cli.elapsed_ms());
    result
}

fn check_file(path: &Path, options: &CompilerOptions) -> Result<Diagnostics> {
    let source = std::fs::read_to_string(path).map_err(|e| CompilerError::FileNotFound {
        path: format!("{}: {}", path.display(), e),
    })?;
    check_source(&source, &path.to_string_lossy(), options)
}

/// Returns whether the file is free of errors.
fn check_single_file(path: &Path, options: &CompilerOptions) -> Result<bool> {
    println!("🔍 Checking {}", path.display());
    match check_file(path, options) {
        Ok(diagnostics) => {
            for diagnostic in diagnostics.iter() {
                println!("   {}", diagnostic);
            }
            if diagnostics.has_errors() {
                println!("❌ {} - {} errors", path.display(), diagnostics.error_count());
                Ok(false)
            } else {
                println!("✅ {} - No issues found", path.display());
                Ok(true)
            }
        }
        Err(e) => {
            println!("❌ {} - {}", path.display(), e);
            Err(e)
        }
    }
}

fn collect_sources(dir_path: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir_path).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            CompilerError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Directory traversal error: {}", e),
            ))
        })?;
        if entry.file_type().is_file() && entry.path().extension().map_or(false, |ext| ext == "ets") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn check_directory_recursive(dir_path: &str, options: &CompilerOptions) -> Result<()> {
    let files = collect_sources(dir_path)?;
    let total_files = files.len();
    let mut error_files = 0;

    for path in &files {
        if !matches!(check_single_file(path, options), Ok(true)) {
            error_files += 1;
        }
    }

    println!("\n📊 Check Summary:");
    println!("   Total files: {}", total_files);
    println!("   Files with errors: {}", error_files);
    if total_files > 0 {
        println!(
            "   Success rate: {:.1}%",
            (total_files - error_files) as f64 / total_files as f64 * 100.0
        );
    }

    if error_files > 0 {
        Err(CompilerError::Semantic {
            file: dir_path.to_string(),
            line: 0,
            message: format!("{} files have errors", error_files),
        })
    } else {
        Ok(())
    }
}

// --- ANALYZE ---
pub fn handle_analyze_command(matches: &clap::ArgMatches) -> Result<()> {
    let input_path = input_arg(matches)?;
    let output_path = matches.get_one::<String>("output");
    let format = matches.get_one::<OutputFormat>("format").copied().unwrap_or(OutputFormat::Debug);

    println!("🔬 Analyzing {}", input_path);

    let analysis = analyze_file(input_path)?;
    let rendered = render_analysis(&analysis, format)?;
    if let Some(output_file) = output_path {
        std::fs::write(output_file, rendered)?;
        println!("✅ Analysis saved to {}", output_file);
    } else {
        println!("{}", rendered);
    }
    Ok(())
}

fn render_analysis(analysis: &FileAnalysis, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(analysis).map_err(|e| CompilerError::CodeGen {
            message: format!("JSON serialization error: {}", e),
        }),
        OutputFormat::Debug => Ok(format!("File Analysis: {}\n\n{:#?}", analysis.file, analysis)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VALID: &str = "@Component\nstruct RowView {\n  build() {\n  }\n}\n";
    const INVALID: &str = "@Component\nstruct RowView {\n}\n";

    #[test]
    fn test_default_output_path() {
        assert_eq!(default_output_path("pages/Index.ets", None), "pages/Index.js");
        assert_eq!(default_output_path("pages/Index.ets", Some("build")), "build/Index.js");
    }

    #[test]
    fn test_collect_sources_only_ets() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("pages/sub")).unwrap();
        std::fs::write(dir.path().join("pages/A.ets"), VALID).unwrap();
        std::fs::write(dir.path().join("pages/sub/B.ets"), VALID).unwrap();
        std::fs::write(dir.path().join("pages/readme.md"), "# no").unwrap();

        let files = collect_sources(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().unwrap() == "ets"));
    }

    #[test]
    fn test_check_directory_counts_failures() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Good.ets"), VALID).unwrap();
        let options = CompilerOptions::default();
        assert!(check_directory_recursive(dir.path().to_str().unwrap(), &options).is_ok());

        std::fs::write(dir.path().join("Bad.ets"), INVALID).unwrap();
        assert!(check_directory_recursive(dir.path().to_str().unwrap(), &options).is_err());
    }

    #[test]
    fn test_render_analysis_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("RowView.ets");
        std::fs::write(&path, VALID).unwrap();
        let analysis = analyze_file(path.to_str().unwrap()).unwrap();
        let json = render_analysis(&analysis, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["components"][0]["name"], "RowView");
        assert_eq!(value["components"][0]["flavor"], "V1");
    }
}
