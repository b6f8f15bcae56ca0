//! etsc: declarative UI component compiler
//!
//! Compiles `struct`-based UI components written in the ArkTS dialect into
//! JavaScript classes that drive the `ViewPU`/`ViewV2` (or whole-render
//! `View`) runtime.
//!
//! # Basic Usage
//!
//! ```no_run
//! use etsc::{compile_file, Result};
//!
//! fn main() -> Result<()> {
//!     compile_file("pages/Index.ets", "build/Index.js")?;
//!     Ok(())
//! }
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Lexer & Parser** - tokenize and build the syntax tree
//! 2. **Registry** - collect components, builders, styles and extends
//! 3. **Validation** - reject malformed structs, report diagnostics
//! 4. **Lowering** - classify fields, synthesize wrappers, lower `build()`
//! 5. **Printing** - emit JavaScript with the bootstrap call

pub mod ast;
pub mod builder;
pub mod cli;
pub mod component;
pub mod control_flow;
pub mod custom_component;
pub mod decorator;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod reactive;
pub mod render;
pub mod semantic;
pub mod tables;
pub mod transform;
pub mod wrapper;

use serde::Serialize;
use std::time::Instant;

pub use cli::EnhancedCli;
pub use decorator::{ComponentFlavor, WrapperKind};
pub use error::{CompilerError, Diagnostic, Diagnostics, Result, Severity};
pub use lexer::{Lexer, Token, TokenType};
pub use parser::{parse_source, Parser};
pub use semantic::SemanticAnalyzer;
pub use tables::ComponentTables;
pub use transform::{transform_program, RenderMode, TransformOptions, TransformOutput};

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Compilation options and settings
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Target runtime
    pub mode: RenderMode,

    /// Page path for named-route registration; defaults to the file stem
    pub page_path: Option<String>,

    /// Route name for an `@Entry` that names none
    pub route_name: Option<String>,

    pub bundle_name: String,
    pub module_name: String,

    /// Emit the surviving declarations even when some were rejected
    pub allow_partial: bool,

    /// Enable debug mode with extra logging
    pub debug_mode: bool,

    /// Maximum allowed file size in bytes (0 = no limit)
    pub max_file_size: u64,

    /// Pass `{ page, line, col }` to child constructors
    pub emit_source_position: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            mode: RenderMode::Partial,
            page_path: None,
            route_name: None,
            bundle_name: String::new(),
            module_name: String::new(),
            allow_partial: false,
            debug_mode: false,
            max_file_size: 0,
            emit_source_position: true,
        }
    }
}

impl CompilerOptions {
    pub fn transform_options(&self, filename: &str) -> TransformOptions {
        TransformOptions {
            mode: self.mode,
            page_path: self
                .page_path
                .clone()
                .unwrap_or_else(|| transform::file_stem(filename)),
            route_name: self.route_name.clone(),
            bundle_name: self.bundle_name.clone(),
            module_name: self.module_name.clone(),
            emit_source_position: self.emit_source_position,
        }
    }
}

/// Compilation statistics and metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationStats {
    /// Source size in bytes
    pub source_size: u64,

    /// Generated JavaScript size in bytes
    pub output_size: u64,

    pub source_lines: usize,

    /// Number of top-level declarations parsed
    pub item_count: usize,

    /// Number of component structs emitted
    pub component_count: usize,

    /// Number of global `@Builder` functions
    pub builder_count: usize,

    pub error_count: usize,
    pub warning_count: usize,

    /// Compilation time in milliseconds
    pub compile_time_ms: u64,
}

/// Generated code together with what was found along the way.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub code: String,
    pub diagnostics: Diagnostics,
    pub stats: CompilationStats,
}

/// Main compiler entry point with default options
pub fn compile_file(input_path: &str, output_path: &str) -> Result<CompilationStats> {
    compile_file_with_options(input_path, output_path, &CompilerOptions::default())
}

/// Compile with custom options
pub fn compile_file_with_options(
    input_path: &str,
    output_path: &str,
    options: &CompilerOptions,
) -> Result<CompilationStats> {
    let start_time = Instant::now();

    if options.debug_mode {
        log::info!("{} v{}", NAME, VERSION);
        log::info!("Compiling '{}' to '{}'...", input_path, output_path);
        log::debug!("Compiler options: {:?}", options);
    }

    let source = read_source(input_path)?;
    let output = compile_source_with_options(&source, input_path, options)?;
    let output = reject_errors(output, options)?;

    if let Some(parent) = std::path::Path::new(output_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(output_path, &output.code)?;

    let mut stats = output.stats;
    stats.compile_time_ms = start_time.elapsed().as_millis() as u64;

    if options.debug_mode {
        log::info!("Compilation successful!");
        log::info!("Source size: {} bytes", stats.source_size);
        log::info!("Output size: {} bytes", stats.output_size);
        log::info!("Compile time: {}ms", stats.compile_time_ms);
        log::debug!("Full stats: {:?}", stats);
    }

    Ok(stats)
}

/// Compile source text with default options, failing on any error diagnostic
pub fn compile_source(source: &str, filename: &str) -> Result<String> {
    let options = CompilerOptions::default();
    let output = compile_source_with_options(source, filename, &options)?;
    Ok(reject_errors(output, &options)?.code)
}

/// Compile source text. Recoverable findings come back in
/// [`CompileOutput::diagnostics`]; only unparseable input fails.
pub fn compile_source_with_options(source: &str, filename: &str, options: &CompilerOptions) -> Result<CompileOutput> {
    let start_time = Instant::now();
    check_size(source, filename, options)?;

    log::debug!("Parsing {} ({} bytes)", filename, source.len());
    let program = parse_source(source, filename)?;

    let tables = ComponentTables::standard();
    let transform_options = options.transform_options(filename);
    let output = transform_program(&program, &tables, &transform_options, filename);

    for diagnostic in output.diagnostics.iter() {
        match diagnostic.severity {
            Severity::Warning => log::warn!("{}", diagnostic),
            Severity::Error => log::debug!("{}", diagnostic),
        }
    }

    let stats = CompilationStats {
        source_size: source.len() as u64,
        output_size: output.code.len() as u64,
        source_lines: source.lines().count(),
        item_count: program.items.len(),
        component_count: output.components,
        builder_count: program
            .items
            .iter()
            .filter(|item| matches!(item, ast::Item::Function(f) if f.has_decorator("Builder")))
            .count(),
        error_count: output.diagnostics.error_count(),
        warning_count: output.diagnostics.warning_count(),
        compile_time_ms: start_time.elapsed().as_millis() as u64,
    };

    Ok(CompileOutput {
        code: output.code,
        diagnostics: output.diagnostics,
        stats,
    })
}

/// Parses and validates without keeping the generated code.
pub fn check_source(source: &str, filename: &str, options: &CompilerOptions) -> Result<Diagnostics> {
    Ok(compile_source_with_options(source, filename, options)?.diagnostics)
}

fn reject_errors(output: CompileOutput, options: &CompilerOptions) -> Result<CompileOutput> {
    if options.allow_partial {
        return Ok(output);
    }
    match output.diagnostics.first_error() {
        Some(err) => Err(err),
        None => Ok(output),
    }
}

fn check_size(source: &str, filename: &str, options: &CompilerOptions) -> Result<()> {
    if options.max_file_size > 0 && source.len() as u64 > options.max_file_size {
        return Err(CompilerError::InvalidFormat {
            message: format!(
                "{} is {} bytes, above the {} byte limit",
                filename,
                source.len(),
                options.max_file_size
            ),
        });
    }
    Ok(())
}

fn read_source(path: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| CompilerError::FileNotFound {
        path: format!("{}: {}", path, e),
    })
}

/// Classification of one field, as reported by `analyze`.
#[derive(Debug, Clone, Serialize)]
pub struct FieldAnalysis {
    pub name: String,
    pub kind: &'static str,
    pub watch: Option<String>,
    pub require: bool,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentAnalysis {
    pub name: String,
    pub flavor: ComponentFlavor,
    pub entry: bool,
    pub reusable: bool,
    pub custom_dialog: bool,
    pub fields: Vec<FieldAnalysis>,
    pub builder_methods: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileAnalysis {
    pub file: String,
    pub components: Vec<ComponentAnalysis>,
    pub builders: Vec<String>,
    pub diagnostics: Diagnostics,
}

/// Per-component classification of a source file.
pub fn analyze_source(source: &str, filename: &str) -> Result<FileAnalysis> {
    let program = parse_source(source, filename)?;
    let registry = transform::Registry::collect(&program, filename);
    let validation = semantic::validate(&program, &registry, filename);

    let mut components = Vec::new();
    for item in &program.items {
        let decl = match item {
            ast::Item::Struct(decl) => decl,
            _ => continue,
        };
        let (summary, info) = match (
            registry.components.get(&decl.name),
            decorator::classify_component(decl, filename),
        ) {
            (Some(summary), Ok(info)) => (summary, info),
            _ => continue,
        };
        let mut builder_methods: Vec<String> = summary.builder_methods.keys().cloned().collect();
        builder_methods.sort();
        components.push(ComponentAnalysis {
            name: decl.name.clone(),
            flavor: info.flavor,
            entry: info.is_entry(),
            reusable: info.reusable,
            custom_dialog: info.custom_dialog,
            fields: summary
                .fields
                .iter()
                .map(|field| FieldAnalysis {
                    name: field.name.clone(),
                    kind: field.kind.label(),
                    watch: field.watch.clone(),
                    require: field.require,
                    line: field.pos.line,
                })
                .collect(),
            builder_methods,
        });
    }

    let mut builders: Vec<String> = registry.builders.keys().cloned().collect();
    builders.sort();

    Ok(FileAnalysis {
        file: filename.to_string(),
        components,
        builders,
        diagnostics: validation.diagnostics,
    })
}

/// Analyze a file on disk
pub fn analyze_file(path: &str) -> Result<FileAnalysis> {
    let source = read_source(path)?;
    analyze_source(&source, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const COUNTER: &str = "@Entry
@Component
struct Counter {
  @State count: number = 0
  build() {
    Column() {
      Text(`${this.count}`)
      Button('+').onClick(() => { this.count++ })
    }
  }
}
";

    #[test]
    fn test_compile_counter_scenario() {
        let code = compile_source(COUNTER, "Counter.ets").unwrap();
        assert!(code.starts_with("\"use strict\";\n"));
        assert!(code.contains("class Counter extends ViewPU {"));
        assert!(code.contains("this.__count = new ObservedPropertySimplePU(0, this, \"count\");"));
        assert!(code.contains("Button.createWithLabel('+');"));
        assert!(code.contains("Button.onClick(() => {\n                this.count++;\n            });"));
        assert!(code.contains("Button.pop();"));
        assert!(code.contains("loadDocument(new Counter(undefined, {}));"));
    }

    #[test]
    fn test_compile_is_idempotent() {
        let first = compile_source(COUNTER, "Counter.ets").unwrap();
        let second = compile_source(COUNTER, "Counter.ets").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_errors_fail_unless_partial_allowed() {
        let source = "@Component\nstruct Broken {\n}\n@Component\nstruct Fine {\n  build() {\n  }\n}\n";
        assert!(compile_source(source, "Index.ets").is_err());

        let options = CompilerOptions {
            allow_partial: true,
            ..CompilerOptions::default()
        };
        let output = compile_source_with_options(source, "Index.ets", &options).unwrap();
        assert!(output.code.contains("class Fine extends ViewPU"));
        assert!(!output.code.contains("class Broken"));
        assert_eq!(output.stats.error_count, 1);
        assert_eq!(output.stats.component_count, 1);
    }

    #[test]
    fn test_max_file_size() {
        let options = CompilerOptions {
            max_file_size: 10,
            ..CompilerOptions::default()
        };
        let err = compile_source_with_options(COUNTER, "Counter.ets", &options).unwrap_err();
        assert!(matches!(err, CompilerError::InvalidFormat { .. }));
    }

    #[test]
    fn test_compile_file_writes_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("Counter.ets");
        let output = dir.path().join("out").join("Counter.js");
        std::fs::write(&input, COUNTER).unwrap();

        let stats = compile_file(input.to_str().unwrap(), output.to_str().unwrap()).unwrap();
        assert_eq!(stats.component_count, 1);
        assert_eq!(stats.output_size, std::fs::metadata(&output).unwrap().len());
    }

    #[test]
    fn test_missing_input() {
        let err = compile_file("/nonexistent/Index.ets", "/tmp/out.js").unwrap_err();
        assert!(matches!(err, CompilerError::FileNotFound { .. }));
    }

    #[test]
    fn test_analyze_reports_classification() {
        let analysis = analyze_source(COUNTER, "Counter.ets").unwrap();
        assert_eq!(analysis.components.len(), 1);
        let counter = &analysis.components[0];
        assert!(counter.entry);
        assert_eq!(counter.fields.len(), 1);
        assert_eq!(counter.fields[0].kind, "State");
        let json = serde_json::to_string(&analysis).unwrap();
        assert!(json.contains("\"kind\":\"State\""));
    }
}
