//! Structural validation
//!
//! Runs before lowering and decides which structs can be emitted. A struct
//! with a classification error, a missing or duplicated `build`, or a
//! constructor is rejected; its siblings are still compiled.

use crate::ast::*;
use crate::decorator::{classify_component, classify_field, classify_method, ComponentInfo};
use crate::error::Diagnostics;
use crate::transform::{attribute_chain, Registry};
use log::debug;
use regex::Regex;
use std::collections::HashSet;

/// Shape of a named route: path-like segments of word characters.
const ROUTE_NAME_PATTERN: &str = r"^[A-Za-z0-9_][A-Za-z0-9_./-]*$";

#[derive(Debug, Default)]
pub struct Validation {
    pub diagnostics: Diagnostics,
    /// Structs that must not be emitted.
    pub rejected: HashSet<String>,
}

pub struct SemanticAnalyzer<'a> {
    file: &'a str,
    registry: &'a Registry,
    route_pattern: Option<Regex>,
    entries: Vec<(String, Pos)>,
    result: Validation,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(registry: &'a Registry, file: &'a str) -> Self {
        Self {
            file,
            registry,
            route_pattern: Regex::new(ROUTE_NAME_PATTERN).ok(),
            entries: Vec::new(),
            result: Validation::default(),
        }
    }

    pub fn analyze(mut self, program: &Program) -> Validation {
        for item in &program.items {
            match item {
                Item::Struct(decl) => self.check_struct(decl),
                Item::Function(decl) => self.check_function(decl),
                _ => {}
            }
        }
        self.check_entries();
        debug!(
            "{}: validation found {} errors, {} warnings",
            self.file,
            self.result.diagnostics.error_count(),
            self.result.diagnostics.warning_count()
        );
        self.result
    }

    fn reject(&mut self, name: &str, line: usize, column: usize, message: String) {
        self.result.diagnostics.error(self.file, line, column, message);
        self.result.rejected.insert(name.to_string());
    }

    fn check_struct(&mut self, decl: &StructDecl) {
        let info = match classify_component(decl, self.file) {
            Ok(info) => info,
            Err(err) => {
                self.result.diagnostics.push_error(&err);
                self.result.rejected.insert(decl.name.clone());
                return;
            }
        };
        if info.preview {
            debug!("'{}': @Preview is ignored", decl.name);
        }
        if info.is_entry() {
            self.entries.push((decl.name.clone(), decl.pos));
            self.check_route_name(&info, decl.pos);
        }

        let mut builds = 0;
        for member in &decl.members {
            match member {
                ClassMember::Property(prop) if !prop.is_static => {
                    if let Err(err) = classify_field(prop, info.flavor, self.file) {
                        self.result.diagnostics.push_error(&err);
                        self.result.rejected.insert(decl.name.clone());
                    }
                }
                ClassMember::Property(_) => {}
                ClassMember::Method(method) => match method.kind {
                    MethodKind::Constructor => self.reject(
                        &decl.name,
                        method.pos.line,
                        method.pos.column,
                        format!("struct '{}' cannot declare a constructor", decl.name),
                    ),
                    MethodKind::Method if method.name() == "build" => {
                        builds += 1;
                        if !method.func.params.is_empty() {
                            self.reject(
                                &decl.name,
                                method.pos.line,
                                method.pos.column,
                                format!("build method of '{}' cannot take parameters", decl.name),
                            );
                        }
                    }
                    _ => {
                        if let Err(err) = classify_method(method, info.flavor, self.file) {
                            self.result.diagnostics.push_error(&err);
                            self.result.rejected.insert(decl.name.clone());
                        }
                    }
                },
            }
        }
        match builds {
            1 => {}
            0 => self.reject(
                &decl.name,
                decl.pos.line,
                decl.pos.column,
                format!("struct '{}' has no build method", decl.name),
            ),
            _ => self.reject(
                &decl.name,
                decl.pos.line,
                decl.pos.column,
                format!("struct '{}' declares {} build methods", decl.name, builds),
            ),
        }
    }

    fn check_route_name(&mut self, info: &ComponentInfo, pos: Pos) {
        let route = match info.entry.as_ref().and_then(|e| e.route_name.as_ref()) {
            Some(route) => route,
            None => return,
        };
        let literal = match route {
            Expr::Str(raw) => unquote(raw),
            _ => {
                self.result.diagnostics.warning(
                    self.file,
                    pos.line,
                    pos.column,
                    format!("route name of '{}' is not a string literal", info.name),
                );
                return;
            }
        };
        if let Some(pattern) = &self.route_pattern {
            if !pattern.is_match(&literal) {
                self.result.diagnostics.error(
                    self.file,
                    pos.line,
                    pos.column,
                    format!("invalid route name '{}' on '{}'", literal, info.name),
                );
            }
        }
    }

    fn check_function(&mut self, decl: &FunctionDecl) {
        if decl.has_decorator("Styles") {
            let attrs = attribute_chain(&decl.func.body).len();
            let stmts = decl.func.body.len();
            if attrs == 0 && stmts > 0 {
                self.result.diagnostics.warning(
                    self.file,
                    decl.pos.line,
                    decl.pos.column,
                    format!("@Styles function '{}' contains no attribute calls", decl.name),
                );
            }
            if !decl.func.params.is_empty() {
                self.result.diagnostics.error(
                    self.file,
                    decl.pos.line,
                    decl.pos.column,
                    format!("@Styles function '{}' cannot take parameters", decl.name),
                );
            }
        }
        if decl.has_decorator("Builder") && self.registry.components.contains_key(&decl.name) {
            self.result.diagnostics.error(
                self.file,
                decl.pos.line,
                decl.pos.column,
                format!("@Builder '{}' shadows a component of the same name", decl.name),
            );
        }
    }

    fn check_entries(&mut self) {
        for (name, pos) in self.entries.iter().skip(1) {
            self.result.diagnostics.error(
                self.file,
                pos.line,
                pos.column,
                format!("'{}' is a second @Entry; a file can only have one", name),
            );
        }
    }
}

/// Validates a parsed file against the declarations collected in `registry`.
pub fn validate(program: &Program, registry: &Registry, file: &str) -> Validation {
    SemanticAnalyzer::new(registry, file).analyze(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn run(source: &str) -> Validation {
        let program = parse_source(source, "Index.ets").unwrap();
        let registry = Registry::collect(&program, "Index.ets");
        validate(&program, &registry, "Index.ets")
    }

    #[test]
    fn test_valid_file() {
        let result = run("@Entry\n@Component\nstruct Index {\n  @State n: number = 0\n  build() {\n    Text('a')\n  }\n}\n");
        assert!(result.diagnostics.is_empty());
        assert!(result.rejected.is_empty());
    }

    #[test]
    fn test_missing_build_rejected() {
        let result = run("@Component\nstruct Broken {\n  @State n: number = 0\n}\n@Component\nstruct Fine {\n  build() {\n  }\n}\n");
        assert!(result.rejected.contains("Broken"));
        assert!(!result.rejected.contains("Fine"));
        assert_eq!(result.diagnostics.error_count(), 1);
    }

    #[test]
    fn test_duplicate_build_and_constructor() {
        let result = run("@Component\nstruct A {\n  build() {\n  }\n  build() {\n  }\n}\n@Component\nstruct B {\n  constructor() {\n  }\n  build() {\n  }\n}\n");
        assert!(result.rejected.contains("A"));
        assert!(result.rejected.contains("B"));
    }

    #[test]
    fn test_bad_decorator_rejects_struct() {
        let result = run("@Component\nstruct A {\n  @State @Prop n: number = 0\n  build() {\n  }\n}\n");
        assert!(result.rejected.contains("A"));
        assert!(result.diagnostics.first_error().is_some());
    }

    #[test]
    fn test_second_entry_reported() {
        let result = run("@Entry\n@Component\nstruct A {\n  build() {\n  }\n}\n@Entry\n@Component\nstruct B {\n  build() {\n  }\n}\n");
        assert_eq!(result.diagnostics.error_count(), 1);
        assert!(result.rejected.is_empty());
    }

    #[test]
    fn test_route_name_shape() {
        let result = run("@Entry({ routeName: 'pages/home' })\n@Component\nstruct A {\n  build() {\n  }\n}\n");
        assert!(result.diagnostics.is_empty());
        let result = run("@Entry({ routeName: 'bad name!' })\n@Component\nstruct A {\n  build() {\n  }\n}\n");
        assert!(result.diagnostics.has_errors());
    }
}
