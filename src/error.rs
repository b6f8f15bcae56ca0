//! Error types for the etsc compiler

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {file} at line {line}: {message}")]
    Parse { file: String, line: usize, message: String },

    #[error("Semantic error in {file} at line {line}: {message}")]
    Semantic { file: String, line: usize, message: String },

    #[error("Decorator error in {file} at line {line}: {message}")]
    Decorator { file: String, line: usize, message: String },

    #[error("Component error in {file} at line {line}: {message}")]
    Component { file: String, line: usize, message: String },

    #[error("Code generation error: {message}")]
    CodeGen { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn parse(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn semantic(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Semantic {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn decorator(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Decorator {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    pub fn component(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Component {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Line the error points at, when it carries one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Parse { line, .. }
            | Self::Semantic { line, .. }
            | Self::Decorator { line, .. }
            | Self::Component { line, .. } => Some(*line),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A located, recoverable finding. Errors skip the offending declaration,
/// warnings are reported and ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(
            f,
            "{}: {}:{}:{}: {}",
            level, self.file, self.line, self.column, self.message
        )
    }
}

impl From<&CompilerError> for Diagnostic {
    fn from(err: &CompilerError) -> Self {
        let (file, line, message) = match err {
            CompilerError::Parse { file, line, message }
            | CompilerError::Semantic { file, line, message }
            | CompilerError::Decorator { file, line, message }
            | CompilerError::Component { file, line, message } => {
                (file.clone(), *line, message.clone())
            }
            other => (String::new(), 0, other.to_string()),
        };
        Diagnostic {
            severity: Severity::Error,
            file,
            line,
            column: 0,
            message,
        }
    }
}

/// Diagnostics collected over one compilation unit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, file: &str, line: usize, column: usize, message: impl Into<String>) {
        let message = message.into();
        log::debug!("{}:{}:{}: {}", file, line, column, message);
        self.items.push(Diagnostic {
            severity: Severity::Error,
            file: file.to_string(),
            line,
            column,
            message,
        });
    }

    pub fn warning(&mut self, file: &str, line: usize, column: usize, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}:{}:{}: {}", file, line, column, message);
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            file: file.to_string(),
            line,
            column,
            message,
        });
    }

    pub fn push_error(&mut self, err: &CompilerError) {
        self.items.push(Diagnostic::from(err));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.items.len() - self.error_count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// The first error, turned back into a `CompilerError`.
    pub fn first_error(&self) -> Option<CompilerError> {
        self.items
            .iter()
            .find(|d| d.severity == Severity::Error)
            .map(|d| CompilerError::semantic(d.file.clone(), d.line, d.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_line() {
        let err = CompilerError::decorator("a.ets", 7, "conflicting decorators");
        assert_eq!(err.line(), Some(7));
        assert_eq!(
            err.to_string(),
            "Decorator error in a.ets at line 7: conflicting decorators"
        );
        assert_eq!(CompilerError::CodeGen { message: "x".into() }.line(), None);
    }

    #[test]
    fn test_diagnostics_counts() {
        let mut diags = Diagnostics::new();
        diags.warning("a.ets", 1, 2, "unused");
        assert!(!diags.has_errors());
        diags.error("a.ets", 3, 4, "missing build");
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
        let first = diags.first_error().unwrap();
        assert_eq!(first.line(), Some(3));
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::from(&CompilerError::parse("b.ets", 9, "unexpected token"));
        assert_eq!(diag.to_string(), "error: b.ets:9:0: unexpected token");
    }
}
