//! Semantic error taxonomy and the diagnostics sink the compilation unit
//! reports into.
//!
//! Everything except [`SemanticError::InternalInconsistency`] is recoverable:
//! the offending expression is left in a best effort state and compilation
//! continues, so a single unit can surface many diagnostics at once.

use colored::Colorize;
use thiserror::Error;

/// A line/column pair supplied by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Where a type was required to match an expected type. Used to give type
/// mismatches some context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    Initializer,
    Assignment,
    Argument,
    Return,
    Condition,
    BinaryOperation,
    Cast,
}

impl Boundary {
    pub fn usage(&self) -> &'static str {
        match self {
            Boundary::Initializer => "an initializer",
            Boundary::Assignment => "an assignment",
            Boundary::Argument => "an argument",
            Boundary::Return => "a return",
            Boundary::Condition => "a condition",
            Boundary::BinaryOperation => "a binary operation",
            Boundary::Cast => "a cast",
        }
    }

    fn mismatch_message(&self, expected: &str, actual: &str) -> String {
        match self {
            Boundary::Initializer => {
                format!("initializer type {actual} does not match declared type {expected}")
            }
            Boundary::Assignment => format!("cannot assign {actual} to variable with type {expected}"),
            Boundary::Argument => format!("expected argument to be {expected} but found {actual}"),
            Boundary::Return => {
                format!("returned type {actual} does not match the function's return type {expected}")
            }
            Boundary::Condition => format!("expected condition to be {expected} but found {actual}"),
            Boundary::BinaryOperation => {
                format!("left-hand side {expected} is incompatible with right-hand side {actual}")
            }
            Boundary::Cast => format!("{actual} cannot be cast to {expected}"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("undefined type `{name}`")]
    UndefinedType { name: String },

    #[error("undefined variable `{name}`")]
    UndefinedVariable { name: String },

    #[error("no function matches the call `{signature}`")]
    UndefinedFunction { signature: String },

    #[error("`{name}` is already declared in this scope")]
    AlreadyDeclared { name: String },

    #[error("{}", .boundary.mismatch_message(.expected, .actual))]
    TypeMismatch {
        boundary: Boundary,
        expected: String,
        actual: String,
    },

    #[error("{ty} cannot be used in {usage}")]
    UnsupportedPromotion { ty: String, usage: String },

    #[error("call `{signature}` is ambiguous between {}", .candidates.join(", "))]
    AmbiguousOverload {
        signature: String,
        candidates: Vec<String>,
    },

    #[error("invalid type `{ty}`: {reason}")]
    InvalidType { ty: String, reason: String },

    #[error("implicit conversion from {from} to {to} loses {bits} bit(s) of precision")]
    LossyConversion { from: String, to: String, bits: u32 },

    #[error("literal `{text}` is not exactly representable and was rounded")]
    InexactLiteral { text: String },

    #[error("internal inconsistency: {reason}")]
    InternalInconsistency { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub error: SemanticError,
    pub severity: Severity,
    pub position: Position,
    #[cfg(feature = "error-backtrace")]
    pub reported_at: &'static std::panic::Location<'static>,
}

impl Diagnostic {
    /// Renders the diagnostic in the `error: message (at origin:line:col)`
    /// format, colored when the terminal supports it
    pub fn render(&self, origin: &str) -> String {
        let label = match self.severity {
            Severity::Error => "error".red(),
            Severity::Warning => "warning".yellow(),
        };

        let message = format!(
            "{}: {} {}",
            label,
            self.error,
            format!("(at {origin}:{})", self.position).white()
        );

        #[cfg(feature = "error-backtrace")]
        let message = format!(
            "{}: {}\n{}",
            "backtrace".blue(),
            format!(
                "(at {}:{}:{})",
                self.reported_at.file(),
                self.reported_at.line(),
                self.reported_at.column()
            )
            .white(),
            message
        );

        message
    }
}

/// Collects every diagnostic reported during compilation of a unit
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    #[track_caller]
    pub fn error(&mut self, error: SemanticError, position: Position) {
        self.push(error, Severity::Error, position);
    }

    #[track_caller]
    pub fn warning(&mut self, error: SemanticError, position: Position) {
        self.push(error, Severity::Warning, position);
    }

    #[track_caller]
    pub fn push(&mut self, error: SemanticError, severity: Severity, position: Position) {
        match severity {
            Severity::Error => log::debug!("error at {position}: {error}"),
            Severity::Warning => log::debug!("warning at {position}: {error}"),
        }

        self.entries.push(Diagnostic {
            error,
            severity,
            position,
            #[cfg(feature = "error-backtrace")]
            reported_at: std::panic::Location::caller(),
        });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &SemanticError> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| &d.error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &SemanticError> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| &d.error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prints every diagnostic to stderr
    pub fn report(&self, origin: &str) {
        for diagnostic in &self.entries {
            eprintln!("{}", diagnostic.render(origin));
        }
    }
}

/// Aborts compilation. Only used for states the semantic core should never be
/// able to reach, like a symbol whose path count disagrees with its scope.
#[track_caller]
pub fn internal_inconsistency(reason: impl Into<String>) -> ! {
    let error = SemanticError::InternalInconsistency {
        reason: reason.into(),
    };

    log::error!("{error}");
    panic!("{error}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_origin_and_position() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(
            SemanticError::UndefinedVariable {
                name: "x".to_string(),
            },
            Position::new(3, 7),
        );

        let rendered = diagnostics.iter().next().unwrap().render("main.cog");
        let plain = String::from_utf8(strip_ansi_escapes::strip(rendered)).unwrap();

        assert!(plain.contains("error: undefined variable `x` (at main.cog:3:7)"));
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn warnings_are_not_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warning(
            SemanticError::InexactLiteral {
                text: "0.1".to_string(),
            },
            Position::default(),
        );

        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn type_mismatch_message_depends_on_boundary() {
        let error = SemanticError::TypeMismatch {
            boundary: Boundary::Assignment,
            expected: "uint8".to_string(),
            actual: "int8".to_string(),
        };

        assert_eq!(error.to_string(), "cannot assign int8 to variable with type uint8");
    }

    #[test]
    #[should_panic(expected = "internal inconsistency: path count mismatch")]
    fn internal_inconsistency_panics() {
        internal_inconsistency("path count mismatch");
    }
}
