//! Structured diagnostic messages with severity and category codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity level of a diagnostic message.
///
/// Ordered from least severe (`Note`) to most severe (`Error`), matching the
/// derived `PartialOrd`/`Ord` implementation based on declaration order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// An informational note about the placement run.
    Note,
    /// A potential issue that does not stop placement.
    Warning,
    /// A definite problem; the placement result should not be trusted.
    Error,
}

impl Severity {
    /// Returns `true` if this severity is [`Error`](Severity::Error).
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Placement diagnostics, prefixed with `P`.
    Placement,
    /// Timing diagnostics, prefixed with `T`.
    Timing,
    /// Configuration diagnostics, prefixed with `C`.
    Config,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Placement => 'P',
            Category::Timing => 'T',
            Category::Config => 'C',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a number.
///
/// Displayed as the prefix followed by a zero-padded 3-digit number, e.g. `P101`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

/// A structured diagnostic emitted by a placement stage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, code, message)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, code, message)
    }

    /// Creates a new note diagnostic.
    pub fn note(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Note, code, message)
    }

    fn with_severity(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
        for note in &self.notes {
            write!(f, "\n  = note: {note}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Note < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error.is_error());
        assert!(!Severity::Warning.is_error());
    }

    #[test]
    fn code_display() {
        let code = DiagnosticCode::new(Category::Placement, 101);
        assert_eq!(format!("{code}"), "P101");
        let code = DiagnosticCode::new(Category::Timing, 3);
        assert_eq!(format!("{code}"), "T003");
    }

    #[test]
    fn diagnostic_display_with_note() {
        let diag = Diagnostic::warning(
            DiagnosticCode::new(Category::Placement, 201),
            "starting temperature probe rejected moves",
        )
        .with_note("12 of 20 configurations accepted");
        let text = format!("{diag}");
        assert!(text.starts_with("warning[P201]: starting temperature"));
        assert!(text.contains("= note: 12 of 20"));
    }

    #[test]
    fn serde_roundtrip() {
        let diag = Diagnostic::note(DiagnosticCode::new(Category::Config, 1), "defaults used");
        let json = serde_json::to_string(&diag).unwrap();
        let restored: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.message, "defaults used");
        assert_eq!(restored.severity, Severity::Note);
    }
}
