//! Error types for option loading and validation.

use strix_common::{Category, Diagnostic, DiagnosticCode};

/// Errors that can occur when loading or validating placer options.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the options file.
    #[error("failed to read placer options: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse placer options: {0}")]
    ParseError(String),

    /// An option value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Converts this error into a config-category diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let number = match self {
            ConfigError::IoError(_) => 1,
            ConfigError::ParseError(_) => 2,
            ConfigError::ValidationError(_) => 3,
        };
        Diagnostic::error(DiagnosticCode::new(Category::Config, number), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_error() {
        let err = ConfigError::ParseError("expected '=' at line 3".to_string());
        assert_eq!(
            format!("{err}"),
            "failed to parse placer options: expected '=' at line 3"
        );
    }

    #[test]
    fn display_validation_error() {
        let err = ConfigError::ValidationError("alpha_t must be in (0, 1)".to_string());
        assert_eq!(format!("{err}"), "validation error: alpha_t must be in (0, 1)");
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::IoError(io_err);
        assert!(format!("{err}").starts_with("failed to read placer options:"));
    }

    #[test]
    fn diagnostic_code() {
        let diag = ConfigError::ValidationError("bad".to_string()).to_diagnostic();
        assert_eq!(format!("{}", diag.code), "C003");
        assert!(diag.severity.is_error());
    }
}
