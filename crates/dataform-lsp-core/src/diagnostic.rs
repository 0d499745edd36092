//! Diagnostic codes and editor-facing diagnostics
//!
//! Diagnostic codes are stable identifiers surfaced to editors.
//! Add new codes with new names; do not rename existing ones.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Diagnostic code registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    /// The validation service rejected the compiled query
    DryRunQueryError,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DryRunQueryError => "DRY_RUN_QUERY_ERROR",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed
    Warn,

    /// Error - the query will not run as written
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A line/column pair.
///
/// Lines and columns are kept exactly as the producer reported them; the
/// validation service and the editor agree on their base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open range between two positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Range starting at `start` and extending `width` columns on the same line
    pub fn on_line(start: Position, width: u32) -> Self {
        Self {
            start,
            end: Position::new(start.line, start.column.saturating_add(width)),
        }
    }
}

/// A diagnostic attached to a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Highlighted range in the source document
    pub range: Range,

    /// Replacement proposed by the validation service, if any
    pub suggestion: Option<String>,
}

impl Diagnostic {
    /// Diagnostic for a query rejected by the validation service.
    ///
    /// The validation service does not report token lengths, so the range is
    /// a fixed `width` columns starting at `position`.
    pub fn query_error(position: Position, width: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        let suggestion = extract_suggestion(&message);

        Self {
            code: DiagnosticCode::DryRunQueryError,
            severity: Severity::Error,
            message,
            range: Range::on_line(position, width),
            suggestion,
        }
    }
}

fn did_you_mean() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Did you mean (\w+)\?").expect("pattern is valid"))
}

/// Extract the replacement proposed in a validation error message.
///
/// Messages look like
/// `Unrecognized name: MODELID; Did you mean MODEL_ID? at [27:28]`; the
/// suggestion lives after the first `;`.
pub fn extract_suggestion(message: &str) -> Option<String> {
    let (_, hint) = message.split_once(';')?;
    did_you_mean()
        .captures(hint)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        assert_eq!(DiagnosticCode::DryRunQueryError.as_str(), "DRY_RUN_QUERY_ERROR");
        assert_eq!(
            serde_json::to_value(DiagnosticCode::DryRunQueryError).unwrap(),
            serde_json::json!("DRY_RUN_QUERY_ERROR")
        );
    }

    #[test]
    fn query_errors_carry_the_dry_run_code() {
        let diag = Diagnostic::query_error(Position::new(2, 3), 5, "Syntax error");
        assert_eq!(diag.code, DiagnosticCode::DryRunQueryError);
        assert_eq!(diag.code.to_string(), "DRY_RUN_QUERY_ERROR");
    }

    #[test]
    fn query_error_spans_fixed_width() {
        let diag = Diagnostic::query_error(Position::new(7, 10), 5, "Syntax error");
        assert_eq!(diag.range.start, Position::new(7, 10));
        assert_eq!(diag.range.end, Position::new(7, 15));
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.suggestion, None);
    }

    #[test]
    fn suggestion_is_extracted() {
        let message = "googleapi: Error 400: Unrecognized name: MODELID; Did you mean MODEL_ID? at [27:28], invalidQuery";
        assert_eq!(extract_suggestion(message).as_deref(), Some("MODEL_ID"));

        let diag = Diagnostic::query_error(Position::new(1, 1), 5, message);
        assert_eq!(diag.suggestion.as_deref(), Some("MODEL_ID"));
    }

    #[test]
    fn no_suggestion_without_hint() {
        assert_eq!(extract_suggestion("Syntax error: Unexpected end of script"), None);
        assert_eq!(extract_suggestion("Table not found; check the dataset"), None);
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::query_error(Position::new(3, 4), 5, "Unrecognized name: x");

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("DRY_RUN_QUERY_ERROR"));
        assert!(json.contains("error"));
    }
}
