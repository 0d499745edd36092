//! The dry-run flow's editor, rendered on a terminal
//!
//! Files are read from disk, so there is never anything to save.

use colored::Colorize;
use dataform_lsp_core::{Diagnostic, Document, Severity};
use dataform_lsp_engine::{EditorSurface, MessageLevel};
use std::path::Path;

/// Prints diagnostics to stdout and notices to stderr
pub struct TerminalSurface;

/// `path:line:column: severity: message`, plus the suggested fix if any
pub fn format_diagnostic(path: &Path, diagnostic: &Diagnostic) -> String {
    let severity = match diagnostic.severity {
        Severity::Error => "error".red().bold(),
        Severity::Warn => "warning".yellow().bold(),
        Severity::Info => "info".cyan().bold(),
    };

    let mut line = format!(
        "{}:{}: {}: {}",
        path.display(),
        diagnostic.range.start,
        severity,
        diagnostic.message
    );

    if let Some(suggestion) = &diagnostic.suggestion {
        line.push_str(&format!("\n  {} replace with `{}`", "help:".green(), suggestion));
    }

    line
}

#[async_trait::async_trait]
impl EditorSurface for TerminalSurface {
    async fn document(&self, _path: &Path) -> Option<Document> {
        None
    }

    async fn save_if_dirty(&self, _path: &Path) -> std::io::Result<()> {
        Ok(())
    }

    async fn publish_diagnostics(&self, path: &Path, diagnostics: Vec<Diagnostic>) {
        for diagnostic in &diagnostics {
            println!("{}", format_diagnostic(path, diagnostic));
        }
    }

    async fn show_message(&self, level: MessageLevel, text: String) {
        match level {
            MessageLevel::Info => eprintln!("{} {}", "✓".green(), text),
            MessageLevel::Warning => eprintln!("{} {}", "⚠".yellow(), text.yellow()),
            MessageLevel::Error => eprintln!("{} {}", "✗".red(), text.red()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataform_lsp_core::Position;

    #[test]
    fn diagnostic_line_shows_location_and_fix() {
        colored::control::set_override(false);

        let diagnostic = Diagnostic::query_error(
            Position::new(7, 10),
            5,
            "Unrecognized name: ORDERID; Did you mean ORDER_ID? at [5:10]",
        );
        let text = format_diagnostic(Path::new("definitions/orders.sqlx"), &diagnostic);

        assert!(text.starts_with("definitions/orders.sqlx:7:10: error: Unrecognized name"));
        assert!(text.contains("replace with `ORDER_ID`"));
    }
}
