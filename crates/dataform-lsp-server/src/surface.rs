//! The editor as seen by the dry-run flow, over LSP

use dataform_lsp_core::{Diagnostic as DataformDiagnostic, Document, Severity};
use dataform_lsp_engine::{EditorSurface, MessageLevel};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, MessageType, NumberOrString, Position, Range, Url,
};
use tower_lsp::Client;

/// Source name attached to every published diagnostic
pub const DIAGNOSTIC_SOURCE: &str = "dataform";

/// Open documents plus the LSP client
pub struct LspSurface {
    client: Client,

    /// Open documents (path -> editor text)
    documents: Arc<RwLock<HashMap<PathBuf, String>>>,
}

impl LspSurface {
    pub fn new(client: Client, documents: Arc<RwLock<HashMap<PathBuf, String>>>) -> Self {
        Self { client, documents }
    }
}

/// Convert a dry-run diagnostic to an LSP diagnostic.
///
/// Lines and columns are passed through unchanged. The suggested
/// replacement, if any, travels in `data` for the quick fix.
pub fn convert_diagnostic(diag: DataformDiagnostic) -> Diagnostic {
    let severity = match diag.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warn => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
    };

    let range = Range {
        start: Position {
            line: diag.range.start.line,
            character: diag.range.start.column,
        },
        end: Position {
            line: diag.range.end.line,
            character: diag.range.end.column,
        },
    };

    Diagnostic {
        range,
        severity: Some(severity),
        code: Some(NumberOrString::String(diag.code.as_str().to_string())),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: diag.message,
        data: diag.suggestion.map(|suggestion| json!({ "suggestion": suggestion })),
        ..Default::default()
    }
}

fn message_type(level: MessageLevel) -> MessageType {
    match level {
        MessageLevel::Info => MessageType::INFO,
        MessageLevel::Warning => MessageType::WARNING,
        MessageLevel::Error => MessageType::ERROR,
    }
}

#[async_trait::async_trait]
impl EditorSurface for LspSurface {
    async fn document(&self, path: &Path) -> Option<Document> {
        let documents = self.documents.read().await;
        documents.get(path).map(|text| Document::new(path, text.clone()))
    }

    /// Writes the buffer to disk when it differs from the file's content
    async fn save_if_dirty(&self, path: &Path) -> std::io::Result<()> {
        let Some(text) = self.documents.read().await.get(path).cloned() else {
            return Ok(());
        };

        let on_disk = tokio::fs::read_to_string(path).await.ok();
        if on_disk.as_deref() == Some(text.as_str()) {
            return Ok(());
        }

        tracing::debug!(path = %path.display(), "writing unsaved buffer");
        tokio::fs::write(path, text).await
    }

    async fn publish_diagnostics(&self, path: &Path, diagnostics: Vec<DataformDiagnostic>) {
        let Ok(uri) = Url::from_file_path(path) else {
            tracing::warn!(path = %path.display(), "cannot publish diagnostics for non-absolute path");
            return;
        };

        let diagnostics = diagnostics.into_iter().map(convert_diagnostic).collect();
        self.client.publish_diagnostics(uri, diagnostics, None).await;
    }

    async fn show_message(&self, level: MessageLevel, text: String) {
        self.client.log_message(message_type(level), text.clone()).await;
        self.client.show_message(message_type(level), text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataform_lsp_core::Position as DataformPosition;

    #[test]
    fn diagnostic_positions_pass_through() {
        let diag = DataformDiagnostic::query_error(DataformPosition::new(7, 10), 5, "Unrecognized name: x");
        let lsp = convert_diagnostic(diag);

        assert_eq!(lsp.range.start, Position { line: 7, character: 10 });
        assert_eq!(lsp.range.end, Position { line: 7, character: 15 });
        assert_eq!(lsp.severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(
            lsp.code,
            Some(NumberOrString::String("DRY_RUN_QUERY_ERROR".to_string()))
        );
        assert_eq!(lsp.data, None);
    }

    #[test]
    fn suggestion_is_carried_in_data() {
        let diag = DataformDiagnostic::query_error(
            DataformPosition::new(1, 1),
            5,
            "Unrecognized name: MODELID; Did you mean MODEL_ID? at [1:1]",
        );
        let lsp = convert_diagnostic(diag);

        assert_eq!(lsp.data, Some(json!({ "suggestion": "MODEL_ID" })));
    }
}
