//! The editor the dry-run flow reports to
//!
//! The LSP server and the CLI each provide an implementation; the
//! orchestrator only ever talks to this trait.

use dataform_lsp_core::{Diagnostic, Document};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Importance of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// Primitives an editor provides to the dry-run flow
#[async_trait::async_trait]
pub trait EditorSurface: Send + Sync {
    /// Current content of `path` as the editor sees it, unsaved edits
    /// included. `None` when the editor does not know the file.
    async fn document(&self, path: &Path) -> Option<Document>;

    /// Write unsaved edits of `path` to disk
    async fn save_if_dirty(&self, path: &Path) -> std::io::Result<()>;

    /// Replace every diagnostic shown for `path`
    async fn publish_diagnostics(&self, path: &Path, diagnostics: Vec<Diagnostic>);

    /// Show a notice to the user
    async fn show_message(&self, level: MessageLevel, text: String);
}

/// In-memory surface that records everything it is told
///
/// Documents are served from memory; saving is counted but writes nothing.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    documents: Arc<RwLock<HashMap<PathBuf, String>>>,
    diagnostics: Arc<RwLock<HashMap<PathBuf, Vec<Diagnostic>>>>,
    publications: Arc<RwLock<usize>>,
    messages: Arc<RwLock<Vec<(MessageLevel, String)>>>,
    saves: Arc<RwLock<Vec<PathBuf>>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the editor content of `path`
    pub async fn open(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.documents.write().await.insert(path.into(), text.into());
    }

    /// Diagnostics currently shown for `path`
    pub async fn diagnostics(&self, path: &Path) -> Vec<Diagnostic> {
        self.diagnostics
            .read()
            .await
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `publish_diagnostics` calls with a non-empty list
    pub async fn publication_count(&self) -> usize {
        *self.publications.read().await
    }

    /// Notices shown so far, in order
    pub async fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.messages.read().await.clone()
    }

    /// Paths saved so far, in order
    pub async fn saves(&self) -> Vec<PathBuf> {
        self.saves.read().await.clone()
    }
}

#[async_trait::async_trait]
impl EditorSurface for RecordingSurface {
    async fn document(&self, path: &Path) -> Option<Document> {
        let documents = self.documents.read().await;
        documents.get(path).map(|text| Document::new(path, text.clone()))
    }

    async fn save_if_dirty(&self, path: &Path) -> std::io::Result<()> {
        self.saves.write().await.push(path.to_path_buf());
        Ok(())
    }

    async fn publish_diagnostics(&self, path: &Path, diagnostics: Vec<Diagnostic>) {
        if !diagnostics.is_empty() {
            *self.publications.write().await += 1;
        }
        self.diagnostics
            .write()
            .await
            .insert(path.to_path_buf(), diagnostics);
    }

    async fn show_message(&self, level: MessageLevel, text: String) {
        self.messages.write().await.push((level, text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataform_lsp_core::{Position, Range};

    #[tokio::test]
    async fn publishing_replaces_previous_diagnostics() {
        let surface = RecordingSurface::new();
        let path = Path::new("/ws/definitions/orders.sqlx");
        let diagnostic = Diagnostic::query_error(Position::new(1, 1), 5, "bad");

        surface.publish_diagnostics(path, vec![diagnostic.clone()]).await;
        surface.publish_diagnostics(path, Vec::new()).await;

        assert!(surface.diagnostics(path).await.is_empty());
        assert_eq!(surface.publication_count().await, 1);
        assert_eq!(diagnostic.range, Range::on_line(Position::new(1, 1), 5));
    }

    #[tokio::test]
    async fn documents_are_served_from_memory() {
        let surface = RecordingSurface::new();
        surface.open("/ws/a.sqlx", "config {}\nselect 1").await;

        let document = surface.document(Path::new("/ws/a.sqlx")).await.unwrap();
        assert_eq!(document.lines().count(), 2);
        assert!(surface.document(Path::new("/ws/b.sqlx")).await.is_none());
    }
}
