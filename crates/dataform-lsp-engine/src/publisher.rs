//! One dry-run diagnostic per document

use crate::surface::EditorSurface;
use dataform_lsp_core::{Diagnostic, Position};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Publishes dry-run errors to the editor.
///
/// A document shows at most one dry-run diagnostic: every publication
/// replaces the previous one.
pub struct DiagnosticPublisher {
    surface: Arc<dyn EditorSurface>,
    current: RwLock<HashMap<PathBuf, Diagnostic>>,
}

impl DiagnosticPublisher {
    pub fn new(surface: Arc<dyn EditorSurface>) -> Self {
        Self {
            surface,
            current: RwLock::new(HashMap::new()),
        }
    }

    /// Show `message` at `position`, highlighting `width` columns
    pub async fn publish(&self, path: &Path, position: Position, width: u32, message: &str) -> Diagnostic {
        let diagnostic = Diagnostic::query_error(position, width, message);

        tracing::debug!(path = %path.display(), %position, "publishing dry-run diagnostic");

        self.current
            .write()
            .await
            .insert(path.to_path_buf(), diagnostic.clone());
        self.surface
            .publish_diagnostics(path, vec![diagnostic.clone()])
            .await;

        diagnostic
    }

    /// Remove the diagnostic shown for `path`, if any
    pub async fn clear(&self, path: &Path) {
        let removed = self.current.write().await.remove(path);
        if removed.is_some() {
            self.surface.publish_diagnostics(path, Vec::new()).await;
        }
    }

    /// Diagnostic currently shown for `path`
    pub async fn current(&self, path: &Path) -> Option<Diagnostic> {
        self.current.read().await.get(path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;

    #[tokio::test]
    async fn second_publication_replaces_first() {
        let surface = RecordingSurface::new();
        let publisher = DiagnosticPublisher::new(Arc::new(surface.clone()));
        let path = Path::new("/ws/definitions/orders.sqlx");

        publisher.publish(path, Position::new(3, 4), 5, "first").await;
        publisher.publish(path, Position::new(7, 10), 5, "second").await;

        let shown = surface.diagnostics(path).await;
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].message, "second");
        assert_eq!(shown[0].range.start, Position::new(7, 10));
        assert_eq!(shown[0].range.end, Position::new(7, 15));
        assert_eq!(publisher.current(path).await.unwrap().message, "second");
    }

    #[tokio::test]
    async fn clear_removes_diagnostic() {
        let surface = RecordingSurface::new();
        let publisher = DiagnosticPublisher::new(Arc::new(surface.clone()));
        let path = Path::new("/ws/definitions/orders.sqlx");

        publisher.publish(path, Position::new(1, 1), 5, "bad").await;
        publisher.clear(path).await;

        assert!(surface.diagnostics(path).await.is_empty());
        assert!(publisher.current(path).await.is_none());
    }

    #[tokio::test]
    async fn documents_are_independent() {
        let surface = RecordingSurface::new();
        let publisher = DiagnosticPublisher::new(Arc::new(surface.clone()));
        let orders = Path::new("/ws/definitions/orders.sqlx");
        let customers = Path::new("/ws/definitions/customers.sqlx");

        publisher.publish(orders, Position::new(1, 1), 5, "orders").await;
        publisher.publish(customers, Position::new(2, 2), 5, "customers").await;

        assert_eq!(surface.diagnostics(orders).await.len(), 1);
        assert_eq!(surface.diagnostics(customers).await.len(), 1);
    }
}
