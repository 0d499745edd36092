//! Completion data from the last successful compile

use dataform_lsp_compiler::{dependency_names, project_tags, CompiledProject};
use tokio::sync::RwLock;

/// Tags and dependency names of the workspace.
///
/// Refreshed after every successful compile and only then, so a broken
/// compile keeps serving the last known lists.
#[derive(Debug, Default)]
pub struct ProjectState {
    tags: RwLock<Vec<String>>,
    dependencies: RwLock<Vec<String>>,
}

impl ProjectState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both lists with those of `project`
    pub async fn refresh(&self, project: &CompiledProject) {
        let tags = project_tags(project);
        let dependencies = dependency_names(project);

        tracing::debug!(
            tags = tags.len(),
            dependencies = dependencies.len(),
            "refreshed project state"
        );

        *self.tags.write().await = tags;
        *self.dependencies.write().await = dependencies;
    }

    /// Distinct tags across tables and assertions
    pub async fn tags(&self) -> Vec<String> {
        self.tags.read().await.clone()
    }

    /// Distinct target and declaration names
    pub async fn dependencies(&self) -> Vec<String> {
        self.dependencies.read().await.clone()
    }
}
