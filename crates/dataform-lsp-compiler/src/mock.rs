//! Mock compiler for testing
//!
//! Returns a predefined compiled project (or failure) without spawning
//! anything, and counts how often it was asked to compile.

use crate::project::CompiledProject;
use crate::runner::{CompileError, ProjectCompiler, QueryLayout};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock compiler
#[derive(Debug, Clone)]
pub struct MockCompiler {
    /// Project returned on success, or stderr of a simulated failure
    outcome: Result<CompiledProject, String>,

    /// Layout reported to callers
    layout: QueryLayout,

    /// Number of compile calls
    calls: Arc<AtomicUsize>,
}

impl MockCompiler {
    /// Compiler that always returns `project`
    pub fn with_project(project: CompiledProject) -> Self {
        Self {
            outcome: Ok(project),
            layout: QueryLayout::default(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Compiler that always exits with code 1 and `stderr`
    pub fn failing(stderr: impl Into<String>) -> Self {
        Self {
            outcome: Err(stderr.into()),
            layout: QueryLayout::default(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Report a different query layout
    pub fn with_layout(mut self, layout: QueryLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Number of compile calls so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProjectCompiler for MockCompiler {
    async fn compile(&self, _workspace_root: &Path) -> Result<CompiledProject, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        self.outcome.clone().map_err(|stderr| CompileError::Failed {
            code: Some(1),
            stderr,
        })
    }

    fn query_layout(&self) -> QueryLayout {
        self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_compiler_counts_calls() {
        let compiler = MockCompiler::failing("boom");

        let err = compiler.compile(Path::new("/ws")).await.unwrap_err();
        assert!(matches!(err, CompileError::Failed { code: Some(1), .. }));
        assert_eq!(compiler.call_count(), 1);
    }

    #[tokio::test]
    async fn project_is_returned() {
        let compiler = MockCompiler::with_project(CompiledProject::default());
        assert!(compiler.compile(Path::new("/ws")).await.is_ok());
    }
}
