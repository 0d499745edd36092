//! One dry run, from trigger to notice
//!
//! A run moves through `Compiling → Extracting → DryRunning` and ends in
//! exactly one terminal [`DryRunOutcome`]. Every failure is turned into a
//! single notice or a single diagnostic here; nothing is propagated to the
//! caller as an error.

use crate::locks::DocumentLocks;
use crate::publisher::DiagnosticPublisher;
use crate::state::ProjectState;
use crate::surface::{EditorSurface, MessageLevel};
use dataform_lsp_compiler::{query_for_file, ProjectCompiler, QueryLayout, TableMetadata};
use dataform_lsp_core::{
    is_dataform_workspace, logical_file_name, Config, ConfigBlockLocator, Diagnostic, Document,
    OffsetReconciler, Position,
};
use dataform_lsp_dryrun::{DryRunClient, DryRunError, DryRunResult};
use std::path::Path;
use std::sync::Arc;

/// Terminal state of a dry run
#[derive(Debug, Clone, PartialEq)]
pub enum DryRunOutcome {
    /// The file is not a `.sqlx` file; nothing was done
    Unsupported,

    /// The workspace root has no Dataform signature file
    NotAWorkspace,

    /// The compiler failed or produced unreadable output
    CompilationFailed(String),

    /// No compiled action matches the file's logical name
    QueryNotFound(String),

    /// The validation service could not be reached
    TransportFailed(String),

    /// The query was rejected; the diagnostic has been published
    ErrorFound(Diagnostic),

    /// The query is valid
    Success {
        /// `database.schema.name` of the action
        target: String,
        total_bytes_processed: u64,
    },
}

impl DryRunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Runs the dry-run flow for documents of one editor
pub struct DryRunOrchestrator {
    compiler: Arc<dyn ProjectCompiler>,
    client: Arc<dyn DryRunClient>,
    surface: Arc<dyn EditorSurface>,
    publisher: Arc<DiagnosticPublisher>,
    state: Arc<ProjectState>,
    config: Config,

    /// Runs on the same document queue up
    locks: Arc<DocumentLocks>,
}

impl DryRunOrchestrator {
    pub fn new(
        compiler: Arc<dyn ProjectCompiler>,
        client: Arc<dyn DryRunClient>,
        surface: Arc<dyn EditorSurface>,
    ) -> Self {
        Self {
            compiler,
            client,
            publisher: Arc::new(DiagnosticPublisher::new(Arc::clone(&surface))),
            surface,
            state: Arc::new(ProjectState::new()),
            config: Config::default(),
            locks: Arc::new(DocumentLocks::new()),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Share completion state with a previous orchestrator
    pub fn with_state(mut self, state: Arc<ProjectState>) -> Self {
        self.state = state;
        self
    }

    /// Share published diagnostics with a previous orchestrator
    pub fn with_publisher(mut self, publisher: Arc<DiagnosticPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Serialize runs with a previous orchestrator
    pub fn with_locks(mut self, locks: Arc<DocumentLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> Arc<ProjectState> {
        Arc::clone(&self.state)
    }

    pub fn publisher(&self) -> Arc<DiagnosticPublisher> {
        Arc::clone(&self.publisher)
    }

    pub fn locks(&self) -> Arc<DocumentLocks> {
        Arc::clone(&self.locks)
    }

    /// Query layout of the compiler, with configured overrides applied
    pub fn query_layout(&self) -> QueryLayout {
        let mut layout = self.compiler.query_layout();
        if let Some(offset) = self.config.query_string_offset {
            layout.query_string_offset = offset;
        }
        if let Some(width) = self.config.highlight_width {
            layout.highlight_width = width;
        }
        layout
    }

    /// Dry-run the file at `path`, which belongs to the workspace at
    /// `workspace_root`
    pub async fn run(&self, path: &Path, workspace_root: &Path) -> DryRunOutcome {
        let Some(file_name) = logical_file_name(path) else {
            tracing::debug!(path = %path.display(), "not a sqlx file, skipping dry run");
            self.publisher.clear(path).await;
            return DryRunOutcome::Unsupported;
        };

        if !is_dataform_workspace(workspace_root) {
            self.publisher.clear(path).await;
            self.notify(
                MessageLevel::Warning,
                format!("{} is not a Dataform workspace", workspace_root.display()),
            )
            .await;
            return DryRunOutcome::NotAWorkspace;
        }

        let _guard = self.locks.acquire(path).await;

        tracing::info!(file = %file_name, "starting dry run");

        self.publisher.clear(path).await;

        // The compiler and the config-block scan must see the same bytes
        if self.config.save_before_dry_run {
            if let Err(e) = self.surface.save_if_dirty(path).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to save document");
                self.notify(MessageLevel::Warning, format!("Could not save {}: {}", path.display(), e))
                    .await;
            }
        }

        let metadata = match self.compile_and_extract(workspace_root, &file_name).await {
            Ok(metadata) => metadata,
            Err(outcome) => return outcome,
        };

        if self.config.show_compiled_query {
            self.write_compiled_query(&metadata.query).await;
        }

        let result = match self.submit(&metadata.query).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, client = self.client.name(), "dry run failed");
                self.notify(MessageLevel::Error, format!("Dry run failed: {}", e))
                    .await;
                return DryRunOutcome::TransportFailed(e.to_string());
            }
        };

        if result.has_error() {
            let diagnostic = self.publish_error(path, &result).await;
            return DryRunOutcome::ErrorFound(diagnostic);
        }

        let target = metadata.target.full_id();
        self.notify(
            MessageLevel::Info,
            format!(
                "{}: query is valid and will process {}",
                target,
                result.statistics.human_bytes()
            ),
        )
        .await;

        DryRunOutcome::Success {
            target,
            total_bytes_processed: result.statistics.total_bytes_processed,
        }
    }

    async fn compile_and_extract(
        &self,
        workspace_root: &Path,
        file_name: &str,
    ) -> Result<TableMetadata, DryRunOutcome> {
        let project = match self.compiler.compile(workspace_root).await {
            Ok(project) => project,
            Err(e) => {
                tracing::warn!(error = %e, "compilation failed");
                self.notify(MessageLevel::Error, format!("Error compiling Dataform: {}", e))
                    .await;
                return Err(DryRunOutcome::CompilationFailed(e.to_string()));
            }
        };

        self.state.refresh(&project).await;

        let metadata = query_for_file(file_name, &project);
        if !metadata.is_found() {
            self.notify(
                MessageLevel::Error,
                format!("Query for {} not found in compiled json", file_name),
            )
            .await;
            return Err(DryRunOutcome::QueryNotFound(file_name.to_string()));
        }

        Ok(metadata)
    }

    async fn submit(&self, query: &str) -> Result<DryRunResult, DryRunError> {
        tracing::debug!(client = self.client.name(), "submitting query for validation");

        let submission = self.client.dry_run(query);
        match self.config.dry_run.timeout() {
            Some(limit) => tokio::time::timeout(limit, submission)
                .await
                .unwrap_or(Err(DryRunError::Timeout(limit))),
            None => submission.await,
        }
    }

    /// Remap the reported position against the current document text and
    /// publish it
    async fn publish_error(&self, path: &Path, result: &DryRunResult) -> Diagnostic {
        let document = self.current_document(path).await;
        let span = ConfigBlockLocator::locate(document.lines());
        let layout = self.query_layout();

        let reported = Position::new(result.error.line_number, result.error.column_number);
        let position = OffsetReconciler::new(layout.query_string_offset).remap(span, reported);

        tracing::info!(
            %reported,
            %position,
            start_line = span.start_line,
            end_line = span.end_line,
            "query rejected"
        );

        self.publisher
            .publish(path, position, layout.highlight_width, &result.error.message)
            .await
    }

    async fn current_document(&self, path: &Path) -> Document {
        if let Some(document) = self.surface.document(path).await {
            return document;
        }

        match tokio::fs::read_to_string(path).await {
            Ok(text) => Document::new(path, text),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read document");
                Document::new(path, String::new())
            }
        }
    }

    async fn write_compiled_query(&self, query: &str) {
        let destination = self.config.compiled_sql_path();
        match tokio::fs::write(&destination, query).await {
            Ok(()) => tracing::debug!(path = %destination.display(), "wrote compiled query"),
            Err(e) => {
                tracing::warn!(path = %destination.display(), error = %e, "failed to write compiled query");
                self.notify(
                    MessageLevel::Warning,
                    format!("Could not write compiled query to {}: {}", destination.display(), e),
                )
                .await;
            }
        }
    }

    async fn notify(&self, level: MessageLevel, text: String) {
        self.surface.show_message(level, text).await;
    }
}
