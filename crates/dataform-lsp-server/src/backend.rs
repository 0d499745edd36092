//! LSP backend implementation for Dataform
//!
//! Tracks open documents, runs dry runs on save or on command, and serves
//! completion and quick fixes from what the last dry run learned.

use crate::surface::{LspSurface, DIAGNOSTIC_SOURCE};
use anyhow::Context;
use dataform_lsp_compiler::{DataformCompiler, ProjectCompiler};
use dataform_lsp_core::{find_workspace_root, is_dataform_workspace, logical_file_name, Config};
use dataform_lsp_dryrun::{BigQueryDryRun, DryRunClient};
use dataform_lsp_engine::{DiagnosticPublisher, DocumentLocks, DryRunOrchestrator, DryRunOutcome, ProjectState};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, CodeActionParams, CodeActionProviderCapability,
    CodeActionResponse, CompletionItem, CompletionItemKind, CompletionOptions, CompletionParams,
    CompletionResponse, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DidSaveTextDocumentParams, ExecuteCommandOptions,
    ExecuteCommandParams, InitializeParams, InitializeResult, InitializedParams, MessageType,
    Position, Range, SaveOptions, ServerCapabilities, TextDocumentSyncCapability,
    TextDocumentSyncKind, TextDocumentSyncOptions, TextDocumentSyncSaveOptions, TextEdit, Url,
    WorkspaceEdit,
};
use tower_lsp::{Client, LanguageServer};

/// Command that dry-runs the document given as its only argument
pub const DRY_RUN_COMMAND: &str = "dataform.dryRunFile";

/// LSP backend for Dataform
///
/// The orchestrator is built lazily because creating the validation client
/// needs credentials; it is rebuilt whenever the configuration changes.
pub struct Backend {
    /// LSP client for communicating with the editor
    client: Client,
    /// Currently open documents (path -> text content)
    documents: Arc<RwLock<HashMap<PathBuf, String>>>,
    /// Editor primitives handed to the dry-run flow
    surface: Arc<LspSurface>,
    /// Workspace configuration
    config: Arc<RwLock<Config>>,
    /// Project root directory
    root: Arc<RwLock<Option<PathBuf>>>,
    /// Dry-run flow for the current configuration
    orchestrator: Arc<RwLock<Option<Arc<DryRunOrchestrator>>>>,
    /// Completion data, shared across orchestrator rebuilds
    state: Arc<ProjectState>,
    /// Published diagnostics, shared across orchestrator rebuilds
    publisher: Arc<DiagnosticPublisher>,
    /// Per-document run locks, shared across orchestrator rebuilds
    locks: Arc<DocumentLocks>,
}

impl Backend {
    /// Create a new LSP backend
    pub fn new(client: Client) -> Self {
        let documents = Arc::new(RwLock::new(HashMap::new()));
        let surface = Arc::new(LspSurface::new(client.clone(), Arc::clone(&documents)));
        let publisher = Arc::new(DiagnosticPublisher::new(surface.clone()));

        Self {
            client,
            documents,
            surface,
            config: Arc::new(RwLock::new(Config::default())),
            root: Arc::new(RwLock::new(None)),
            orchestrator: Arc::new(RwLock::new(None)),
            state: Arc::new(ProjectState::new()),
            publisher,
            locks: Arc::new(DocumentLocks::new()),
        }
    }

    /// Load `dataform-lsp.toml` from the workspace root
    async fn load_config(&self) -> Config {
        let Some(root) = self.root.read().await.clone() else {
            return Config::default();
        };

        match read_config(&root) {
            Ok(config) => config,
            Err(e) => {
                self.client
                    .log_message(MessageType::WARNING, format!("{:#}", e))
                    .await;
                Config::default()
            }
        }
    }

    /// Reload configuration; a changed configuration drops the orchestrator
    async fn reload_config(&self) {
        let config = self.load_config().await;

        let changed = {
            let mut current = self.config.write().await;
            let changed = *current != config;
            *current = config;
            changed
        };

        if changed {
            tracing::info!("configuration changed");
            *self.orchestrator.write().await = None;
        }
    }

    /// Current orchestrator, building it if needed
    async fn orchestrator(&self) -> Option<Arc<DryRunOrchestrator>> {
        if let Some(orchestrator) = self.orchestrator.read().await.as_ref() {
            return Some(Arc::clone(orchestrator));
        }

        // Concurrent requests wait here and reuse the first build
        let mut slot = self.orchestrator.write().await;
        if let Some(orchestrator) = slot.as_ref() {
            return Some(Arc::clone(orchestrator));
        }

        let config = self.config.read().await.clone();
        let client = match BigQueryDryRun::from_config(&config.dry_run).await {
            Ok(client) => client,
            Err(e) => {
                self.client
                    .show_message(MessageType::ERROR, format!("Dry runs are unavailable: {}", e))
                    .await;
                return None;
            }
        };

        self.client
            .log_message(
                MessageType::INFO,
                format!("{} dry runs billed to {}", client.name(), client.project_id()),
            )
            .await;

        let orchestrator = Arc::new(
            DryRunOrchestrator::new(
                Arc::new(DataformCompiler::from_config(&config.compiler)),
                Arc::new(client),
                self.surface.clone(),
            )
            .with_config(config)
            .with_state(Arc::clone(&self.state))
            .with_publisher(Arc::clone(&self.publisher))
            .with_locks(Arc::clone(&self.locks)),
        );

        *slot = Some(Arc::clone(&orchestrator));
        Some(orchestrator)
    }

    /// Workspace containing `path`: the nearest Dataform workspace above it,
    /// or the editor's root
    async fn workspace_root_for(&self, path: &Path) -> Option<PathBuf> {
        match find_workspace_root(path) {
            Some(root) => Some(root),
            None => self.root.read().await.clone(),
        }
    }

    /// Dry-run `path` and wait for the outcome
    async fn dry_run(&self, path: PathBuf) -> Option<DryRunOutcome> {
        let root = self.workspace_root_for(&path).await?;
        let orchestrator = self.orchestrator().await?;
        Some(orchestrator.run(&path, &root).await)
    }

    /// Dry-run `path` without blocking the request loop
    async fn spawn_dry_run(&self, path: PathBuf) {
        let Some(root) = self.workspace_root_for(&path).await else {
            return;
        };
        let Some(orchestrator) = self.orchestrator().await else {
            return;
        };

        tokio::spawn(async move {
            let outcome = orchestrator.run(&path, &root).await;
            tracing::debug!(path = %path.display(), ?outcome, "dry run finished");
        });
    }

    /// Fill completion data with a compile that needs no credentials
    async fn warm_project_state(&self) {
        let Some(root) = self.root.read().await.clone() else {
            return;
        };
        if !is_dataform_workspace(&root) {
            return;
        }

        let compiler = DataformCompiler::from_config(&self.config.read().await.compiler);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            match compiler.compile(&root).await {
                Ok(project) => state.refresh(&project).await,
                Err(e) => tracing::debug!(error = %e, "initial compile failed"),
            }
        });
    }

    /// Text of `uri`'s line up to `position`
    async fn line_prefix(&self, uri: &Url, position: Position) -> Option<String> {
        let path = uri.to_file_path().ok()?;
        let documents = self.documents.read().await;
        let line = documents.get(&path)?.lines().nth(position.line as usize)?;

        Some(line.chars().take(position.character as usize).collect())
    }

    /// Quick fix applying the suggestion carried by `diagnostic`
    async fn quick_fix(&self, uri: &Url, diagnostic: tower_lsp::lsp_types::Diagnostic) -> Option<CodeAction> {
        if diagnostic.source.as_deref() != Some(DIAGNOSTIC_SOURCE) {
            return None;
        }

        let suggestion = diagnostic
            .data
            .as_ref()
            .and_then(|data| data.get("suggestion"))
            .and_then(Value::as_str)?
            .to_string();

        // Replace the whole identifier rather than the fixed-width highlight
        let start = diagnostic.range.start;
        let range = self
            .identifier_range(uri, start)
            .await
            .unwrap_or(diagnostic.range);

        let edit = WorkspaceEdit {
            changes: Some(HashMap::from([(
                uri.clone(),
                vec![TextEdit {
                    range,
                    new_text: suggestion.clone(),
                }],
            )])),
            ..Default::default()
        };

        Some(CodeAction {
            title: format!("Replace with {}", suggestion),
            kind: Some(CodeActionKind::QUICKFIX),
            diagnostics: Some(vec![diagnostic]),
            edit: Some(edit),
            is_preferred: Some(true),
            ..Default::default()
        })
    }

    async fn identifier_range(&self, uri: &Url, position: Position) -> Option<Range> {
        let path = uri.to_file_path().ok()?;
        let documents = self.documents.read().await;
        let line = documents.get(&path)?.lines().nth(position.line as usize)?;
        let (start, end) = identifier_bounds(line, position.character)?;

        Some(Range {
            start: Position {
                line: position.line,
                character: start,
            },
            end: Position {
                line: position.line,
                character: end,
            },
        })
    }
}

fn read_config(root: &Path) -> anyhow::Result<Config> {
    Config::discover(root)
        .with_context(|| format!("Failed to load {}", root.join(Config::FILE_NAME).display()))
}

/// What a completion request at the cursor is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompletionTarget {
    Tags,
    Dependencies,
}

/// The keyword closest before the cursor decides the completion list
fn completion_target(line_prefix: &str) -> Option<CompletionTarget> {
    const KEYWORDS: [(&str, CompletionTarget); 4] = [
        ("tags", CompletionTarget::Tags),
        ("dependencies", CompletionTarget::Dependencies),
        ("ref(", CompletionTarget::Dependencies),
        ("resolve(", CompletionTarget::Dependencies),
    ];

    KEYWORDS
        .iter()
        .filter_map(|(keyword, target)| line_prefix.rfind(keyword).map(|at| (at, *target)))
        .max_by_key(|(at, _)| *at)
        .map(|(_, target)| target)
}

fn completion_items(labels: Vec<String>, kind: CompletionItemKind, detail: &str) -> Vec<CompletionItem> {
    labels
        .into_iter()
        .map(|label| CompletionItem {
            label,
            kind: Some(kind),
            detail: Some(detail.to_string()),
            ..Default::default()
        })
        .collect()
}

/// Column bounds of the identifier touching `column`
fn identifier_bounds(line: &str, column: u32) -> Option<(u32, u32)> {
    let chars: Vec<char> = line.chars().collect();
    let column = column as usize;
    if column > chars.len() {
        return None;
    }

    let is_ident = |c: &char| c.is_alphanumeric() || *c == '_';
    let start = chars[..column]
        .iter()
        .rposition(|c| !is_ident(c))
        .map_or(0, |at| at + 1);
    let end = chars[column..]
        .iter()
        .position(|c| !is_ident(c))
        .map_or(chars.len(), |at| column + at);

    (start < end).then(|| (start as u32, end as u32))
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .map(|folder| folder.uri.clone())
            .or(params.root_uri)
            .and_then(|uri| uri.to_file_path().ok());
        *self.root.write().await = root;

        *self.config.write().await = self.load_config().await;

        self.client
            .log_message(MessageType::INFO, "Dataform LSP initialized")
            .await;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(true),
                        })),
                        ..Default::default()
                    },
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![DRY_RUN_COMMAND.to_string()],
                    ..Default::default()
                }),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec!["\"".to_string(), "'".to_string()]),
                    ..Default::default()
                }),
                code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.warm_project_state().await;

        self.client
            .log_message(MessageType::INFO, "Dataform LSP server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        if let Ok(path) = params.text_document.uri.to_file_path() {
            self.documents
                .write()
                .await
                .insert(path, params.text_document.text);
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let Ok(path) = params.text_document.uri.to_file_path() else {
            return;
        };

        // Full sync: the first change carries the whole text
        if let Some(change) = params.content_changes.into_iter().next() {
            self.documents.write().await.insert(path, change.text);
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let Ok(path) = params.text_document.uri.to_file_path() else {
            return;
        };

        if let Some(text) = params.text {
            self.documents.write().await.insert(path.clone(), text);
        }

        self.reload_config().await;

        if logical_file_name(&path).is_some() {
            self.spawn_dry_run(path).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        if let Ok(path) = params.text_document.uri.to_file_path() {
            self.documents.write().await.remove(&path);
        }
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        if params.command != DRY_RUN_COMMAND {
            tracing::warn!(command = %params.command, "unknown command");
            return Ok(None);
        }

        let path = params
            .arguments
            .first()
            .and_then(Value::as_str)
            .and_then(|uri| Url::parse(uri).ok())
            .and_then(|uri| uri.to_file_path().ok());

        let Some(path) = path else {
            self.client
                .show_message(MessageType::ERROR, format!("{} expects a file URI", DRY_RUN_COMMAND))
                .await;
            return Ok(None);
        };

        if let Some(outcome) = self.dry_run(path).await {
            tracing::debug!(?outcome, "dry run finished");
        }
        Ok(None)
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let Some(prefix) = self.line_prefix(&uri, position).await else {
            return Ok(None);
        };

        let items = match completion_target(&prefix) {
            Some(CompletionTarget::Tags) => {
                completion_items(self.state.tags().await, CompletionItemKind::VALUE, "tag")
            }
            Some(CompletionTarget::Dependencies) => completion_items(
                self.state.dependencies().await,
                CompletionItemKind::REFERENCE,
                "dependency",
            ),
            None => return Ok(None),
        };

        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let uri = params.text_document.uri;

        let mut actions = Vec::new();
        for diagnostic in params.context.diagnostics {
            if let Some(action) = self.quick_fix(&uri, diagnostic).await {
                actions.push(CodeActionOrCommand::CodeAction(action));
            }
        }

        Ok((!actions.is_empty()).then_some(actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_follows_nearest_keyword() {
        assert_eq!(completion_target("  tags: [\""), Some(CompletionTarget::Tags));
        assert_eq!(
            completion_target("  dependencies: [\"orders\", \""),
            Some(CompletionTarget::Dependencies)
        );
        assert_eq!(
            completion_target("select * from ${ref(\""),
            Some(CompletionTarget::Dependencies)
        );
        assert_eq!(completion_target("  tags: [\"daily\"], dependencies: [\""), Some(CompletionTarget::Dependencies));
        assert_eq!(completion_target("select order_id"), None);
    }

    #[test]
    fn identifier_around_column() {
        let line = "select MODELID, name from t";
        assert_eq!(identifier_bounds(line, 7), Some((7, 14)));
        assert_eq!(identifier_bounds(line, 10), Some((7, 14)));
        assert_eq!(identifier_bounds(line, 0), Some((0, 6)));
    }

    #[test]
    fn no_identifier_on_punctuation_or_past_end() {
        assert_eq!(identifier_bounds("a ,  b", 3), None);
        assert_eq!(identifier_bounds("abc", 10), None);
    }

    #[test]
    fn completion_items_carry_kind() {
        let items = completion_items(vec!["daily".to_string()], CompletionItemKind::VALUE, "tag");
        assert_eq!(items[0].label, "daily");
        assert_eq!(items[0].kind, Some(CompletionItemKind::VALUE));
    }
}
