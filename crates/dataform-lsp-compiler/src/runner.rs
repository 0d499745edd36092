//! Running the Dataform compiler as a subprocess

use crate::project::CompiledProject;
use dataform_lsp_core::CompilerConfig;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Lines the Dataform compiler emits ahead of the user's query once the
/// config block has been stripped
pub const DATAFORM_QUERY_PREAMBLE_LINES: i64 = 3;

/// Columns highlighted on a dry-run error. The validation service reports a
/// start position only.
pub const ERROR_HIGHLIGHT_WIDTH: u32 = 5;

/// Shape of the compiled query relative to its source file.
///
/// Both values describe the compiler's output, not the user's file, and must
/// be revisited whenever the compiler changes how it wraps queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLayout {
    /// Lines injected before the user's query
    pub query_string_offset: i64,

    /// Width of the highlighted range for an error position
    pub highlight_width: u32,
}

impl Default for QueryLayout {
    fn default() -> Self {
        Self {
            query_string_offset: DATAFORM_QUERY_PREAMBLE_LINES,
            highlight_width: ERROR_HIGHLIGHT_WIDTH,
        }
    }
}

/// Errors from compiling a workspace
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Failed to start compiler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Compiler exited with code {}: {stderr}", exit_code(.code))]
    Failed { code: Option<i32>, stderr: String },

    #[error("Compiler output is not a compiled project: {0}")]
    MalformedOutput(String),

    #[error("Compiler did not finish within {0:?}")]
    TimedOut(Duration),
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

/// Something that turns a workspace into a compiled project
#[async_trait::async_trait]
pub trait ProjectCompiler: Send + Sync {
    /// Compile the workspace rooted at `workspace_root`
    async fn compile(&self, workspace_root: &Path) -> Result<CompiledProject, CompileError>;

    /// Layout of the queries this compiler emits
    fn query_layout(&self) -> QueryLayout {
        QueryLayout::default()
    }
}

/// Name of the Dataform launcher on this platform
pub fn default_executable() -> &'static str {
    if cfg!(windows) {
        "dataform.cmd"
    } else {
        "dataform"
    }
}

/// Compiler backed by the `dataform` CLI
#[derive(Debug, Clone)]
pub struct DataformCompiler {
    /// Program to spawn
    program: String,

    /// Arguments placed before `compile` (e.g. `dataform` for `npx dataform`)
    leading_args: Vec<String>,

    /// Optional limit on how long compilation may take
    timeout: Option<Duration>,
}

impl Default for DataformCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl DataformCompiler {
    /// Compiler using the platform's `dataform` launcher
    pub fn new() -> Self {
        Self {
            program: default_executable().to_string(),
            leading_args: Vec::new(),
            timeout: None,
        }
    }

    /// Build from configuration.
    ///
    /// A configured executable containing whitespace (`npx dataform`) is
    /// split into program and leading arguments.
    pub fn from_config(config: &CompilerConfig) -> Self {
        let mut compiler = Self::new();

        if let Some(executable) = &config.executable {
            let mut parts = executable.split_whitespace().map(str::to_string);
            if let Some(program) = parts.next() {
                compiler.program = program;
                compiler.leading_args = parts.collect();
            }
        }

        compiler.timeout = config.timeout();
        compiler
    }

    /// Use a specific program and leading arguments
    pub fn with_command(mut self, program: impl Into<String>, leading_args: Vec<String>) -> Self {
        self.program = program.into();
        self.leading_args = leading_args;
        self
    }

    /// Abort compilation after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Program that will be spawned
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument list for compiling `workspace_root`
    pub fn args(&self, workspace_root: &Path) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.push("compile".to_string());
        args.push(workspace_root.display().to_string());
        args.push("--json".to_string());
        args
    }

    /// Spawn the compiler and wait for it to exit.
    ///
    /// stdout and stderr are collected separately and only inspected once
    /// the process has exited.
    async fn run(&self, workspace_root: &Path) -> Result<std::process::Output, CompileError> {
        let args = self.args(workspace_root);
        tracing::debug!(program = %self.program, ?args, "spawning compiler");

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .current_dir(workspace_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = command.output();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, output)
                .await
                .map_err(|_| CompileError::TimedOut(limit))?,
            None => output.await,
        };

        result.map_err(|source| CompileError::Spawn {
            program: self.program.clone(),
            source,
        })
    }
}

#[async_trait::async_trait]
impl ProjectCompiler for DataformCompiler {
    async fn compile(&self, workspace_root: &Path) -> Result<CompiledProject, CompileError> {
        let output = self.run(workspace_root).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(code = ?output.status.code(), "compiler failed");
            return Err(CompileError::Failed {
                code: output.status.code(),
                stderr: failure_detail(&stdout, &stderr),
            });
        }

        let project = CompiledProject::from_json(&stdout)
            .map_err(|e| CompileError::MalformedOutput(e.to_string()))?;

        tracing::debug!(
            tables = project.tables.len(),
            assertions = project.assertions.len(),
            "compiled workspace"
        );

        Ok(project)
    }
}

/// Text describing why compilation failed.
///
/// Prefers stderr; when it is empty, falls back to the compilation errors
/// the compiler printed as JSON on stdout, then to raw stdout.
fn failure_detail(stdout: &str, stderr: &str) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }

    match CompiledProject::from_json(stdout) {
        Ok(project) if !project.graph_errors.compilation_errors.is_empty() => {
            project.compilation_error_messages().join("\n")
        }
        _ => stdout.trim().to_string(),
    }
}
