use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dataform_lsp_compiler::commands::{
    compiled_query_command, dry_run_command, format_file_command, run_file_command, run_tag_command,
};
use dataform_lsp_compiler::{
    dependency_names, project_tags, query_for_file, CompiledProject, DataformCompiler, ProjectCompiler, RunScope,
};
use dataform_lsp_core::{find_workspace_root, logical_file_name, Config};
use dataform_lsp_dryrun::{BigQueryDryRun, DryRunClient};
use dataform_lsp_engine::{DryRunOrchestrator, DryRunOutcome};

mod terminal;

use terminal::TerminalSurface;

/// dataform-tools - Dry runs and command helpers for Dataform projects
#[derive(Parser)]
#[command(name = "dataform-tools")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Workspace root (default: nearest directory with workflow_settings.yaml or dataform.json)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/dataform-lsp.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the workspace and dry-run the query of a .sqlx file
    DryRun {
        /// Source file
        file: PathBuf,

        /// Print the compiled query after the dry run
        #[arg(long)]
        show_query: bool,
    },

    /// Compile the workspace and summarize the result
    Compile,

    /// Print the compiled query of a .sqlx file
    Query {
        /// Source file
        file: PathBuf,

        /// Write the query here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the command that runs every action with a tag
    RunTag {
        tag: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Print the command that runs the actions listed in cost output
    RunFile {
        /// Output of the `pipelines` cost command (`-` for stdin)
        #[arg(long, default_value = "-")]
        cost_output: PathBuf,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Print the cost and compiled-query pipelines for a .sqlx file
    Pipelines {
        /// Source file
        file: PathBuf,
    },

    /// Print the command that formats a file
    Format {
        /// Source file
        file: PathBuf,
    },
}

#[derive(Args)]
struct ScopeArgs {
    /// Also run upstream dependencies
    #[arg(long, conflicts_with = "include_dependents")]
    include_deps: bool,

    /// Also run downstream dependents
    #[arg(long)]
    include_dependents: bool,
}

impl ScopeArgs {
    fn scope(&self) -> RunScope {
        if self.include_deps {
            RunScope::WithDependencies
        } else if self.include_dependents {
            RunScope::WithDependents
        } else {
            RunScope::Selected
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = std::env::current_dir()?;
    let file = match &cli.command {
        Commands::DryRun { file, .. } | Commands::Query { file, .. } | Commands::Pipelines { file } | Commands::Format { file } => {
            Some(cwd.join(file))
        }
        _ => None,
    };
    let workspace = resolve_workspace(cli.workspace.as_deref(), file.as_deref(), &cwd);

    let config = load_config(cli.config.as_deref(), &workspace)?;

    if cli.verbose {
        eprintln!("{} {}", "Workspace:".cyan(), workspace.display());
    }

    match cli.command {
        Commands::DryRun { show_query, .. } => {
            let file = file.context("dry-run needs a file")?;
            dry_run_file(config, &workspace, &file, show_query).await
        }
        Commands::Compile => compile_command(&config, &workspace).await,
        Commands::Query { output, .. } => {
            let file = file.context("query needs a file")?;
            query_command(&config, &workspace, &file, output.as_deref()).await
        }
        Commands::RunTag { tag, scope } => {
            println!("{}", run_tag_command(&workspace, &tag, scope.scope()));
            Ok(())
        }
        Commands::RunFile { cost_output, scope } => print_run_file_command(&workspace, &cost_output, scope.scope()),
        Commands::Pipelines { .. } => {
            let name = file.as_deref().and_then(logical_file_name).context("Not a .sqlx file")?;
            println!("{}", dry_run_command(&workspace, &name));
            println!("{}", compiled_query_command(&workspace, &name));
            Ok(())
        }
        Commands::Format { .. } => {
            let file = file.context("format needs a file")?;
            let relative = file.strip_prefix(&workspace).unwrap_or(file.as_path());
            println!("{}", format_file_command(relative));
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Explicit workspace, else the nearest workspace above the file (or the
/// current directory), else the current directory
fn resolve_workspace(explicit: Option<&Path>, file: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(workspace) = explicit {
        return cwd.join(workspace);
    }

    let start = file.unwrap_or(cwd);
    find_workspace_root(start).unwrap_or_else(|| cwd.to_path_buf())
}

fn load_config(path: Option<&Path>, workspace: &Path) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::discover(workspace)
            .with_context(|| format!("Failed to load {}", workspace.join(Config::FILE_NAME).display())),
    }
}

async fn compile(config: &Config, workspace: &Path) -> Result<CompiledProject> {
    let compiler = DataformCompiler::from_config(&config.compiler);
    compiler
        .compile(workspace)
        .await
        .with_context(|| format!("Failed to compile {}", workspace.display()))
}

/// Dry-run command - compile, validate, and remap the first error
async fn dry_run_file(mut config: Config, workspace: &Path, file: &Path, show_query: bool) -> Result<()> {
    if show_query {
        config.show_compiled_query = true;
    }
    let compiled_sql_path = config.compiled_sql_path();

    let client = BigQueryDryRun::from_config(&config.dry_run)
        .await
        .context("Failed to create dry-run client")?;
    tracing::debug!(client = client.name(), project = client.project_id(), "dry-run client ready");

    let orchestrator = DryRunOrchestrator::new(
        Arc::new(DataformCompiler::from_config(&config.compiler)),
        Arc::new(client),
        Arc::new(TerminalSurface),
    )
    .with_config(config);

    let outcome = orchestrator.run(file, workspace).await;

    let validated = matches!(
        outcome,
        DryRunOutcome::Success { .. } | DryRunOutcome::ErrorFound(_) | DryRunOutcome::TransportFailed(_)
    );
    if show_query && validated {
        let query = std::fs::read_to_string(&compiled_sql_path)
            .with_context(|| format!("Failed to read {}", compiled_sql_path.display()))?;
        println!("{}", "Compiled query".bold().bright_blue());
        println!("{}", "=".repeat(60).bright_blue());
        println!("{}", query);
        println!("{}", "=".repeat(60).bright_blue());
    }

    if outcome == DryRunOutcome::Unsupported {
        anyhow::bail!("{} is not a .sqlx file", file.display());
    }
    if !outcome.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

/// Compile command - summarize the compiled project
async fn compile_command(config: &Config, workspace: &Path) -> Result<()> {
    let project = compile(config, workspace).await?;

    println!("{}", "Dataform Compilation Summary".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!("{} {}", "Tables:".bold(), project.tables.len());
    println!("{} {}", "Assertions:".bold(), project.assertions.len());
    println!("{} {}", "Operations:".bold(), project.operations.len());
    println!("{} {}", "Declarations:".bold(), project.declarations.len());

    let tags = project_tags(&project);
    if !tags.is_empty() {
        println!("{} {}", "Tags:".bold(), tags.join(", "));
    }

    let dependencies = dependency_names(&project);
    if !dependencies.is_empty() {
        println!("{} {}", "Targets:".bold(), dependencies.join(", "));
    }

    let errors = project.compilation_error_messages();
    if errors.is_empty() {
        println!("{}", "✓ No compilation errors".green());
    } else {
        println!("{}", "Compilation errors:".red().bold());
        for error in &errors {
            println!("  {} {}", "✗".red(), error);
        }
    }
    println!("{}", "=".repeat(60).bright_blue());

    if !errors.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

/// Query command - print or write the compiled query of one file
async fn query_command(config: &Config, workspace: &Path, file: &Path, output: Option<&Path>) -> Result<()> {
    let name = logical_file_name(file).with_context(|| format!("{} is not a .sqlx file", file.display()))?;
    let project = compile(config, workspace).await?;

    let metadata = query_for_file(&name, &project);
    if !metadata.is_found() {
        anyhow::bail!("Query for {} not found in compiled json", name);
    }

    match output {
        Some(path) => {
            std::fs::write(path, &metadata.query)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} {} ({})", "Query saved to:".green(), path.display(), metadata.target);
        }
        None => println!("{}", metadata.query),
    }

    Ok(())
}

/// Run-file command - turn cost output into a `dataform run` command
fn print_run_file_command(workspace: &Path, cost_output: &Path, scope: RunScope) -> Result<()> {
    let text = if cost_output == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("Failed to read cost output from stdin")?
    } else {
        std::fs::read_to_string(cost_output)
            .with_context(|| format!("Failed to read {}", cost_output.display()))?
    };

    match run_file_command(workspace, &text, scope).context("Cost output is not JSON lines")? {
        Some(command) => println!("{}", command),
        None => eprintln!("{}", "Nothing to run".yellow()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_flags() {
        let scope = |include_deps, include_dependents| {
            ScopeArgs {
                include_deps,
                include_dependents,
            }
            .scope()
        };
        assert_eq!(scope(false, false), RunScope::Selected);
        assert_eq!(scope(true, false), RunScope::WithDependencies);
        assert_eq!(scope(false, true), RunScope::WithDependents);
    }

    #[test]
    fn cli_parses_dry_run() {
        let cli = Cli::try_parse_from(["dataform-tools", "dry-run", "definitions/orders.sqlx", "--show-query"]).unwrap();
        assert!(matches!(cli.command, Commands::DryRun { show_query: true, .. }));
    }

    #[test]
    fn dependency_flags_conflict() {
        let result = Cli::try_parse_from(["dataform-tools", "run-tag", "daily", "--include-deps", "--include-dependents"]);
        assert!(result.is_err());
    }

    #[test]
    fn workspace_is_found_above_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("workflow_settings.yaml"), "defaultProject: p\n").unwrap();
        let file = dir.path().join("definitions").join("orders.sqlx");

        assert_eq!(resolve_workspace(None, Some(&file), Path::new("/")), dir.path());
        assert_eq!(
            resolve_workspace(Some(Path::new("/other")), Some(&file), Path::new("/")),
            Path::new("/other")
        );
    }
}
