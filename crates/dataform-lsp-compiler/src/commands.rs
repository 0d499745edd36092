//! Shell command strings handed to a terminal.
//!
//! Nothing here executes a command; callers decide where the string runs.

use serde::Deserialize;
use std::path::Path;

/// Which related actions a `dataform run` includes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunScope {
    /// Only the selected actions
    #[default]
    Selected,

    /// Also run upstream dependencies
    WithDependencies,

    /// Also run downstream dependents
    WithDependents,
}

impl RunScope {
    fn flag(self) -> Option<&'static str> {
        match self {
            Self::Selected => None,
            Self::WithDependencies => Some("--include-deps"),
            Self::WithDependents => Some("--include-dependents"),
        }
    }
}

fn append_scope(mut command: String, scope: RunScope) -> String {
    if let Some(flag) = scope.flag() {
        command.push(' ');
        command.push_str(flag);
    }
    command
}

/// Estimate the cost of every action compiled from `file_name`
pub fn dry_run_command(workspace: &Path, file_name: &str) -> String {
    format!(
        "dataform compile {} --json | dj table-ops cost --compact=true --include-assertions=true --file {}",
        workspace.display(),
        file_name
    )
}

/// Print the compiled query of `file_name`
pub fn compiled_query_command(workspace: &Path, file_name: &str) -> String {
    format!(
        "dataform compile {} --json | dj table-ops query --file {}",
        workspace.display(),
        file_name
    )
}

/// Run every action tagged with `tag`
pub fn run_tag_command(workspace: &Path, tag: &str, scope: RunScope) -> String {
    append_scope(
        format!("dataform run {} --tags={}", workspace.display(), tag),
        scope,
    )
}

/// Format a single source file
pub fn format_file_command(relative_path: &Path) -> String {
    format!("formatdataform format {}", relative_path.display())
}

/// One line of `dj table-ops cost` output
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CostLine {
    pub database: String,
    pub schema: String,
    pub file_name: String,
}

impl CostLine {
    /// `database.schema.file`, the action name `dataform run` expects
    pub fn action_name(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.file_name)
    }
}

/// Parse newline-delimited cost output, skipping blank lines
pub fn parse_cost_lines(output: &str) -> Result<Vec<CostLine>, serde_json::Error> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}

/// Run the given actions.
///
/// Returns `None` when there is nothing to run.
pub fn run_actions_command(workspace: &Path, actions: &[String], scope: RunScope) -> Option<String> {
    if actions.is_empty() {
        return None;
    }

    let mut command = format!("dataform run {}", workspace.display());
    for action in actions {
        command.push_str(&format!(" --actions \"{}\"", action));
    }

    Some(append_scope(command, scope))
}

/// Build the command that runs every action the cost output lists
pub fn run_file_command(workspace: &Path, cost_output: &str, scope: RunScope) -> Result<Option<String>, serde_json::Error> {
    let actions: Vec<String> = parse_cost_lines(cost_output)?
        .iter()
        .map(CostLine::action_name)
        .collect();

    Ok(run_actions_command(workspace, &actions, scope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_commands() {
        let ws = Path::new("/ws");
        assert_eq!(run_tag_command(ws, "daily", RunScope::Selected), "dataform run /ws --tags=daily");
        assert_eq!(
            run_tag_command(ws, "daily", RunScope::WithDependencies),
            "dataform run /ws --tags=daily --include-deps"
        );
        assert_eq!(
            run_tag_command(ws, "daily", RunScope::WithDependents),
            "dataform run /ws --tags=daily --include-dependents"
        );
    }

    #[test]
    fn compile_pipelines() {
        let ws = Path::new("/ws");
        assert_eq!(
            dry_run_command(ws, "orders"),
            "dataform compile /ws --json | dj table-ops cost --compact=true --include-assertions=true --file orders"
        );
        assert_eq!(
            compiled_query_command(ws, "orders"),
            "dataform compile /ws --json | dj table-ops query --file orders"
        );
    }

    #[test]
    fn format_command() {
        assert_eq!(
            format_file_command(Path::new("definitions/orders.sqlx")),
            "formatdataform format definitions/orders.sqlx"
        );
    }

    #[test]
    fn run_file_from_cost_output() {
        let output = concat!(
            r#"{"Database":"db","Schema":"reporting","FileName":"orders","GBProcessed":0.1}"#,
            "\n",
            r#"{"Database":"db","Schema":"assertions","FileName":"orders_not_null"}"#,
            "\n"
        );

        let command = run_file_command(Path::new("/ws"), output, RunScope::WithDependencies).unwrap();
        assert_eq!(
            command.as_deref(),
            Some(r#"dataform run /ws --actions "db.reporting.orders" --actions "db.assertions.orders_not_null" --include-deps"#)
        );
    }

    #[test]
    fn nothing_to_run() {
        assert_eq!(run_file_command(Path::new("/ws"), "\n", RunScope::Selected).unwrap(), None);
    }

    #[test]
    fn malformed_cost_output() {
        assert!(run_file_command(Path::new("/ws"), "not json\n", RunScope::Selected).is_err());
    }
}
