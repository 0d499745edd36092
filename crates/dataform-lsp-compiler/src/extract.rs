//! Looking up the compiled query for a source file, and the project-wide
//! lists used for autocompletion

use crate::project::{CompiledProject, Target};
use std::collections::HashSet;
use std::path::Path;

/// Compiled query and identity of the action defined by one source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableMetadata {
    pub tags: Vec<String>,

    /// Logical file name the lookup was made with
    pub file_name: String,

    /// Generated query; empty when no action matched
    pub query: String,

    pub target: Target,
}

impl TableMetadata {
    /// The "no action for this file" value
    pub fn not_found() -> Self {
        Self::default()
    }

    /// Whether a matching action was found
    pub fn is_found(&self) -> bool {
        !self.query.is_empty()
    }
}

/// Base name of a compiled file name up to the first `.`
fn base_name(file_name: &str) -> &str {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(file_name);
    base.split('.').next().unwrap_or(base)
}

/// Find the action compiled from `file_name` (a logical name such as
/// `orders`).
///
/// Tables are searched before assertions and the first match wins. When
/// nothing matches, the returned value has an empty `query`; check
/// [`TableMetadata::is_found`].
pub fn query_for_file(file_name: &str, project: &CompiledProject) -> TableMetadata {
    let tables = project
        .tables
        .iter()
        .map(|t| (&t.file_name, &t.query, &t.tags, &t.target));
    let assertions = project
        .assertions
        .iter()
        .map(|a| (&a.file_name, &a.query, &a.tags, &a.target));

    tables
        .chain(assertions)
        .find(|(compiled_file, ..)| base_name(compiled_file) == file_name)
        .map(|(_, query, tags, target)| TableMetadata {
            tags: tags.clone(),
            file_name: file_name.to_string(),
            query: query.clone(),
            target: target.clone(),
        })
        .unwrap_or_else(TableMetadata::not_found)
}

/// Push `items` into `out`, skipping anything already present
fn push_unique<'a>(out: &mut Vec<String>, seen: &mut HashSet<&'a str>, items: impl IntoIterator<Item = &'a String>) {
    for item in items {
        if seen.insert(item.as_str()) {
            out.push(item.clone());
        }
    }
}

/// All tags used by tables and assertions, in first-seen order
pub fn project_tags(project: &CompiledProject) -> Vec<String> {
    let mut tags = Vec::new();
    let mut seen = HashSet::new();

    for table in &project.tables {
        push_unique(&mut tags, &mut seen, &table.tags);
    }
    for assertion in &project.assertions {
        push_unique(&mut tags, &mut seen, &assertion.tags);
    }

    tags
}

/// Names of all compiled targets and declarations, in first-seen order
pub fn dependency_names(project: &CompiledProject) -> Vec<String> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();

    push_unique(&mut names, &mut seen, project.targets.iter().map(|t| &t.name));
    push_unique(
        &mut names,
        &mut seen,
        project.declarations.iter().map(|d| &d.target.name),
    );

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Assertion, Declaration, Table};

    fn table(file: &str, name: &str, tags: &[&str]) -> Table {
        Table {
            target: Target::new("db", "schema", name),
            query: format!("select * from {}", name),
            file_name: format!("definitions/{}.sqlx", file),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    fn project() -> CompiledProject {
        CompiledProject {
            tables: vec![
                table("orders", "orders", &["daily", "finance"]),
                table("customers", "customers", &["daily"]),
            ],
            assertions: vec![Assertion {
                target: Target::new("db", "assertions", "orders_not_null"),
                query: "select * from orders where id is null".to_string(),
                file_name: "definitions/checks/orders_not_null.sqlx".to_string(),
                tags: vec!["quality".to_string(), "daily".to_string()],
            }],
            declarations: vec![
                Declaration {
                    target: Target::new("db", "raw", "raw_orders"),
                    file_name: "definitions/sources.js".to_string(),
                },
                Declaration {
                    target: Target::new("db", "schema", "orders"),
                    file_name: "definitions/sources.js".to_string(),
                },
            ],
            targets: vec![
                Target::new("db", "schema", "orders"),
                Target::new("db", "schema", "customers"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn finds_table_by_file_name() {
        let metadata = query_for_file("orders", &project());

        assert!(metadata.is_found());
        assert_eq!(metadata.query, "select * from orders");
        assert_eq!(metadata.target.full_id(), "db.schema.orders");
        assert_eq!(metadata.file_name, "orders");
        assert_eq!(metadata.tags, vec!["daily", "finance"]);
    }

    #[test]
    fn missing_file_returns_sentinel() {
        let metadata = query_for_file("missing", &project());

        assert!(!metadata.is_found());
        assert_eq!(metadata, TableMetadata::not_found());
        assert!(metadata.query.is_empty());
    }

    #[test]
    fn falls_back_to_assertions() {
        let metadata = query_for_file("orders_not_null", &project());
        assert_eq!(metadata.target.name, "orders_not_null");
    }

    #[test]
    fn base_name_ignores_directories_and_extensions() {
        assert_eq!(base_name("definitions/staging/stg_orders.sqlx"), "stg_orders");
        assert_eq!(base_name("orders.sqlx"), "orders");
        assert_eq!(base_name("orders"), "orders");
    }

    #[test]
    fn tags_are_deduplicated() {
        assert_eq!(project_tags(&project()), vec!["daily", "finance", "quality"]);
    }

    #[test]
    fn dependency_names_are_deduplicated() {
        assert_eq!(
            dependency_names(&project()),
            vec!["orders", "customers", "raw_orders"]
        );
    }

    #[test]
    fn empty_project_has_no_completions() {
        let project = CompiledProject::default();
        assert!(project_tags(&project).is_empty());
        assert!(dependency_names(&project).is_empty());
    }
}
