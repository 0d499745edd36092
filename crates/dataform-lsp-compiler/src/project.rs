//! Compiled project model (`dataform compile --json`)
//!
//! Only the fields the editor integration reads are modelled. Every
//! collection defaults to empty and unknown keys are ignored, so partial
//! output from older or newer compilers still parses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully qualified warehouse identity of a table or assertion
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    /// Database/project name
    pub database: String,

    /// Schema/dataset name
    pub schema: String,

    /// Table name
    pub name: String,
}

impl Target {
    /// Create a new target
    pub fn new(database: impl Into<String>, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// `database.schema.name`
    pub fn full_id(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.name)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_id())
    }
}

/// A table, view or incremental table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Table {
    pub target: Target,

    /// Generated SELECT statement
    pub query: String,

    /// Source file relative to the workspace (e.g. `definitions/orders.sqlx`)
    pub file_name: String,

    pub tags: Vec<String>,

    /// Materialization (`table`, `view`, `incremental`)
    #[serde(rename = "type")]
    pub table_type: Option<String>,

    /// Query used for incremental runs
    pub incremental_query: Option<String>,

    pub pre_ops: Vec<String>,

    pub post_ops: Vec<String>,

    pub dependency_targets: Vec<Target>,
}

/// A data quality assertion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Assertion {
    pub target: Target,
    pub query: String,
    pub file_name: String,
    pub tags: Vec<String>,
}

/// A custom SQL operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Operation {
    pub target: Target,
    pub queries: Vec<String>,
    pub file_name: String,
    pub tags: Vec<String>,
}

/// An externally managed table declared for dependency resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Declaration {
    pub target: Target,
    pub file_name: String,
}

/// An error reported while compiling one source file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilationError {
    pub file_name: String,
    pub message: String,
}

/// Errors collected by the compiler instead of aborting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphErrors {
    pub compilation_errors: Vec<CompilationError>,
}

/// Structured compiler output for a whole workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompiledProject {
    pub tables: Vec<Table>,
    pub assertions: Vec<Assertion>,
    pub operations: Vec<Operation>,
    pub declarations: Vec<Declaration>,
    pub targets: Vec<Target>,
    pub graph_errors: GraphErrors,
}

impl CompiledProject {
    /// Parse compiler JSON output
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Messages of all per-file compilation errors, `file: message`
    pub fn compilation_error_messages(&self) -> Vec<String> {
        self.graph_errors
            .compilation_errors
            .iter()
            .map(|e| format!("{}: {}", e.file_name, e.message))
            .collect()
    }
}
