//! Dataform compiler integration
//!
//! This crate handles:
//! - Running `dataform compile --json` and parsing its output
//! - Finding the compiled query for a `.sqlx` file
//! - Tag and dependency lists for autocompletion
//! - Building `dataform run` / formatter command strings

pub mod commands;
pub mod extract;
pub mod mock;
pub mod project;
pub mod runner;

pub use commands::RunScope;
pub use extract::{dependency_names, project_tags, query_for_file, TableMetadata};
pub use mock::MockCompiler;
pub use project::{Assertion, CompiledProject, Declaration, Operation, Table, Target};
pub use runner::{CompileError, DataformCompiler, ProjectCompiler, QueryLayout};
