//! Dataform Language Server Protocol implementation
//!
//! This crate exposes the dry-run flow to editors over LSP.
//!
//! ## Features
//!
//! - **Dry run on save**: Saving a `.sqlx` file compiles the workspace,
//!   validates the file's query and shows the first error inline
//! - **Command**: `dataform.dryRunFile` runs the same flow on demand
//! - **Completion**: Tags and dependency names from the last compile
//! - **Quick fix**: Applies the "Did you mean" replacement from an error
//!
//! ## Usage
//!
//! The LSP server is started as a binary that communicates via stdin/stdout:
//!
//! ```bash
//! dataform-lsp
//! ```
//!
//! Build with `--features bigquery` to validate queries against BigQuery.

mod backend;
mod surface;

pub use backend::Backend;
pub use surface::LspSurface;
