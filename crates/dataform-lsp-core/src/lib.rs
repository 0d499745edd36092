//! dataform-lsp core
//!
//! Domain types and the text algorithms behind dry-run diagnostics:
//! locating the `config { ... }` block of a `.sqlx` file and translating
//! line numbers reported against the compiled query back to the source file.
//! Nothing in this crate talks to the compiler or the validation service.

pub mod config;
pub mod config_block;
pub mod diagnostic;
pub mod document;
pub mod offset;

pub use config::{CompilerConfig, Config, ConfigError, DryRunConfig};
pub use config_block::{ConfigBlockLocator, ConfigBlockSpan};
pub use diagnostic::{extract_suggestion, Diagnostic, DiagnosticCode, Position, Range, Severity};
pub use document::{find_workspace_root, is_dataform_workspace, logical_file_name, Document};
pub use offset::OffsetReconciler;
