//! Dry-run flow for Dataform source files
//!
//! This crate sequences one dry run from trigger to notice:
//! - Compile the workspace and find the current file's query
//! - Submit the query to the validation service
//! - Map a reported error back onto the source file and publish it
//! - Keep tag and target lists from the last good compile for completion

pub mod locks;
pub mod orchestrator;
pub mod publisher;
pub mod state;
pub mod surface;

pub use locks::{DocumentGuard, DocumentLocks};
pub use orchestrator::{DryRunOrchestrator, DryRunOutcome};
pub use publisher::DiagnosticPublisher;
pub use state::ProjectState;
pub use surface::{EditorSurface, MessageLevel, RecordingSurface};
