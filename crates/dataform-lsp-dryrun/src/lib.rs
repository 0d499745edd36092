//! Query validation ("dry run") clients
//!
//! A dry run asks the warehouse to plan a query without executing it: the
//! service either rejects the query with a positioned error or returns an
//! estimate of the bytes it would process.
//!
//! ## Features
//!
//! Enable warehouse support via Cargo features:
//! - `bigquery` - Google BigQuery support
//!
//! ## Example
//!
//! ```rust,ignore
//! use dataform_lsp_dryrun::{BigQueryDryRun, DryRunClient};
//!
//! let client = BigQueryDryRun::with_adc("my-project").await?;
//! let result = client.dry_run("select * from dataset.orders").await?;
//! if result.has_error() {
//!     println!("{} at {}:{}", result.error.message, result.error.line_number, result.error.column_number);
//! }
//! ```

pub mod bigquery;
pub mod client;
pub mod mock;

pub use bigquery::BigQueryDryRun;
pub use client::{
    parse_error_location, DryRunClient, DryRunError, DryRunResult, DryRunStatistics, QueryError,
};
pub use mock::MockDryRunClient;
