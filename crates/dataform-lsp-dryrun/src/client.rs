//! Query validation client trait and dry-run results

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Error the validation service reported for a submitted query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryError {
    /// Whether the query was rejected
    pub has_error: bool,

    /// Line in the submitted query, as reported by the service
    pub line_number: u32,

    /// Column in the submitted query, as reported by the service
    pub column_number: u32,

    /// Service message
    pub message: String,
}

/// Cost estimate for a valid query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunStatistics {
    pub total_bytes_processed: u64,
}

impl DryRunStatistics {
    /// Bytes processed in decimal units, e.g. `1.25 GB`
    pub fn human_bytes(&self) -> String {
        const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

        let mut value = self.total_bytes_processed as f64;
        let mut unit = 0;
        while value >= 1000.0 && unit < UNITS.len() - 1 {
            value /= 1000.0;
            unit += 1;
        }

        if unit == 0 {
            format!("{} B", self.total_bytes_processed)
        } else {
            format!("{:.2} {}", value, UNITS[unit])
        }
    }
}

/// Outcome of a dry run the service completed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunResult {
    pub error: QueryError,
    pub statistics: DryRunStatistics,
}

impl DryRunResult {
    /// A valid query processing `total_bytes_processed` bytes
    pub fn success(total_bytes_processed: u64) -> Self {
        Self {
            error: QueryError::default(),
            statistics: DryRunStatistics {
                total_bytes_processed,
            },
        }
    }

    /// A query the service rejected at `line:column`
    pub fn query_error(line_number: u32, column_number: u32, message: impl Into<String>) -> Self {
        Self {
            error: QueryError {
                has_error: true,
                line_number,
                column_number,
                message: message.into(),
            },
            statistics: DryRunStatistics::default(),
        }
    }

    /// A query the service rejected, with the position read from the
    /// message's trailing `at [line:column]` (1:1 when absent)
    pub fn from_error_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let (line, column) = parse_error_location(&message).unwrap_or((1, 1));
        Self::query_error(line, column, message)
    }

    pub fn has_error(&self) -> bool {
        self.error.has_error
    }
}

fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"at \[(\d+):(\d+)\]").expect("pattern is valid"))
}

/// Read `line:column` from an error message such as
/// `Unrecognized name: foo at [3:12]`
pub fn parse_error_location(message: &str) -> Option<(u32, u32)> {
    let captures = location_pattern().captures_iter(message).last()?;
    let line = captures.get(1)?.as_str().parse().ok()?;
    let column = captures.get(2)?.as_str().parse().ok()?;
    Some((line, column))
}

/// Failures of the validation call itself (as opposed to a rejected query)
#[derive(Debug, Clone, thiserror::Error)]
pub enum DryRunError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Dry run did not finish within {0:?}")]
    Timeout(Duration),
}

/// Trait for services that can validate a query without running it
#[async_trait::async_trait]
pub trait DryRunClient: Send + Sync {
    /// Get the client name (e.g., "BigQuery")
    fn name(&self) -> &'static str;

    /// Submit `query` for validation and cost estimation.
    ///
    /// A rejected query is `Ok` with `error.has_error` set; `Err` means the
    /// service could not be asked.
    async fn dry_run(&self, query: &str) -> Result<DryRunResult, DryRunError>;
}
