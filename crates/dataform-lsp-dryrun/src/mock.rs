//! Mock dry-run client for testing
//!
//! Returns predefined results without contacting any service. Useful for:
//! - Unit testing the dry-run flow
//! - Running the editor integration without credentials
//! - Simulating transport failures and slow responses
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dataform_lsp_dryrun::{DryRunClient, DryRunResult, MockDryRunClient};
//!
//! let client = MockDryRunClient::new()
//!     .with_default_result(DryRunResult::success(1024));
//! client.add_result("select bad", DryRunResult::query_error(1, 8, "Syntax error")).await;
//!
//! let result = client.dry_run("select bad").await?;
//! assert!(result.has_error());
//! ```

use crate::client::{DryRunClient, DryRunError, DryRunResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Mock dry-run client
///
/// Results are keyed by the exact query text. Queries without a registered
/// result get the default result. Every submitted query is recorded so tests
/// can assert whether the service was called.
pub struct MockDryRunClient {
    /// Predefined results by query text
    results: Arc<RwLock<HashMap<String, DryRunResult>>>,

    /// Result for queries with no registered result
    default_result: DryRunResult,

    /// Error returned for every call, if set
    failure: Option<DryRunError>,

    /// Queries submitted so far
    calls: Arc<RwLock<Vec<String>>>,

    /// Simulated latency (milliseconds)
    latency_ms: u64,
}

impl MockDryRunClient {
    /// Create a mock that reports every query as valid with 0 bytes processed
    pub fn new() -> Self {
        Self {
            results: Arc::new(RwLock::new(HashMap::new())),
            default_result: DryRunResult::success(0),
            failure: None,
            calls: Arc::new(RwLock::new(Vec::new())),
            latency_ms: 0,
        }
    }

    /// Register the result for a specific query
    pub async fn add_result(&self, query: impl Into<String>, result: DryRunResult) {
        self.results.write().await.insert(query.into(), result);
    }

    /// Result for queries without a registered result
    pub fn with_default_result(mut self, result: DryRunResult) -> Self {
        self.default_result = result;
        self
    }

    /// Fail every call with `error`
    pub fn with_failure(mut self, error: DryRunError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Delay every call by `latency_ms` milliseconds
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Queries submitted so far, in order
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    /// Number of calls made
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }
}

impl Default for MockDryRunClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockDryRunClient {
    fn clone(&self) -> Self {
        Self {
            results: Arc::clone(&self.results),
            default_result: self.default_result.clone(),
            failure: self.failure.clone(),
            calls: Arc::clone(&self.calls),
            latency_ms: self.latency_ms,
        }
    }
}

#[async_trait::async_trait]
impl DryRunClient for MockDryRunClient {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn dry_run(&self, query: &str) -> Result<DryRunResult, DryRunError> {
        self.calls.write().await.push(query.to_string());
        self.simulate_latency().await;

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let results = self.results.read().await;
        Ok(results
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.default_result.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_result_for_unknown_queries() {
        let client = MockDryRunClient::new().with_default_result(DryRunResult::success(42));

        let result = client.dry_run("select 1").await.unwrap();
        assert_eq!(result.statistics.total_bytes_processed, 42);
        assert_eq!(client.calls().await, vec!["select 1"]);
    }

    #[tokio::test]
    async fn registered_result_wins() {
        let client = MockDryRunClient::new();
        client
            .add_result("select x", DryRunResult::query_error(1, 8, "Unrecognized name: x"))
            .await;

        assert!(client.dry_run("select x").await.unwrap().has_error());
        assert!(!client.dry_run("select 1").await.unwrap().has_error());
        assert_eq!(client.call_count().await, 2);
    }

    #[tokio::test]
    async fn failure_is_returned_for_every_call() {
        let client = MockDryRunClient::new()
            .with_failure(DryRunError::NetworkError("connection reset".to_string()));

        let err = client.dry_run("select 1").await.unwrap_err();
        assert!(matches!(err, DryRunError::NetworkError(_)));
    }

    #[tokio::test]
    async fn clones_share_call_log() {
        let client = MockDryRunClient::new();
        let clone = client.clone();

        clone.dry_run("select 1").await.unwrap();
        assert_eq!(client.call_count().await, 1);
    }
}
