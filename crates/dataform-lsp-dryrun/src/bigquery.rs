//! BigQuery dry-run client
//!
//! Submits the query as a dry-run job: BigQuery validates it and estimates
//! the bytes it would scan, without running it. Requires the
//! `bigquery.jobs.create` permission on the billing project.
//!
//! ## Authentication
//!
//! 1. Service account JSON file (explicit path)
//! 2. Application Default Credentials (ADC)
//!
//! ## Usage
//!
//! ```rust,ignore
//! let client = BigQueryDryRun::with_adc("my-project").await?;
//! let result = client.dry_run("select 1").await?;
//! ```
//!
//! Reference: https://cloud.google.com/bigquery/docs/dry-run-queries

use crate::client::{DryRunClient, DryRunError, DryRunResult};

#[cfg(feature = "bigquery")]
use gcp_bigquery_client::{error::BQError, model::query_request::QueryRequest, Client as BigQueryClient};

/// HTTP statuses BigQuery uses for a query it refuses to plan
#[cfg(feature = "bigquery")]
const QUERY_REJECTED_CODES: [i64; 2] = [400, 404];

/// BigQuery dry-run client
pub struct BigQueryDryRun {
    /// Billing project
    project_id: String,

    /// Processing location, if pinned
    location: Option<String>,

    /// BigQuery client (only available with bigquery feature)
    #[cfg(feature = "bigquery")]
    client: BigQueryClient,
}

impl BigQueryDryRun {
    /// Create a client using Application Default Credentials (ADC)
    ///
    /// ADC automatically detects credentials from:
    /// - GOOGLE_APPLICATION_CREDENTIALS environment variable
    /// - gcloud CLI default credentials
    /// - GCE/GKE metadata service
    #[cfg(feature = "bigquery")]
    pub async fn with_adc(project_id: impl Into<String>) -> Result<Self, DryRunError> {
        let client = BigQueryClient::from_application_default_credentials()
            .await
            .map_err(|e| DryRunError::AuthenticationError(format!(
                "Failed to authenticate with ADC: {}. \
                 Ensure GOOGLE_APPLICATION_CREDENTIALS is set or run 'gcloud auth application-default login'",
                e
            )))?;

        Ok(Self {
            project_id: project_id.into(),
            location: None,
            client,
        })
    }

    /// Create client without bigquery feature (returns error)
    #[cfg(not(feature = "bigquery"))]
    pub async fn with_adc(project_id: impl Into<String>) -> Result<Self, DryRunError> {
        let _ = project_id;
        Err(not_compiled())
    }

    /// Create a client using a service account key file
    #[cfg(feature = "bigquery")]
    pub async fn from_service_account_file(
        project_id: impl Into<String>,
        key_path: impl AsRef<std::path::Path>,
    ) -> Result<Self, DryRunError> {
        let key_path_str = key_path.as_ref().to_string_lossy().to_string();

        let client = BigQueryClient::from_service_account_key_file(&key_path_str)
            .await
            .map_err(|e| DryRunError::AuthenticationError(format!(
                "Failed to read service account key file '{}': {}",
                key_path_str, e
            )))?;

        Ok(Self {
            project_id: project_id.into(),
            location: None,
            client,
        })
    }

    /// Create client without bigquery feature (returns error)
    #[cfg(not(feature = "bigquery"))]
    pub async fn from_service_account_file(
        project_id: impl Into<String>,
        _key_path: impl AsRef<std::path::Path>,
    ) -> Result<Self, DryRunError> {
        let _ = project_id;
        Err(not_compiled())
    }

    /// Build a client from `[dry_run]` configuration
    pub async fn from_config(config: &dataform_lsp_core::DryRunConfig) -> Result<Self, DryRunError> {
        let project_id = config.resolved_project_id().ok_or_else(|| {
            DryRunError::ConfigError(
                "No billing project: set dry_run.project_id or GOOGLE_CLOUD_PROJECT".to_string(),
            )
        })?;

        let client = match &config.service_account_key {
            Some(key) => Self::from_service_account_file(project_id, key).await?,
            None => Self::with_adc(project_id).await?,
        };

        Ok(client.with_location(config.location.clone()))
    }

    /// Pin the processing location
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Billing project
    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

#[cfg(not(feature = "bigquery"))]
fn not_compiled() -> DryRunError {
    DryRunError::ConfigError(
        "BigQuery support not compiled. Rebuild with: cargo build --features bigquery".to_string(),
    )
}

/// Classify a transport-level failure
#[cfg(feature = "bigquery")]
fn transport_error(err_str: String) -> DryRunError {
    if err_str.contains("Access Denied") || err_str.contains("Permission") {
        DryRunError::PermissionDenied(err_str)
    } else if err_str.contains("invalid_grant") || err_str.contains("Unauthorized") {
        DryRunError::AuthenticationError(err_str)
    } else {
        DryRunError::NetworkError(err_str)
    }
}

/// Bytes processed as reported by BigQuery (a decimal string)
pub fn parse_total_bytes(value: Option<&str>) -> Result<u64, DryRunError> {
    match value {
        None => Ok(0),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| DryRunError::InvalidResponse(format!("totalBytesProcessed '{}': {}", raw, e))),
    }
}

#[async_trait::async_trait]
impl DryRunClient for BigQueryDryRun {
    fn name(&self) -> &'static str {
        "BigQuery"
    }

    #[cfg(feature = "bigquery")]
    async fn dry_run(&self, query: &str) -> Result<DryRunResult, DryRunError> {
        let mut request = QueryRequest::new(query.to_string());
        request.dry_run = Some(true);
        request.use_legacy_sql = false;
        request.location = self.location.clone();

        tracing::debug!(project = %self.project_id, "submitting dry run");

        match self.client.job().query(&self.project_id, request).await {
            Ok(response) => {
                let bytes = parse_total_bytes(response.total_bytes_processed.as_deref())?;
                Ok(DryRunResult::success(bytes))
            }
            Err(BQError::ResponseError { error }) if QUERY_REJECTED_CODES.contains(&error.error.code) => {
                Ok(DryRunResult::from_error_message(error.error.message))
            }
            Err(e) => Err(transport_error(e.to_string())),
        }
    }

    #[cfg(not(feature = "bigquery"))]
    async fn dry_run(&self, _query: &str) -> Result<DryRunResult, DryRunError> {
        Err(not_compiled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_bytes_parsing() {
        assert_eq!(parse_total_bytes(Some("1048576")).unwrap(), 1_048_576);
        assert_eq!(parse_total_bytes(None).unwrap(), 0);
        assert!(matches!(
            parse_total_bytes(Some("lots")),
            Err(DryRunError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    #[cfg(not(feature = "bigquery"))]
    async fn client_creation_requires_feature() {
        let result = BigQueryDryRun::with_adc("my-project").await;
        assert!(matches!(result, Err(DryRunError::ConfigError(_))));
    }

    #[tokio::test]
    async fn config_without_project_is_rejected() {
        let config = dataform_lsp_core::DryRunConfig {
            project_id: Some(String::new()),
            ..Default::default()
        };

        // An explicitly empty project is not replaced by the environment
        let result = BigQueryDryRun::from_config(&config).await;
        assert!(matches!(result, Err(DryRunError::ConfigError(_))));
    }
}
