//! Configuration schema (dataform-lsp.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Compiler invocation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Override for the compiler executable (defaults to the platform's
    /// `dataform` launcher)
    #[serde(default)]
    pub executable: Option<String>,

    /// Abort compilation after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl CompilerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Validation service settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunConfig {
    /// Project billed for dry runs
    #[serde(default)]
    pub project_id: Option<String>,

    /// Processing location (e.g. `US`, `EU`)
    #[serde(default)]
    pub location: Option<String>,

    /// Service account key file; Application Default Credentials otherwise
    #[serde(default)]
    pub service_account_key: Option<PathBuf>,

    /// Abort the validation call after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl DryRunConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Configured project, falling back to `GOOGLE_CLOUD_PROJECT`
    pub fn resolved_project_id(&self) -> Option<String> {
        self.project_id
            .clone()
            .or_else(|| std::env::var("GOOGLE_CLOUD_PROJECT").ok())
            .filter(|project| !project.is_empty())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Lines the compiler wrapper emits before the user's query.
    /// Defaults to the value supplied by the compiler integration.
    #[serde(default)]
    pub query_string_offset: Option<i64>,

    /// Width of the highlighted range on a dry-run error.
    /// Defaults to the value supplied by the compiler integration.
    #[serde(default)]
    pub highlight_width: Option<u32>,

    /// Write the editor buffer to disk before compiling
    #[serde(default = "default_true")]
    pub save_before_dry_run: bool,

    /// Write the compiled query to `compiled_sql_path` on every dry run
    #[serde(default)]
    pub show_compiled_query: bool,

    /// Destination of the compiled query
    #[serde(default)]
    pub compiled_sql_path: Option<PathBuf>,

    /// Compiler settings
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Validation service settings
    #[serde(default)]
    pub dry_run: DryRunConfig,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query_string_offset: None,
            highlight_width: None,
            save_before_dry_run: true,
            show_compiled_query: false,
            compiled_sql_path: None,
            compiler: CompilerConfig::default(),
            dry_run: DryRunConfig::default(),
        }
    }
}

impl Config {
    /// File name looked up at the workspace root
    pub const FILE_NAME: &'static str = "dataform-lsp.toml";

    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load `dataform-lsp.toml` from a workspace root, or defaults when the
    /// file does not exist
    pub fn discover(workspace_root: &Path) -> Result<Self, ConfigError> {
        let path = workspace_root.join(Self::FILE_NAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Where the compiled query is written
    pub fn compiled_sql_path(&self) -> PathBuf {
        self.compiled_sql_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("output.sql"))
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.save_before_dry_run);
        assert!(!config.show_compiled_query);
        assert_eq!(config.query_string_offset, None);
        assert_eq!(config.compiler.timeout(), None);
    }

    #[test]
    fn empty_toml_matches_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml(
            r#"
            query_string_offset = 4
            highlight_width = 8
            save_before_dry_run = false
            show_compiled_query = true
            compiled_sql_path = "/tmp/compiled.sql"

            [compiler]
            executable = "npx dataform"
            timeout_secs = 30

            [dry_run]
            project_id = "analytics-prod"
            location = "EU"
            "#,
        )
        .unwrap();

        assert_eq!(config.query_string_offset, Some(4));
        assert_eq!(config.highlight_width, Some(8));
        assert!(!config.save_before_dry_run);
        assert_eq!(config.compiled_sql_path(), PathBuf::from("/tmp/compiled.sql"));
        assert_eq!(config.compiler.executable.as_deref(), Some("npx dataform"));
        assert_eq!(config.compiler.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.dry_run.resolved_project_id().as_deref(), Some("analytics-prod"));
        assert_eq!(config.dry_run.location.as_deref(), Some("EU"));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = Config::from_toml("query_string_offset = \"three\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap(), Config::default());

        std::fs::write(dir.path().join(Config::FILE_NAME), "highlight_width = 3\n").unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap().highlight_width, Some(3));
    }
}
