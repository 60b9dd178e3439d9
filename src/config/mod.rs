//! Configuration loading and management

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HTTP server and thread pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,

    /// Worker threads of the request-serving runtime
    pub event_threads: usize,

    /// Size of the blocking pool that runs backend queries
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            event_threads: 1,
            worker_threads: 16,
        }
    }
}

/// Which query backend serves the resolvers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    InMemory,
    Bigquery,
}

/// Query backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,

    /// Queries running longer than this are logged at warn level
    pub slow_query_threshold_ms: u64,

    /// Fixtures document for the in-memory backend
    pub fixtures: Option<PathBuf>,

    /// BigQuery project id
    pub project: Option<String>,

    /// BigQuery dataset location, e.g. `EU`
    pub location: Option<String>,

    /// Environment variable holding the bearer token
    pub access_token_env: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::InMemory,
            slow_query_threshold_ms: 1000,
            fixtures: None,
            project: None,
            location: None,
            access_token_env: "BIGQUERY_ACCESS_TOKEN".to_string(),
        }
    }
}

impl BackendConfig {
    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_threshold_ms)
    }
}

/// Complete process configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,

    /// Field descriptor metadata document
    pub wirings_file: PathBuf,

    /// Schema definition document
    pub schema_file: PathBuf,

    pub backend: BackendConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            wirings_file: PathBuf::from("wirings.json"),
            schema_file: PathBuf::from("schema.graphqls"),
            backend: BackendConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    ///
    /// Relative file paths in the document resolve against the directory of
    /// `path`.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // an empty document means "all defaults"
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Make every relative file path relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.wirings_file);
        resolve(&mut self.schema_file);
        if let Some(fixtures) = self.backend.fixtures.as_mut() {
            resolve(fixtures);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.event_threads == 0 {
            return Err(ConfigError::Invalid(
                "server.event_threads must be at least 1".to_string(),
            ));
        }
        if self.server.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "server.worker_threads must be at least 1".to_string(),
            ));
        }
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind must not be empty".to_string()));
        }
        if self.backend.kind == BackendKind::Bigquery
            && self.backend.project.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::Invalid(
                "backend.project is required for the bigquery backend".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.server.event_threads, 1);
        assert_eq!(config.server.worker_threads, 16);
        assert_eq!(config.wirings_file, PathBuf::from("wirings.json"));
        assert_eq!(config.schema_file, PathBuf::from("schema.graphqls"));
        assert_eq!(config.backend.kind, BackendKind::InMemory);
        assert_eq!(
            config.backend.slow_query_threshold(),
            Duration::from_millis(1000)
        );
        assert_eq!(config.backend.access_token_env, "BIGQUERY_ACCESS_TOKEN");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
server:
  worker_threads: 4
backend:
  slow_query_threshold_ms: 250
"#;
        let config = GatewayConfig::from_yaml_str(yaml).expect("valid config");
        assert_eq!(config.server.worker_threads, 4);
        assert_eq!(config.server.event_threads, 1);
        assert_eq!(config.backend.slow_query_threshold_ms, 250);
        assert_eq!(config.wirings_file, PathBuf::from("wirings.json"));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = GatewayConfig::from_yaml_str("").expect("empty config");
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_bigquery_requires_project() {
        let err = GatewayConfig::from_yaml_str("backend:\n  kind: bigquery\n")
            .expect_err("project is missing");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config =
            GatewayConfig::from_yaml_str("backend:\n  kind: bigquery\n  project: my-project\n")
                .expect("valid bigquery config");
        assert_eq!(config.backend.kind, BackendKind::Bigquery);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = GatewayConfig::from_yaml_str("server:\n  worker_threads: 0\n")
            .expect_err("zero workers");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_backend_kind_rejected() {
        let err = GatewayConfig::from_yaml_str("backend:\n  kind: postgres\n")
            .expect_err("unknown kind");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_resolve_paths() {
        let mut config = GatewayConfig::from_yaml_str(
            "schema_file: /etc/bqgraph/schema.graphqls\nbackend:\n  fixtures: fixtures.json\n",
        )
        .expect("valid config");
        config.resolve_paths(Path::new("/srv/books"));

        assert_eq!(config.wirings_file, PathBuf::from("/srv/books/wirings.json"));
        assert_eq!(
            config.schema_file,
            PathBuf::from("/etc/bqgraph/schema.graphqls")
        );
        assert_eq!(
            config.backend.fixtures,
            Some(PathBuf::from("/srv/books/fixtures.json"))
        );
    }
}
