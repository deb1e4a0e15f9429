//! Configuration management
//!
//! Everything is read from the environment (with `.env` support through
//! `dotenvy`) and validated before any collaborator is built.

use serde::{Deserialize, Serialize};
use std::env;

use arca_common::types::DEFAULT_STAGING_SUFFIX;

// ============================================================================
// Engine Configuration Constants
// ============================================================================

/// Default content-store tag that marks a piece of content as a manifest.
pub const DEFAULT_MANIFEST_TAG: &str = "ingest_manifest";

/// Default number of undelivered events buffered per staging area.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Default S3 region.
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Default repository endpoint for local development.
pub const DEFAULT_REPOSITORY_URL: &str = "http://localhost:8080/fedora";

/// Default repository request timeout in seconds.
pub const DEFAULT_REPOSITORY_TIMEOUT_SECS: u64 = 60;

/// Default status index core for local development.
pub const DEFAULT_INDEX_URL: &str = "http://localhost:8983/solr/arca";

/// Default status index request timeout in seconds.
pub const DEFAULT_INDEX_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration of the ingest process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub engine: EngineSettings,
    pub queue_depth: usize,
    pub content_store: S3Config,
    pub repository: RepositoryConfig,
    pub index: IndexConfig,
}

/// Settings each staging engine is created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Tag in the content's `tags` property that marks a manifest
    pub manifest_tag: String,
    /// Suffix that turns an institution id into its staging space id
    pub staging_suffix: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            manifest_tag: DEFAULT_MANIFEST_TAG.to_string(),
            staging_suffix: DEFAULT_STAGING_SUFFIX.to_string(),
        }
    }
}

/// S3-compatible content store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
    /// Prepended to a space id to form its bucket name
    pub bucket_prefix: String,
}

/// Object repository REST endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

/// Status index core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub url: String,
    pub timeout_secs: u64,
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl IngestConfig {
    /// Load configuration from environment and defaults
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = IngestConfig {
            engine: EngineSettings {
                manifest_tag: env::var("ARCA_MANIFEST_TAG")
                    .unwrap_or_else(|_| DEFAULT_MANIFEST_TAG.to_string()),
                staging_suffix: env::var("ARCA_STAGING_SUFFIX")
                    .unwrap_or_else(|_| DEFAULT_STAGING_SUFFIX.to_string()),
            },
            queue_depth: parsed("ARCA_QUEUE_DEPTH", DEFAULT_QUEUE_DEPTH),
            content_store: S3Config::from_env(),
            repository: RepositoryConfig {
                url: env::var("REPOSITORY_URL")
                    .unwrap_or_else(|_| DEFAULT_REPOSITORY_URL.to_string()),
                username: env::var("REPOSITORY_USER").ok(),
                password: env::var("REPOSITORY_PASSWORD").ok(),
                timeout_secs: parsed("REPOSITORY_TIMEOUT_SECS", DEFAULT_REPOSITORY_TIMEOUT_SECS),
            },
            index: IndexConfig {
                url: env::var("INDEX_URL").unwrap_or_else(|_| DEFAULT_INDEX_URL.to_string()),
                timeout_secs: parsed("INDEX_TIMEOUT_SECS", DEFAULT_INDEX_TIMEOUT_SECS),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.engine.manifest_tag.trim().is_empty() {
            anyhow::bail!("Manifest tag cannot be empty");
        }

        if self.engine.manifest_tag.contains('|') {
            anyhow::bail!("Manifest tag cannot contain the tag separator '|'");
        }

        if self.engine.staging_suffix.is_empty() {
            anyhow::bail!("Staging suffix cannot be empty");
        }

        if self.queue_depth == 0 {
            anyhow::bail!("Queue depth must be greater than 0");
        }

        if !self.repository.url.starts_with("http://") && !self.repository.url.starts_with("https://") {
            anyhow::bail!("Repository URL must be an http(s) URL: {}", self.repository.url);
        }

        if self.repository.username.is_some() != self.repository.password.is_some() {
            anyhow::bail!("REPOSITORY_USER and REPOSITORY_PASSWORD must be set together");
        }

        if !self.index.url.starts_with("http://") && !self.index.url.starts_with("https://") {
            anyhow::bail!("Index URL must be an http(s) URL: {}", self.index.url);
        }

        if self.repository.timeout_secs == 0 || self.index.timeout_secs == 0 {
            anyhow::bail!("Request timeouts must be greater than 0");
        }

        Ok(())
    }
}

impl S3Config {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("S3_ENDPOINT").ok(),
            region: env::var("S3_REGION").unwrap_or_else(|_| DEFAULT_S3_REGION.to_string()),
            access_key: env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .unwrap_or_else(|_| "minioadmin".to_string()),
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .unwrap_or_else(|_| "minioadmin".to_string()),
            path_style: parsed("S3_PATH_STYLE", false),
            bucket_prefix: env::var("S3_BUCKET_PREFIX").unwrap_or_default(),
        }
    }

    pub fn for_minio(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: DEFAULT_S3_REGION.to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
            bucket_prefix: String::new(),
        }
    }

    /// Bucket backing a content-store space.
    pub fn bucket_for(&self, space_id: &str) -> String {
        format!("{}{}", self.bucket_prefix, space_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "ARCA_MANIFEST_TAG",
        "ARCA_STAGING_SUFFIX",
        "ARCA_QUEUE_DEPTH",
        "S3_BUCKET_PREFIX",
        "REPOSITORY_URL",
        "REPOSITORY_USER",
        "REPOSITORY_PASSWORD",
        "INDEX_URL",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = IngestConfig::from_env().unwrap();
        assert_eq!(config.engine, EngineSettings::default());
        assert_eq!(config.queue_depth, DEFAULT_QUEUE_DEPTH);
        assert_eq!(config.repository.url, DEFAULT_REPOSITORY_URL);
        assert_eq!(config.index.url, DEFAULT_INDEX_URL);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("ARCA_MANIFEST_TAG", "manifest");
        env::set_var("ARCA_QUEUE_DEPTH", "8");
        env::set_var("S3_BUCKET_PREFIX", "arca-");
        env::set_var("REPOSITORY_USER", "fedoraAdmin");
        env::set_var("REPOSITORY_PASSWORD", "secret");

        let config = IngestConfig::from_env().unwrap();
        assert_eq!(config.engine.manifest_tag, "manifest");
        assert_eq!(config.queue_depth, 8);
        assert_eq!(config.content_store.bucket_for("virginiastaging"), "arca-virginiastaging");
        assert_eq!(config.repository.username.as_deref(), Some("fedoraAdmin"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_validation_rejects_bad_values() {
        clear_env();
        env::set_var("ARCA_QUEUE_DEPTH", "0");
        assert!(IngestConfig::from_env().is_err());

        clear_env();
        env::set_var("REPOSITORY_USER", "fedoraAdmin");
        assert!(IngestConfig::from_env().is_err());

        clear_env();
        env::set_var("ARCA_MANIFEST_TAG", "a|b");
        assert!(IngestConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_for_minio() {
        let config = S3Config::for_minio("http://localhost:9000");
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.path_style);
        assert_eq!(config.bucket_for("virginia"), "virginia");
    }
}
