//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:9000").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Per-request deadline in seconds, propagated to every store call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Maximum accepted upload body size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Enable request tracing.
    #[serde(default)]
    pub enable_tracing: bool,
}

fn default_bind() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_upload_bytes() -> usize {
    512 * 1024 * 1024 // 512 MiB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            enable_tracing: false,
        }
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
        /// Base URL prepended to object keys in download links.
        #[serde(default = "default_public_endpoint")]
        public_endpoint: String,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// AWS access key ID. Falls back to the SDK credential chain if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the SDK credential chain if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO
        /// and some S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
        /// Base URL prepended to object keys in download links returned to
        /// clients (typically the bucket's public endpoint).
        #[serde(default = "default_public_endpoint")]
        public_endpoint: String,
    },
}

fn default_public_endpoint() -> String {
    "http://localhost:9000/download".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
            public_endpoint: default_public_endpoint(),
        }
    }
}

impl StorageConfig {
    /// Base URL clients download artifacts from.
    pub fn public_endpoint(&self) -> &str {
        match self {
            Self::Filesystem {
                public_endpoint, ..
            } => public_endpoint,
            Self::S3 {
                public_endpoint, ..
            } => public_endpoint,
        }
    }

    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            _ => Ok(()),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
        }
    }
}

/// Update-check response cache configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheConfig {
    /// No response caching.
    #[default]
    Disabled,
    /// In-process cache, suitable for single-node deployments and tests.
    Memory,
    /// Redis-backed cache shared across replicas.
    Redis {
        /// Connection URL (e.g., "redis://:password@host:6379/0").
        url: String,
    },
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Authentication configuration.
///
/// The API key gates `/signup` (bootstrap of the admin user); the JWT
/// secret signs the bearer tokens issued by `/login`. If the secret
/// changes between restarts, previously issued tokens stop validating.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret required to create the admin user.
    pub api_key: String,
    /// HS256 signing secret for issued tokens.
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

fn default_token_ttl_secs() -> u64 {
    86400 // 24 hours
}

impl AuthConfig {
    /// Create a test configuration with dummy secrets.
    ///
    /// **For testing only.** The values are deterministic and not secret.
    pub fn for_testing() -> Self {
        Self {
            api_key: "test-api-key".to_string(),
            jwt_secret: "test-jwt-secret".to_string(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

/// Release notification configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Enable Slack-compatible webhook notifications.
    #[serde(default)]
    pub slack_enabled: bool,
    /// Webhook URL to post release messages to.
    pub slack_webhook_url: Option<String>,
}

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Response cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Authentication configuration (required).
    pub auth: AuthConfig,
    /// Notification configuration.
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage, SQLite metadata,
    /// no cache, and dummy auth secrets.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
            cache: CacheConfig::Disabled,
            auth: AuthConfig::for_testing(),
            notify: NotifyConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.request_timeout_secs, 30);
        assert!(!config.enable_tracing);
    }

    #[test]
    fn s3_config_rejects_partial_credentials() {
        let config = StorageConfig::S3 {
            bucket: "releases".to_string(),
            endpoint: None,
            region: None,
            access_key_id: Some("key".to_string()),
            secret_access_key: None,
            force_path_style: false,
            public_endpoint: default_public_endpoint(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn cache_config_defaults_to_disabled() {
        let config: CacheConfig = serde_json::from_str(r#"{"type":"disabled"}"#).unwrap();
        assert!(!config.is_enabled());
        assert!(!CacheConfig::default().is_enabled());
    }
}
