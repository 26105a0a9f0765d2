//! Intake configuration
//!
//! Read from an optional TOML file, then overridden from the environment.
//! The storage backend is fixed here, once, before the pipeline is built.

use crate::error::IntakeError;
use bridge_artifact::{RetryPolicy, StorageConfig, DEFAULT_ACL_HEADER};
use bridge_store::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bucket for object storage
pub const DEFAULT_BUCKET: &str = "bridge-lead-pdfs";
/// Default object storage endpoint
pub const DEFAULT_OBJECT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Background document retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentRetryConfig {
    pub enabled: bool,
    /// Attempts per lead, counting the inline one at submission
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Pause between scans for due leads
    pub scan_interval_ms: u64,
    /// Leads picked up per scan
    pub batch_size: u32,
}

impl Default for DocumentRetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            base_backoff_ms: 500,
            max_backoff_ms: 60_000,
            scan_interval_ms: 15_000,
            batch_size: 25,
        }
    }
}

impl DocumentRetryConfig {
    /// Backoff schedule between attempts on one lead
    #[must_use]
    pub fn backoff(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_backoff_ms: self.base_backoff_ms,
            max_backoff_ms: self.max_backoff_ms,
        }
    }

    #[inline]
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }
}

/// Everything needed to assemble the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub render_timeout_ms: u64,
    pub store_timeout_ms: u64,
    pub document_retry: DocumentRetryConfig,
    /// TOML or YAML product catalog; the built-in catalog when absent
    pub catalog_path: Option<PathBuf>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            render_timeout_ms: 10_000,
            store_timeout_ms: 30_000,
            document_retry: DocumentRetryConfig::default(),
            catalog_path: None,
        }
    }
}

impl IntakeConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns `Config` when the text is not a valid configuration
    pub fn from_toml_str(text: &str) -> Result<Self, IntakeError> {
        toml::from_str(text).map_err(|e| IntakeError::Config(e.to_string()))
    }

    /// Load `path` if given, then apply process environment overrides
    ///
    /// # Errors
    /// Returns `Config` when the file cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self, IntakeError> {
        let base = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| IntakeError::Config(format!("{}: {e}", path.display())))?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        base.with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply deployment overrides read through `var`.
    ///
    /// `USE_GCS_STORAGE=true` switches to object storage (`GCS_BUCKET_NAME`,
    /// `GCS_ENDPOINT`, `GCS_BEARER_TOKEN`, `GCS_PUBLIC_BASE_URL`); otherwise
    /// `MEDIA_ROOT` and `MEDIA_URL` adjust local storage.
    ///
    /// # Errors
    /// Returns `Config` for unparsable numeric or boolean values
    pub fn with_env_overrides<F>(mut self, var: F) -> Result<Self, IntakeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var("BRIDGE_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(size) = var("BRIDGE_POOL_SIZE") {
            self.database.pool_size = parse_number("BRIDGE_POOL_SIZE", &size)?;
        }
        if let Some(ms) = var("BRIDGE_RENDER_TIMEOUT_MS") {
            self.render_timeout_ms = parse_number("BRIDGE_RENDER_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = var("BRIDGE_STORE_TIMEOUT_MS") {
            self.store_timeout_ms = parse_number("BRIDGE_STORE_TIMEOUT_MS", &ms)?;
        }
        if let Some(flag) = var("BRIDGE_DOCUMENT_RETRY") {
            self.document_retry.enabled = parse_flag("BRIDGE_DOCUMENT_RETRY", &flag)?;
        }
        if let Some(path) = var("BRIDGE_CATALOG_PATH") {
            self.catalog_path = Some(PathBuf::from(path));
        }

        let use_object = match var("USE_GCS_STORAGE") {
            Some(flag) => parse_flag("USE_GCS_STORAGE", &flag)?,
            None => matches!(self.storage, StorageConfig::Object { .. }),
        };
        self.storage = if use_object {
            let (mut endpoint, mut bucket, mut public_base_url, mut bearer_token, acl_header, retry) =
                match self.storage {
                    StorageConfig::Object {
                        endpoint,
                        bucket,
                        public_base_url,
                        bearer_token,
                        acl_header,
                        retry,
                    } => (endpoint, bucket, public_base_url, bearer_token, acl_header, retry),
                    StorageConfig::Local { .. } => (
                        DEFAULT_OBJECT_ENDPOINT.to_string(),
                        DEFAULT_BUCKET.to_string(),
                        None,
                        None,
                        Some(DEFAULT_ACL_HEADER.to_string()),
                        RetryPolicy::default(),
                    ),
                };
            if let Some(v) = var("GCS_ENDPOINT") {
                endpoint = v;
            }
            if let Some(v) = var("GCS_BUCKET_NAME") {
                bucket = v;
            }
            if let Some(v) = var("GCS_PUBLIC_BASE_URL") {
                public_base_url = Some(v);
            }
            if let Some(v) = var("GCS_BEARER_TOKEN") {
                bearer_token = Some(v);
            }
            StorageConfig::Object {
                endpoint,
                bucket,
                public_base_url,
                bearer_token,
                acl_header,
                retry,
            }
        } else {
            let (mut root, mut public_base_url) = match self.storage {
                StorageConfig::Local {
                    root,
                    public_base_url,
                } => (root, public_base_url),
                StorageConfig::Object { .. } => (PathBuf::from("media"), "/media".to_string()),
            };
            if let Some(v) = var("MEDIA_ROOT") {
                root = PathBuf::from(v);
            }
            if let Some(v) = var("MEDIA_URL") {
                public_base_url = v;
            }
            StorageConfig::Local {
                root,
                public_base_url,
            }
        };
        Ok(self)
    }

    #[inline]
    #[must_use]
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    #[inline]
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, IntakeError> {
    raw.trim()
        .parse()
        .map_err(|_| IntakeError::Config(format!("{name}: expected a number, got {raw:?}")))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, IntakeError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(IntakeError::Config(format!("{name}: expected true/false, got {raw:?}"))),
    }
}
