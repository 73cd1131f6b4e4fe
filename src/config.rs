use std::{net::SocketAddr, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;

use crate::error::ErrorVerbosity;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub socket_address: SocketAddr,
    #[serde(default = "default_error_verbosity")]
    pub error_verbosity: ErrorVerbosity,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Logs every response body at `TRACE` level. Expensive.
    #[serde(default)]
    pub trace_response_body: bool,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub books: BookPolicy,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl ServerConfig {
    pub async fn from_config_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_error_verbosity() -> ErrorVerbosity {
    ErrorVerbosity::Message
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Database file, only used by [`StoreKind::Sqlite`].
    pub path: String,
    pub timeout_ms: u64,
    pub retry_backoff_ms: u64,
    pub read_pool_size: usize,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            path: "books.db".to_string(),
            timeout_ms: 2_000,
            retry_backoff_ms: 100,
            read_pool_size: 4,
        }
    }
}

/// What `POST /books` does when the isbn already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatePolicy {
    /// Answer with `409 Conflict` and leave the stored book untouched.
    #[default]
    Reject,
    /// Replace the stored book.
    Overwrite,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookPolicy {
    pub create: CreatePolicy,
    /// Require isbns to consist of exactly 13 digits.
    pub strict_isbn: bool,
    /// Require a `release_date` attribute, if present, to be `YYYY-MM-DD`.
    pub validate_release_date: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_headers: String,
    pub allow_methods: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_headers: "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token,X-Amz-User-Agent".to_string(),
            allow_methods: "OPTIONS,GET,PUT,POST,DELETE".to_string(),
        }
    }
}
