//! Record store: persistence of books keyed by isbn.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::async_trait;
use futures::stream::BoxStream;

use crate::{
    book::{Attributes, Book},
    config::{StoreConfig, StoreKind},
};

mod memory;
mod resilient;
mod sqlite;

pub use memory::MemoryStore;
pub use resilient::ResilientStore;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No book with isbn {isbn}")]
    NotFound { isbn: String },
    #[error("A book with isbn {isbn} already exists")]
    AlreadyExists { isbn: String },
    /// Transient failure, the operation may succeed if retried.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Store failure: {0}")]
    Backend(String),
    #[error("Stored record for isbn {isbn} is corrupt: {reason}")]
    Corrupt { isbn: String, reason: String },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// How [`RecordStore::put`] treats an already existing isbn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Fail with [`StoreError::AlreadyExists`].
    CreateOnly,
    /// Replace the stored attributes.
    Upsert,
}

pub type BookStream = BoxStream<'static, Result<Book, StoreError>>;

/// Every operation is atomic with respect to a single isbn.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short name used in logs and the health check.
    fn name(&self) -> &'static str;

    async fn put(&self, book: Book, mode: PutMode) -> Result<(), StoreError>;

    async fn get(&self, isbn: &str) -> Result<Book, StoreError>;

    /// Returns every stored book in unspecified order.
    async fn scan(&self) -> Result<BookStream, StoreError>;

    /// Merges `attributes` into the stored book and returns the result.
    async fn update(&self, isbn: &str, attributes: Attributes) -> Result<Book, StoreError>;

    async fn delete(&self, isbn: &str) -> Result<(), StoreError>;
}

/// Opens the configured backend wrapped in a [`ResilientStore`].
pub async fn connect(config: &StoreConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config.kind {
        StoreKind::Memory => Arc::new(ResilientStore::new(
            MemoryStore::new(),
            config.timeout(),
            config.retry_backoff(),
        )),
        StoreKind::Sqlite => {
            let sqlite = SqliteStore::open(&config.path, config.read_pool_size)
                .await
                .with_context(|| format!("Failed to open sqlite store at {}", config.path))?;

            Arc::new(ResilientStore::new(
                sqlite,
                config.timeout(),
                config.retry_backoff(),
            ))
        }
    };

    tracing::info!(store = store.name(), "Record store ready");

    Ok(store)
}
