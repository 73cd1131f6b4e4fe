use std::{future::Future, time::Duration};

use axum::async_trait;

use crate::book::{Attributes, Book};

use super::{BookStream, PutMode, RecordStore, StoreError};

/// Bounds every call of the inner store by a timeout and retries a transient failure once.
pub struct ResilientStore<S> {
    inner: S,
    timeout: Duration,
    retry_backoff: Duration,
}

impl<S: RecordStore> ResilientStore<S> {
    pub fn new(inner: S, timeout: Duration, retry_backoff: Duration) -> Self {
        Self {
            inner,
            timeout,
            retry_backoff,
        }
    }

    async fn attempt<T, Fut>(&self, fut: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match self.attempt(call()).await {
            Err(err) if err.is_transient() => {
                tracing::warn!(store = self.inner.name(), operation, %err, backoff = ?self.retry_backoff, "Retrying");

                tokio::time::sleep(self.retry_backoff).await;

                self.attempt(call()).await
            }
            result => result,
        }
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for ResilientStore<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn put(&self, book: Book, mode: PutMode) -> Result<(), StoreError> {
        let inner = &self.inner;
        let book = &book;

        self.run("put", move || inner.put(book.clone(), mode)).await
    }

    async fn get(&self, isbn: &str) -> Result<Book, StoreError> {
        let inner = &self.inner;

        self.run("get", move || inner.get(isbn)).await
    }

    async fn scan(&self) -> Result<BookStream, StoreError> {
        let inner = &self.inner;

        self.run("scan", move || inner.scan()).await
    }

    async fn update(&self, isbn: &str, attributes: Attributes) -> Result<Book, StoreError> {
        let inner = &self.inner;
        let attributes = &attributes;

        self.run("update", move || inner.update(isbn, attributes.clone()))
            .await
    }

    async fn delete(&self, isbn: &str) -> Result<(), StoreError> {
        let inner = &self.inner;

        self.run("delete", move || inner.delete(isbn)).await
    }
}
