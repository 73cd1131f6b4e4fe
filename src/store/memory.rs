use std::collections::HashMap;

use axum::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;

use crate::book::{Attributes, Book};

use super::{BookStream, PutMode, RecordStore, StoreError};

/// Keeps all books in process memory. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    books: RwLock<HashMap<String, Attributes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, book: Book, mode: PutMode) -> Result<(), StoreError> {
        let mut books = self.books.write().await;

        if mode == PutMode::CreateOnly && books.contains_key(&book.isbn) {
            return Err(StoreError::AlreadyExists { isbn: book.isbn });
        }

        books.insert(book.isbn, book.attributes);

        Ok(())
    }

    async fn get(&self, isbn: &str) -> Result<Book, StoreError> {
        let books = self.books.read().await;

        books
            .get(isbn)
            .map(|attributes| Book::new(isbn, attributes.clone()))
            .ok_or_else(|| StoreError::NotFound {
                isbn: isbn.to_string(),
            })
    }

    async fn scan(&self) -> Result<BookStream, StoreError> {
        let snapshot: Vec<Book> = self
            .books
            .read()
            .await
            .iter()
            .map(|(isbn, attributes)| Book::new(isbn.clone(), attributes.clone()))
            .collect();

        Ok(stream::iter(snapshot.into_iter().map(Ok)).boxed())
    }

    async fn update(&self, isbn: &str, attributes: Attributes) -> Result<Book, StoreError> {
        let mut books = self.books.write().await;

        let stored = books.get_mut(isbn).ok_or_else(|| StoreError::NotFound {
            isbn: isbn.to_string(),
        })?;

        let mut book = Book::new(isbn, std::mem::take(stored));
        book.merge(attributes);
        *stored = book.attributes.clone();

        Ok(book)
    }

    async fn delete(&self, isbn: &str) -> Result<(), StoreError> {
        self.books
            .write()
            .await
            .remove(isbn)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                isbn: isbn.to_string(),
            })
    }
}
