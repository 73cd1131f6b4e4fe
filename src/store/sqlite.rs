use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::async_trait;
use deadpool_sqlite::{Config, Pool, Runtime};
use futures::stream::{self, StreamExt};
use rusqlite::{Connection, ErrorCode, OptionalExtension};

use crate::book::{Attributes, Book};

use super::{BookStream, PutMode, RecordStore, StoreError};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;

CREATE TABLE IF NOT EXISTS books (
    isbn TEXT PRIMARY KEY,
    attributes TEXT NOT NULL
);
"#;

/// How long a connection waits on a locked database before reporting it busy.
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<deadpool_sqlite::PoolError> for StoreError {
    fn from(err: deadpool_sqlite::PoolError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<deadpool_sqlite::InteractError> for StoreError {
    fn from(err: deadpool_sqlite::InteractError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Books persisted in a single SQLite table, attributes stored as JSON.
///
/// Writes go through one dedicated connection so that concurrent writes to an isbn are
/// serialized. Reads use a pool of connections.
pub struct SqliteStore {
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Pool,
}

impl SqliteStore {
    pub async fn open(path: &str, read_pool_size: usize) -> Result<Self, StoreError> {
        let write_conn = Connection::open(path)?;
        write_conn.busy_timeout(BUSY_TIMEOUT)?;
        write_conn.execute_batch(SCHEMA_SQL)?;

        let read_pool = Config::new(path)
            .builder(Runtime::Tokio1)
            .map_err(|err| StoreError::Backend(err.to_string()))?
            .max_size(read_pool_size.max(1))
            .build()
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        tracing::debug!(%path, read_pool_size, "Opened sqlite store");

        Ok(Self {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
        })
    }

    /// Runs `f` on the write connection on the blocking thread pool.
    async fn write<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.write_conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| StoreError::Backend("Write connection poisoned".to_string()))?;

            f(&mut conn)
        })
        .await
        .map_err(|err| StoreError::Backend(err.to_string()))?
    }

    /// Runs `f` on a pooled read connection.
    async fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.read_pool.get().await?;

        conn.interact(move |conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            f(conn)
        })
        .await?
    }
}

fn encode(attributes: &Attributes) -> Result<String, StoreError> {
    serde_json::to_string(attributes).map_err(|err| StoreError::Backend(err.to_string()))
}

fn decode(isbn: String, json: &str) -> Result<Book, StoreError> {
    match serde_json::from_str::<Attributes>(json) {
        Ok(attributes) => Ok(Book::new(isbn, attributes)),
        Err(err) => Err(StoreError::Corrupt {
            isbn,
            reason: err.to_string(),
        }),
    }
}

fn select(conn: &Connection, isbn: &str) -> Result<Option<String>, StoreError> {
    let json = conn
        .query_row(
            "SELECT attributes FROM books WHERE isbn = ?1",
            [isbn],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    Ok(json)
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn put(&self, book: Book, mode: PutMode) -> Result<(), StoreError> {
        let json = encode(&book.attributes)?;

        self.write(move |conn| {
            let sql = match mode {
                PutMode::CreateOnly => {
                    "INSERT INTO books (isbn, attributes) VALUES (?1, ?2) ON CONFLICT(isbn) DO NOTHING"
                }
                PutMode::Upsert => {
                    "INSERT INTO books (isbn, attributes) VALUES (?1, ?2) ON CONFLICT(isbn) DO UPDATE SET attributes = excluded.attributes"
                }
            };

            let rows = conn.execute(sql, rusqlite::params![&book.isbn, &json])?;

            if rows == 0 {
                return Err(StoreError::AlreadyExists { isbn: book.isbn });
            }

            Ok(())
        })
        .await
    }

    async fn get(&self, isbn: &str) -> Result<Book, StoreError> {
        let isbn = isbn.to_string();

        self.read(move |conn| match select(conn, &isbn)? {
            Some(json) => decode(isbn, &json),
            None => Err(StoreError::NotFound { isbn }),
        })
        .await
    }

    async fn scan(&self) -> Result<BookStream, StoreError> {
        let rows = self
            .read(|conn| {
                let mut stmt = conn.prepare("SELECT isbn, attributes FROM books")?;

                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(rows)
            })
            .await?;

        Ok(stream::iter(rows.into_iter().map(|(isbn, json)| decode(isbn, &json))).boxed())
    }

    async fn update(&self, isbn: &str, attributes: Attributes) -> Result<Book, StoreError> {
        let isbn = isbn.to_string();

        self.write(move |conn| {
            let tx = conn.transaction()?;

            let Some(json) = select(&tx, &isbn)? else {
                return Err(StoreError::NotFound { isbn });
            };

            let mut book = decode(isbn, &json)?;
            book.merge(attributes);

            tx.execute(
                "UPDATE books SET attributes = ?2 WHERE isbn = ?1",
                rusqlite::params![&book.isbn, encode(&book.attributes)?],
            )?;
            tx.commit()?;

            Ok(book)
        })
        .await
    }

    async fn delete(&self, isbn: &str) -> Result<(), StoreError> {
        let isbn = isbn.to_string();

        self.write(move |conn| {
            let rows = conn.execute("DELETE FROM books WHERE isbn = ?1", [&isbn])?;

            if rows == 0 {
                return Err(StoreError::NotFound { isbn });
            }

            Ok(())
        })
        .await
    }
}
