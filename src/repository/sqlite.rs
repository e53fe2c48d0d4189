//! SQLite-backed document store for failed messages.
//!
//! Each message is stored as a single JSON document keyed by its unique
//! message id. Attempt counts are evaluated inside SQLite with
//! `json_array_length`, so only over-threshold documents are ever decoded.

use std::{future::Future, pin::Pin};

use snafu::ResultExt as _;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteLockingMode, SqlitePoolOptions},
    FromRow, SqlitePool,
};
use tokio_stream::StreamExt;

use crate::{
    config::Config,
    error::{ConnectSnafu, DocumentSnafu, Error},
    message::FailedMessage,
};

use super::Repository;

/// A [`Repository`] over a SQLite database file.
///
/// The pool holds a single connection; the cleanup loop is sequential and
/// never needs more.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct DocumentRow {
    id: String,
    document: String,
}

impl DocumentRow {
    /// Parses the document, which must carry the row key as its
    /// `UniqueMessageId`; saves address rows by that id.
    fn decode(self) -> Result<FailedMessage, Error> {
        let DocumentRow { id, document } = self;

        let message: FailedMessage =
            serde_json::from_str(&document).context(DocumentSnafu { id: &id })?;

        if message.unique_message_id != id {
            return Err(Error::KeyMismatch {
                id,
                document_id: message.unique_message_id,
            });
        }

        Ok(message)
    }
}

/// SQLite integers are signed 64-bit.
fn to_sql_int(name: &str, value: usize) -> Result<i64, Error> {
    i64::try_from(value)
        .map_err(|_| Error::invalid_parameter(format!("{name} {value} is out of range")))
}

impl SqliteRepository {
    /// Opens the store at `config.db_path`.
    ///
    /// The database file must already exist unless `create_if_missing` is
    /// set. The `failed_messages` table is created if it is absent.
    pub async fn connect_with(config: &Config) -> Result<Self, Error> {
        let path = config
            .db_path()
            .ok_or_else(|| Error::invalid_parameter("database path is required"))?;

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(config.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .locking_mode(SqliteLockingMode::Normal)
            .optimize_on_close(true, None);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .context(ConnectSnafu { path })?;

        Self::new(pool).await
    }

    /// Wraps an existing pool, creating the document table if needed.
    pub async fn new(pool: SqlitePool) -> Result<Self, Error> {
        sqlx::query(
            "
            CREATE TABLE IF NOT EXISTS failed_messages (
                id TEXT PRIMARY KEY NOT NULL,
                document TEXT NOT NULL
            )
            ",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub fn db(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert(&self, message: &FailedMessage) -> Result<(), Error> {
        let document = serde_json::to_string(message).context(DocumentSnafu {
            id: &message.unique_message_id,
        })?;

        let result = sqlx::query("INSERT INTO failed_messages (id, document) VALUES ($1, $2)")
            .bind(&message.unique_message_id)
            .bind(document)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::AlreadyExists {
                    id: message.unique_message_id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: impl AsRef<str>) -> Result<Option<FailedMessage>, Error> {
        sqlx::query_as::<_, DocumentRow>("SELECT id, document FROM failed_messages WHERE id = $1")
            .bind(id.as_ref())
            .fetch_optional(&self.pool)
            .await?
            .map(DocumentRow::decode)
            .transpose()
    }

    pub async fn count(&self) -> Result<u64, Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM failed_messages")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    /// Closes the underlying pool, waiting for the connection to be released.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl Repository for SqliteRepository {
    fn query_over_threshold<'a>(
        &'a self,
        threshold: usize,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FailedMessage>, Error>> + 'a>> {
        Box::pin(async move {
            let threshold = to_sql_int("threshold", threshold)?;
            let limit = to_sql_int("limit", limit)?;

            let mut stream = sqlx::query_as::<_, DocumentRow>(
                "
                SELECT id, document FROM failed_messages
                WHERE json_array_length(document, '$.ProcessingAttempts') > $1
                ORDER BY rowid
                LIMIT $2
                ",
            )
            .bind(threshold)
            .bind(limit)
            .fetch(&self.pool);

            let mut page = Vec::new();

            while let Some(row) = stream.next().await.transpose()? {
                page.push(row.decode()?);
            }

            Ok(page)
        })
    }

    fn save_batch<'a>(
        &'a self,
        batch: Vec<FailedMessage>,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + 'a>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;

            for message in &batch {
                let document = serde_json::to_string(message).context(DocumentSnafu {
                    id: &message.unique_message_id,
                })?;

                let result = sqlx::query("UPDATE failed_messages SET document = $1 WHERE id = $2")
                    .bind(document)
                    .bind(&message.unique_message_id)
                    .execute(&mut *tx)
                    .await?;

                // Dropping `tx` rolls back everything written so far.
                if result.rows_affected() == 0 {
                    return Err(Error::message_not_found(&message.unique_message_id));
                }
            }

            tx.commit().await?;

            Ok(())
        })
    }
}
