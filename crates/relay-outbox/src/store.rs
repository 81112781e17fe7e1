use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{Message, NewMessage};
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension, Row};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::{
    db::{self, format_ts, parse_ts},
    error::StoreError,
    repository::{MessageRepository, OutboxTx},
};

const MESSAGE_COLUMNS: &str = "id, content, author, sent, sent_at, created_at, updated_at";

/// Ids per `UPDATE ... WHERE id IN (..)` statement.
const MARK_CHUNK: usize = 500;

/// SQLite-backed message store.
///
/// Transactions run on their own connection (`tx_conn`), guarded by an async
/// mutex that a transaction keeps for its whole lifetime. Queries and inserts
/// use `conn`, so they are not held up while a delivery cycle waits on its
/// sender. The transaction starts `DEFERRED` and only takes the database
/// write lock at its first `UPDATE`.
///
/// A store built with [`SqliteMessageRepository::new`] has a single
/// connection; there queries do wait for an open transaction.
pub struct SqliteMessageRepository {
    conn: Arc<Mutex<Connection>>,
    tx_conn: Arc<Mutex<Connection>>,
}

impl SqliteMessageRepository {
    /// Wrap an existing connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self, StoreError> {
        db::init_db(&conn)?;
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self {
            tx_conn: Arc::clone(&conn),
            conn,
        })
    }

    /// Open the database file at `path` with one connection for queries and
    /// one for delivery transactions.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = db::open(path)?;
        let tx_conn = db::open(path)?;
        info!(path = %path, "opened message store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            tx_conn: Arc::new(Mutex::new(tx_conn)),
        })
    }

    /// Store a new, unsent message.
    pub async fn insert(&self, new: &NewMessage) -> Result<Message, StoreError> {
        if new.content.trim().is_empty() {
            return Err(StoreError::Validation("content must not be empty".into()));
        }
        if new.author.trim().is_empty() {
            return Err(StoreError::Validation("author must not be empty".into()));
        }

        let conn = self.conn.lock().await;
        let now = Utc::now();
        let now_str = format_ts(now);
        conn.execute(
            "INSERT INTO messages (content, author, sent, sent_at, created_at, updated_at)
             VALUES (?1, ?2, 0, NULL, ?3, ?3)",
            rusqlite::params![new.content, new.author, now_str],
        )?;
        let id = conn.last_insert_rowid();
        debug!(message_id = id, author = %new.author, "message stored");

        // Re-read so the returned timestamps carry the stored precision.
        let msg = conn.query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
            [id],
            row_to_message,
        )?;
        Ok(msg)
    }

    /// Look up a single message by id.
    pub async fn get(&self, id: i64) -> Result<Option<Message>, StoreError> {
        let conn = self.conn.lock().await;
        let msg = conn
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                [id],
                row_to_message,
            )
            .optional()?;
        Ok(msg)
    }

    /// Every sent message, most recently sent first.
    pub async fn fetch_sent(&self) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE sent = 1
             ORDER BY sent_at DESC, id DESC"
        ))?;
        let messages = stmt
            .query_map([], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(count = messages.len(), "fetched sent messages");
        Ok(messages)
    }

    /// Every stored message in id order.
    pub async fn fetch_all(&self) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {MESSAGE_COLUMNS} FROM messages ORDER BY id"))?;
        let messages = stmt
            .query_map([], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }
}

#[async_trait]
impl MessageRepository for SqliteMessageRepository {
    async fn fetch_unsent(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE sent = 0
             ORDER BY created_at ASC, id ASC
             LIMIT ?1"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let messages = stmt
            .query_map([limit], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    async fn begin(&self) -> Result<Box<dyn OutboxTx>, StoreError> {
        let conn = Arc::clone(&self.tx_conn).lock_owned().await;
        Ok(Box::new(SqliteTx::begin(conn)?))
    }
}

/// Transaction on the store's transaction connection; rolls back on drop
/// unless committed.
struct SqliteTx {
    conn: OwnedMutexGuard<Connection>,
    finished: bool,
}

impl SqliteTx {
    fn begin(conn: OwnedMutexGuard<Connection>) -> Result<Self, StoreError> {
        conn.execute_batch("BEGIN DEFERRED")?;
        Ok(Self {
            conn,
            finished: false,
        })
    }
}

#[async_trait]
impl OutboxTx for SqliteTx {
    async fn mark_sent(&mut self, ids: &[i64], now: DateTime<Utc>) -> Result<usize, StoreError> {
        let now_str = format_ts(now);
        let mut updated = 0;
        for chunk in ids.chunks(MARK_CHUNK) {
            let placeholders = (0..chunk.len())
                .map(|i| format!("?{}", i + 2))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE messages SET sent = 1, sent_at = ?1, updated_at = ?1
                 WHERE sent = 0 AND id IN ({placeholders})"
            );

            let params = std::iter::once(Value::Text(now_str.clone()))
                .chain(chunk.iter().map(|id| Value::Integer(*id)));
            updated += self.conn.execute(&sql, params_from_iter(params))?;
        }
        Ok(updated)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StoreError> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for SqliteTx {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!(error = %e, "rollback of abandoned transaction failed");
        }
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let sent_at: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(Message {
        id: row.get(0)?,
        content: row.get(1)?,
        author: row.get(2)?,
        sent: row.get::<_, i64>(3)? != 0,
        sent_at: sent_at.as_deref().map(|s| parse_ts(4, s)).transpose()?,
        created_at: parse_ts(5, &created_at)?,
        updated_at: parse_ts(6, &updated_at)?,
    })
}
