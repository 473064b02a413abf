//! Durable message log
//!
//! Every private and group message lands here before live delivery is
//! attempted. Rows are append-only and ordered by insertion `id`; the only
//! mutation besides insert is deleting a whole conversation.

mod schema;

use std::path::Path;
use std::str::FromStr;

use chrono::DateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::current_timestamp;
use crate::error::Result;

/// A message as persisted in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: i64,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    /// Milliseconds since UNIX epoch, strictly increasing with `id`
    pub timestamp: i64,
}

impl StoredMessage {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            sender: row.try_get("sender")?,
            receiver: row.try_get("receiver")?,
            content: row.try_get("content")?,
            timestamp: row.try_get("timestamp")?,
        })
    }

    /// Timestamp rendered as `YYYY-MM-DD HH:MM:SS` (UTC)
    pub fn formatted_time(&self) -> String {
        DateTime::from_timestamp_millis(self.timestamp)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

/// SQLite-backed message store.
///
/// All round-trips are serialized through `clock`, which also remembers the
/// last timestamp handed out so that timestamps never repeat or go backwards.
pub struct MessageStore {
    pool: SqlitePool,
    clock: Mutex<i64>,
}

const SELECT_COLUMNS: &str = "SELECT id, sender, receiver, content, timestamp FROM messages";

impl MessageStore {
    /// Open (creating if missing) the database file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self::with_pool(pool).await?;
        info!("Database ready at {}", path.display());
        Ok(store)
    }

    /// Fresh store in a private in-memory database
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // The database lives only as long as its single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        schema::run_migrations(&pool).await?;

        let last: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(timestamp), 0) FROM messages")
            .fetch_one(&pool)
            .await?;

        Ok(Self {
            pool,
            clock: Mutex::new(last),
        })
    }

    /// Append a message and return it with its assigned id and timestamp
    pub async fn insert(&self, sender: &str, receiver: &str, content: &str) -> Result<StoredMessage> {
        let mut clock = self.clock.lock().await;
        let timestamp = (current_timestamp() as i64).max(*clock + 1);

        let result = sqlx::query(
            "INSERT INTO messages (sender, receiver, content, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(sender)
        .bind(receiver)
        .bind(content)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;
        *clock = timestamp;

        debug!("Stored message {} -> {}", sender, receiver);

        Ok(StoredMessage {
            id: result.last_insert_rowid(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            content: content.to_string(),
            timestamp,
        })
    }

    /// Conversation between `a` and `b` in either direction, oldest first
    pub async fn query_pair(&self, a: &str, b: &str) -> Result<Vec<StoredMessage>> {
        let _serialized = self.clock.lock().await;
        let sql = format!(
            "{SELECT_COLUMNS} WHERE (sender = ? AND receiver = ?) OR (sender = ? AND receiver = ?) ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(a)
            .bind(b)
            .bind(b)
            .bind(a)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(StoredMessage::from_row).collect()
    }

    /// Every message `user` sent or received, oldest first
    pub async fn query_user(&self, user: &str) -> Result<Vec<StoredMessage>> {
        let _serialized = self.clock.lock().await;
        let sql = format!("{SELECT_COLUMNS} WHERE sender = ? OR receiver = ? ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .bind(user)
            .bind(user)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(StoredMessage::from_row).collect()
    }

    /// Messages between `user` and any of `partners`, oldest first.
    ///
    /// The partner list is bound parameter by parameter, never spliced into
    /// the SQL text.
    pub async fn query_group(&self, user: &str, partners: &[String]) -> Result<Vec<StoredMessage>> {
        if partners.is_empty() {
            return Ok(Vec::new());
        }

        let _serialized = self.clock.lock().await;
        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(SELECT_COLUMNS);

        query.push(" WHERE (sender = ");
        query.push_bind(user);
        query.push(" AND receiver IN (");
        let mut members = query.separated(", ");
        for partner in partners {
            members.push_bind(partner.as_str());
        }
        members.push_unseparated(")) OR (receiver = ");
        query.push_bind(user);
        query.push(" AND sender IN (");
        let mut members = query.separated(", ");
        for partner in partners {
            members.push_bind(partner.as_str());
        }
        members.push_unseparated(")) ORDER BY id ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(StoredMessage::from_row).collect()
    }

    /// Delete the conversation between `a` and `b`; returns rows removed
    pub async fn delete_pair(&self, a: &str, b: &str) -> Result<u64> {
        let _serialized = self.clock.lock().await;
        let result = sqlx::query(
            "DELETE FROM messages WHERE (sender = ? AND receiver = ?) OR (sender = ? AND receiver = ?)",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Distinct users `user` has exchanged messages with, ascending
    pub async fn distinct_partners(&self, user: &str) -> Result<Vec<String>> {
        let _serialized = self.clock.lock().await;
        let partners: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT CASE WHEN sender = ? THEN receiver ELSE sender END AS partner
            FROM messages
            WHERE sender = ? OR receiver = ?
            ORDER BY partner ASC
            "#,
        )
        .bind(user)
        .bind(user)
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(partners.into_iter().filter(|p| !p.is_empty()).collect())
    }

    /// Total number of stored messages
    pub async fn message_count(&self) -> Result<i64> {
        let _serialized = self.clock.lock().await;
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Close the underlying pool; further calls fail with a storage error
    pub async fn close(&self) {
        let _serialized = self.clock.lock().await;
        self.pool.close().await;
        info!("Database closed");
    }
}
