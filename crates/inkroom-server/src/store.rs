//! Durable element log: the server is the owner of record for every room.

use inkroom_core::{ElementKind, ElementRecord, WirePath};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use tokio::sync::RwLock;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("element {0} not found")]
    NotFound(String),
    #[error("stored path is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("stored kind {0:?} is unknown")]
    UnknownKind(String),
}

/// Persistence backend for element records.
///
/// Records are keyed by `(room_id, id)`: the same id in two rooms names two
/// elements. `list_elements` returns the most recently written records first.
pub trait DurableStore: Send + Sync {
    /// Insert a record, replacing any record with the same room and id.
    fn create_element<'a>(&'a self, record: &'a ElementRecord) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Replace the stored path. Fails with [`StoreError::NotFound`] when the
    /// room has no such element.
    fn update_element<'a>(
        &'a self,
        room_id: &'a str,
        id: &'a str,
        path: &'a WirePath,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Fails with [`StoreError::NotFound`] when the room has no such element.
    fn delete_element<'a>(&'a self, room_id: &'a str, id: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;

    fn list_elements<'a>(&'a self, room_id: &'a str, limit: usize)
    -> BoxFuture<'a, Result<Vec<ElementRecord>, StoreError>>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryRows {
    revision: u64,
    rows: HashMap<(String, String), (u64, ElementRecord)>,
}

impl MemoryRows {
    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

/// Process-local store, used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryRows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn create_element<'a>(&'a self, record: &'a ElementRecord) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            let revision = inner.bump();
            let key = (record.room_id.clone(), record.id.clone());
            inner.rows.insert(key, (revision, record.clone()));
            Ok(())
        })
    }

    fn update_element<'a>(
        &'a self,
        room_id: &'a str,
        id: &'a str,
        path: &'a WirePath,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            let revision = inner.bump();
            let (rev, record) = inner
                .rows
                .get_mut(&(room_id.to_string(), id.to_string()))
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            *rev = revision;
            record.path = path.clone();
            Ok(())
        })
    }

    fn delete_element<'a>(&'a self, room_id: &'a str, id: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.inner
                .write()
                .await
                .rows
                .remove(&(room_id.to_string(), id.to_string()))
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        })
    }

    fn list_elements<'a>(
        &'a self,
        room_id: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ElementRecord>, StoreError>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            let mut rows: Vec<_> = inner.rows.values().filter(|(_, r)| r.room_id == room_id).collect();
            rows.sort_by(|a, b| b.0.cmp(&a.0));
            Ok(rows.into_iter().take(limit).map(|(_, r)| r.clone()).collect())
        })
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

const NEXT_REVISION: &str = "(SELECT COALESCE(MAX(revision), 0) + 1 FROM elements)";

/// SQLite-backed store. Migrations run on connect.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `:memory:` opens its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

type ElementRow = (String, String, String, String, String);

fn record_from_row((id, room_id, kind, path, author_id): ElementRow) -> Result<ElementRecord, StoreError> {
    let element_type = ElementKind::from_str(&kind).map_err(|_| StoreError::UnknownKind(kind))?;
    Ok(ElementRecord {
        id,
        room_id,
        element_type,
        path: serde_json::from_str(&path)?,
        author_id,
    })
}

impl DurableStore for SqliteStore {
    fn create_element<'a>(&'a self, record: &'a ElementRecord) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let path = serde_json::to_string(&record.path)?;
            let sql = format!(
                "INSERT INTO elements (id, room_id, kind, path, author_id, revision) \
                 VALUES (?1, ?2, ?3, ?4, ?5, {NEXT_REVISION}) \
                 ON CONFLICT(room_id, id) DO UPDATE SET kind = excluded.kind, \
                 path = excluded.path, author_id = excluded.author_id, revision = excluded.revision, \
                 updated_at = datetime('now')"
            );
            sqlx::query(&sql)
                .bind(record.id.as_str())
                .bind(record.room_id.as_str())
                .bind(record.element_type.as_str())
                .bind(path)
                .bind(record.author_id.as_str())
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }

    fn update_element<'a>(
        &'a self,
        room_id: &'a str,
        id: &'a str,
        path: &'a WirePath,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let path = serde_json::to_string(path)?;
            let sql = format!(
                "UPDATE elements SET path = ?1, revision = {NEXT_REVISION}, updated_at = datetime('now') \
                 WHERE room_id = ?2 AND id = ?3"
            );
            let result = sqlx::query(&sql)
                .bind(path)
                .bind(room_id)
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }

    fn delete_element<'a>(&'a self, room_id: &'a str, id: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM elements WHERE room_id = ?1 AND id = ?2")
                .bind(room_id)
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }

    fn list_elements<'a>(
        &'a self,
        room_id: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ElementRecord>, StoreError>> {
        Box::pin(async move {
            let rows: Vec<ElementRow> = sqlx::query_as(
                "SELECT id, room_id, kind, path, author_id FROM elements \
                 WHERE room_id = ?1 ORDER BY revision DESC LIMIT ?2",
            )
            .bind(room_id)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
            rows.into_iter().map(record_from_row).collect()
        })
    }
}
