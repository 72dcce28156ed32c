//! Durable tag → media bindings, one SQLite row per tag.
//!
//! No locking is layered on top of SQLite: each write is one statement and
//! the engine's own transaction resolves concurrent writers to the same tag
//! (last write wins).

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::binding::{Binding, MediaKind, UpsertOutcome};

#[derive(Debug, sqlx::FromRow)]
struct BindingRow {
    token_id: String,
    media_ref: String,
    kind: String,
    updated_at: String,
}

impl TryFrom<BindingRow> for Binding {
    type Error = sqlx::Error;

    fn try_from(row: BindingRow) -> Result<Self, Self::Error> {
        let kind = MediaKind::from_str(&row.kind)
            .map_err(|k| sqlx::Error::Decode(format!("unknown media kind {:?}", k).into()))?;
        let updated_at = DateTime::parse_from_rfc3339(&row.updated_at)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
            .with_timezone(&Utc);
        Ok(Binding {
            token_id: row.token_id,
            media_ref: row.media_ref,
            kind,
            updated_at,
        })
    }
}

#[derive(Clone)]
pub struct MappingStore {
    pool: SqlitePool,
}

impl MappingStore {
    /// Open (creating if missing) the binding database at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self, sqlx::Error> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(3));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        let store = Self::migrate(pool).await?;
        info!("binding store ready: {}", db_path.display());
        Ok(store)
    }

    /// Private in-memory database. A single long-lived connection keeps the
    /// data alive for the lifetime of the pool.
    pub async fn open_in_memory() -> Result<Self, sqlx::Error> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Point lookup. A tag without a binding is `Ok(None)`.
    pub async fn get(&self, token_id: &str) -> Result<Option<Binding>, sqlx::Error> {
        let row = sqlx::query_as::<_, BindingRow>(
            r#"
            SELECT token_id, media_ref, kind, updated_at
            FROM bindings
            WHERE token_id = ?1
            "#,
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Binding::try_from).transpose()
    }

    /// Bind `token_id` to `media_ref`, replacing any previous binding.
    pub async fn upsert(
        &self,
        token_id: &str,
        media_ref: &str,
        kind: MediaKind,
    ) -> Result<UpsertOutcome, sqlx::Error> {
        let now = Utc::now().to_rfc3339();

        // revision starts at 1 on insert and is bumped on every overwrite,
        // so the returned value tells the two cases apart atomically.
        let revision: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bindings (token_id, media_ref, kind, revision, updated_at)
            VALUES (?1, ?2, ?3, 1, ?4)
            ON CONFLICT(token_id) DO UPDATE SET
                media_ref = excluded.media_ref,
                kind = excluded.kind,
                revision = bindings.revision + 1,
                updated_at = excluded.updated_at
            RETURNING revision
            "#,
        )
        .bind(token_id)
        .bind(media_ref)
        .bind(kind.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let outcome = if revision == 1 {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        };
        debug!(
            "binding {:?}: {} -> {} ({})",
            outcome, token_id, media_ref, kind
        );
        Ok(outcome)
    }

    /// All bindings ordered by tag id.
    pub async fn list(&self) -> Result<Vec<Binding>, sqlx::Error> {
        let rows = sqlx::query_as::<_, BindingRow>(
            r#"
            SELECT token_id, media_ref, kind, updated_at
            FROM bindings
            ORDER BY token_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Binding::try_from).collect()
    }
}
