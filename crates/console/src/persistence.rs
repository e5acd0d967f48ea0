//! Client state that survives a restart of the console.
//!
//! Two things are kept: a session-presence flag (is a server-side session
//! worth verifying at start-up?) and the last known principal.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use opsdesk_auth::Principal;

const KEY_SESSION_FLAG: &str = "session_flag";
const KEY_PRINCIPAL: &str = "principal";

#[async_trait]
pub trait SessionPersistence: Send + Sync {
    async fn has_session_flag(&self) -> anyhow::Result<bool>;

    async fn set_session_flag(&self, present: bool) -> anyhow::Result<()>;

    async fn load_principal(&self) -> anyhow::Result<Option<Principal>>;

    /// Store the principal, or forget it with `None`.
    async fn save_principal(&self, principal: Option<&Principal>) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    flag: bool,
    principal: Option<Principal>,
}

/// Process-local persistence (tests, ephemeral shells).
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    state: Mutex<MemoryState>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the session flag already set, as after a previous login.
    pub fn with_session_flag() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                flag: true,
                principal: None,
            }),
        }
    }
}

#[async_trait]
impl SessionPersistence for MemoryPersistence {
    async fn has_session_flag(&self) -> anyhow::Result<bool> {
        Ok(self.state.lock().await.flag)
    }

    async fn set_session_flag(&self, present: bool) -> anyhow::Result<()> {
        self.state.lock().await.flag = present;
        Ok(())
    }

    async fn load_principal(&self) -> anyhow::Result<Option<Principal>> {
        Ok(self.state.lock().await.principal.clone())
    }

    async fn save_principal(&self, principal: Option<&Principal>) -> anyhow::Result<()> {
        self.state.lock().await.principal = principal.cloned();
        Ok(())
    }
}

/// SQLite-backed persistence in the OS data directory.
#[derive(Debug, Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create session directory at {:?}", parent))?;
        }

        let db_url = format!("sqlite://{}", path.to_string_lossy());
        let options = SqliteConnectOptions::from_str(&db_url)
            .with_context(|| format!("invalid SQLite url for {:?}", path))?
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("failed to open session database at {:?}", path))?;

        Self::with_pool(pool).await
    }

    /// Open `{data_dir}/opsdesk/session.db`, or `{dir}/session.db` when an
    /// explicit directory is configured.
    pub async fn open_default(dir: Option<&Path>) -> anyhow::Result<Self> {
        let path = match dir {
            Some(dir) => dir.join("session.db"),
            None => default_db_path()?,
        };
        Self::open(&path).await
    }

    /// A private in-memory database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        // one connection: every in-memory connection is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("failed to open in-memory session database")?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_state (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create session_state table")?;

        Ok(Self { pool })
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT value
            FROM session_state
            WHERE key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to read session key '{key}'"))?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO session_state (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key)
            DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write session key '{key}'"))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM session_state
            WHERE key = ?1
            "#,
        )
        .bind(key)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to delete session key '{key}'"))?;
        Ok(())
    }
}

#[async_trait]
impl SessionPersistence for SqlitePersistence {
    async fn has_session_flag(&self) -> anyhow::Result<bool> {
        Ok(self.get(KEY_SESSION_FLAG).await?.is_some())
    }

    async fn set_session_flag(&self, present: bool) -> anyhow::Result<()> {
        if present {
            self.put(KEY_SESSION_FLAG, "1").await
        } else {
            self.delete(KEY_SESSION_FLAG).await
        }
    }

    async fn load_principal(&self) -> anyhow::Result<Option<Principal>> {
        let Some(data) = self.get(KEY_PRINCIPAL).await? else {
            return Ok(None);
        };
        let principal =
            serde_json::from_str(&data).context("failed to deserialize persisted principal")?;
        Ok(Some(principal))
    }

    async fn save_principal(&self, principal: Option<&Principal>) -> anyhow::Result<()> {
        match principal {
            Some(principal) => {
                let data = serde_json::to_string(principal)
                    .context("failed to serialize principal for persistence")?;
                self.put(KEY_PRINCIPAL, &data).await
            }
            None => self.delete(KEY_PRINCIPAL).await,
        }
    }
}

/// `{app_data_dir}/opsdesk/session.db`.
fn default_db_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut path = base;
    path.push("opsdesk");
    path.push("session.db");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::principal;

    async fn exercise(store: &dyn SessionPersistence) {
        assert!(!store.has_session_flag().await.unwrap());
        assert!(store.load_principal().await.unwrap().is_none());

        store.set_session_flag(true).await.unwrap();
        store.save_principal(Some(&principal("E001"))).await.unwrap();
        assert!(store.has_session_flag().await.unwrap());
        assert_eq!(store.load_principal().await.unwrap(), Some(principal("E001")));

        store.save_principal(Some(&principal("E002"))).await.unwrap();
        assert_eq!(store.load_principal().await.unwrap(), Some(principal("E002")));

        store.set_session_flag(false).await.unwrap();
        store.save_principal(None).await.unwrap();
        assert!(!store.has_session_flag().await.unwrap());
        assert!(store.load_principal().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_round_trip() {
        exercise(&MemoryPersistence::new()).await;
        assert!(MemoryPersistence::with_session_flag().has_session_flag().await.unwrap());
    }

    #[tokio::test]
    async fn sqlite_round_trip() {
        let store = SqlitePersistence::in_memory().await.unwrap();
        exercise(&store).await;
    }

    #[tokio::test]
    async fn sqlite_file_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("opsdesk-test-{}", std::process::id()));
        let path = dir.join("session.db");
        let _ = std::fs::remove_file(&path);

        {
            let store = SqlitePersistence::open(&path).await.unwrap();
            store.set_session_flag(true).await.unwrap();
            store.save_principal(Some(&principal("E001"))).await.unwrap();
        }

        let reopened = SqlitePersistence::open_default(Some(&dir)).await.unwrap();
        assert!(reopened.has_session_flag().await.unwrap());
        assert_eq!(reopened.load_principal().await.unwrap(), Some(principal("E001")));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
