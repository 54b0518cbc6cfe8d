use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use super::ProfileStore;
use crate::models::Profile;

/// One JSON document per email. The score and timestamp columns are
/// denormalized for listing without decoding the document.
pub const PROFILES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    email TEXT PRIMARY KEY,
    name TEXT,
    confidence_score REAL NOT NULL DEFAULT 0,
    completeness_score REAL NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    profile_json TEXT NOT NULL
)
"#;

pub struct SqliteProfileStore {
    pool: SqlitePool,
}

impl SqliteProfileStore {
    /// Open (creating if needed) the database at `path`. Does not migrate.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open profile store {}", path.display()))?;

        Ok(Self { pool })
    }

    /// [`connect`](Self::connect) followed by [`migrate`](Self::migrate).
    pub async fn open(path: &Path) -> Result<Self> {
        let store = Self::connect(path).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(PROFILES_SCHEMA).execute(&self.pool).await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_profiles_updated_at ON profiles(updated_at DESC)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn get(&self, email: &str) -> Result<Option<Profile>> {
        let row: Option<String> =
            sqlx::query_scalar("SELECT profile_json FROM profiles WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|json| {
            serde_json::from_str(&json)
                .with_context(|| format!("Corrupt stored profile for {email}"))
        })
        .transpose()
    }

    async fn upsert(&self, profile: &Profile) -> Result<()> {
        let json = serde_json::to_string(profile)?;
        sqlx::query(
            r#"
            INSERT INTO profiles (email, name, confidence_score, completeness_score,
                                  created_at, updated_at, profile_json)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                name = excluded.name,
                confidence_score = excluded.confidence_score,
                completeness_score = excluded.completeness_score,
                updated_at = excluded.updated_at,
                profile_json = excluded.profile_json
            "#,
        )
        .bind(&profile.email)
        .bind(profile.person_info.name.as_deref())
        .bind(profile.confidence_score())
        .bind(profile.completeness_score())
        .bind(profile.created_at.timestamp())
        .bind(profile.last_updated.timestamp())
        .bind(&json)
        .execute(&self.pool)
        .await?;

        tracing::debug!(email = %profile.email, "profile stored");
        Ok(())
    }
}
