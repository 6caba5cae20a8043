//! SQLite-based persistence store

use crate::core::IntegrationStatus;
use crate::persistence::{IntegrationSummary, PersistedProjectState, PersistenceBackend};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// SQLite store for integration history and project state
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Open (creating if needed) the database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .context("Invalid database path")?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Private database that lives as long as the store
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("cruise");
        std::fs::create_dir_all(&db_dir)
            .with_context(|| format!("Failed to create {}", db_dir.display()))?;

        Self::new(&db_dir.join("state.db")).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS integrations (
                request_id TEXT PRIMARY KEY,
                project TEXT NOT NULL,
                build_name TEXT NOT NULL,
                source_trigger TEXT NOT NULL,
                status TEXT NOT NULL,
                start_time TEXT NOT NULL,
                finish_time TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_integrations_project ON integrations(project);
            CREATE INDEX IF NOT EXISTS idx_integrations_start ON integrations(start_time);

            CREATE TABLE IF NOT EXISTS project_state (
                project TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn summary_from_row(row: &SqliteRow) -> Result<IntegrationSummary> {
        Ok(IntegrationSummary {
            request_id: Uuid::parse_str(&row.get::<String, _>("request_id"))?,
            project: row.get("project"),
            build_name: row.get("build_name"),
            source_trigger: row.get("source_trigger"),
            status: IntegrationStatus::parse(&row.get::<String, _>("status"))
                .unwrap_or(IntegrationStatus::Unknown),
            start_time: Self::from_naive(row.get("start_time")),
            finish_time: Self::from_naive(row.get("finish_time")),
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteStateStore {
    async fn save_integration(&self, summary: &IntegrationSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO integrations
            (request_id, project, build_name, source_trigger, status, start_time, finish_time)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(summary.request_id.to_string())
        .bind(&summary.project)
        .bind(&summary.build_name)
        .bind(&summary.source_trigger)
        .bind(summary.status.to_string())
        .bind(Self::to_naive(summary.start_time))
        .bind(Self::to_naive(summary.finish_time))
        .execute(&self.pool)
        .await
        .context("Failed to save integration")?;

        Ok(())
    }

    async fn list_integrations(&self, project: &str) -> Result<Vec<IntegrationSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT request_id, project, build_name, source_trigger, status, start_time, finish_time
            FROM integrations
            WHERE project = ?1
            ORDER BY start_time DESC
            "#,
        )
        .bind(project)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list integrations")?;

        rows.iter().map(Self::summary_from_row).collect()
    }

    async fn latest_integration(&self, project: &str) -> Result<Option<IntegrationSummary>> {
        let row = sqlx::query(
            r#"
            SELECT request_id, project, build_name, source_trigger, status, start_time, finish_time
            FROM integrations
            WHERE project = ?1
            ORDER BY start_time DESC
            LIMIT 1
            "#,
        )
        .bind(project)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get latest integration")?;

        row.as_ref().map(Self::summary_from_row).transpose()
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT project FROM integrations
            UNION
            SELECT project FROM project_state
            ORDER BY project ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list projects")?;

        Ok(rows.iter().map(|row| row.get("project")).collect())
    }

    async fn load_project_state(&self, project: &str) -> Result<Option<PersistedProjectState>> {
        let row = sqlx::query("SELECT state FROM project_state WHERE project = ?1")
            .bind(project)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load project state")?;

        match row {
            Some(row) => {
                let json: String = row.get("state");
                let state = serde_json::from_str(&json)
                    .with_context(|| format!("Corrupt state for project '{}'", project))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn save_project_state(&self, project: &str, state: &PersistedProjectState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO project_state (project, state, updated_at)
            VALUES (?1, ?2, datetime('now'))
            "#,
        )
        .bind(project)
        .bind(serde_json::to_string(state)?)
        .execute(&self.pool)
        .await
        .context("Failed to save project state")?;

        Ok(())
    }
}
