//! SQLite long-term store.
//!
//! One database file, shared by every agent in the process, with three
//! append-only tables:
//! - `experiences`: one row per completed action attempt
//! - `interactions`: one row per answered chat message
//! - `locations`: visited places worth remembering
//!
//! Rows carry `agent_name` so agents never see each other's history.
//! Timestamps are stored as RFC 3339 text; ordering ties break on rowid.

use async_trait::async_trait;
use blockmind_core::error::MemoryError;
use blockmind_core::{
    ActionToken, ExperienceRecord, InteractionRecord, LocationRecord, LongTermStore, Position,
};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// A long-term store backed by a SQLite database.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?;
        Self::connect(options, path).await
    }

    /// Open a database file, creating parent directories as needed.
    pub async fn open_file(path: &Path) -> Result<Self, MemoryError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        let options = SqliteConnectOptions::new().filename(path);
        Self::connect(options, &path.display().to_string()).await
    }

    async fn connect(options: SqliteConnectOptions, label: &str) -> Result<Self, MemoryError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {label}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, MemoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create the three tables and their per-agent indexes.
    async fn run_migrations(&self) -> Result<(), MemoryError> {
        let statements = [
            (
                "experiences table",
                r#"
                CREATE TABLE IF NOT EXISTS experiences (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    agent_name  TEXT NOT NULL,
                    timestamp   TEXT NOT NULL,
                    action      TEXT NOT NULL,
                    context     TEXT NOT NULL,
                    result      TEXT NOT NULL,
                    success     INTEGER NOT NULL
                )
                "#,
            ),
            (
                "interactions table",
                r#"
                CREATE TABLE IF NOT EXISTS interactions (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    agent_name   TEXT NOT NULL,
                    timestamp    TEXT NOT NULL,
                    other_agent  TEXT NOT NULL,
                    message      TEXT NOT NULL,
                    response     TEXT NOT NULL
                )
                "#,
            ),
            (
                "locations table",
                r#"
                CREATE TABLE IF NOT EXISTS locations (
                    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                    agent_name         TEXT NOT NULL,
                    timestamp          TEXT NOT NULL,
                    x                  REAL NOT NULL,
                    y                  REAL NOT NULL,
                    z                  REAL NOT NULL,
                    biome              TEXT NOT NULL,
                    interesting_blocks TEXT NOT NULL DEFAULT '[]'
                )
                "#,
            ),
            (
                "experiences index",
                "CREATE INDEX IF NOT EXISTS idx_experiences_agent ON experiences(agent_name, action, timestamp DESC)",
            ),
            (
                "interactions index",
                "CREATE INDEX IF NOT EXISTS idx_interactions_agent ON interactions(agent_name, other_agent, timestamp DESC)",
            ),
            (
                "locations index",
                "CREATE INDEX IF NOT EXISTS idx_locations_agent ON locations(agent_name, timestamp DESC)",
            ),
        ];

        for (label, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| MemoryError::MigrationFailed(format!("{label}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, MemoryError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| MemoryError::QueryFailed(format!("bad timestamp '{raw}': {e}")))
    }

    fn column<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, MemoryError>
    where
        T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        row.try_get(name)
            .map_err(|e| MemoryError::QueryFailed(format!("{name} column: {e}")))
    }

    fn row_to_experience(row: &sqlx::sqlite::SqliteRow) -> Result<ExperienceRecord, MemoryError> {
        let action: String = Self::column(row, "action")?;
        let timestamp: String = Self::column(row, "timestamp")?;
        Ok(ExperienceRecord {
            agent_name: Self::column(row, "agent_name")?,
            timestamp: Self::parse_timestamp(&timestamp)?,
            action: action
                .parse()
                .map_err(|e| MemoryError::QueryFailed(format!("action column: {e}")))?,
            snapshot: Self::column(row, "context")?,
            result: Self::column(row, "result")?,
            success: Self::column::<i64>(row, "success")? != 0,
        })
    }

    fn row_to_interaction(row: &sqlx::sqlite::SqliteRow) -> Result<InteractionRecord, MemoryError> {
        let timestamp: String = Self::column(row, "timestamp")?;
        Ok(InteractionRecord {
            agent_name: Self::column(row, "agent_name")?,
            timestamp: Self::parse_timestamp(&timestamp)?,
            peer: Self::column(row, "other_agent")?,
            message: Self::column(row, "message")?,
            reply: Self::column(row, "response")?,
        })
    }

    fn row_to_location(row: &sqlx::sqlite::SqliteRow) -> Result<LocationRecord, MemoryError> {
        let timestamp: String = Self::column(row, "timestamp")?;
        let blocks: String = Self::column(row, "interesting_blocks")?;
        Ok(LocationRecord {
            agent_name: Self::column(row, "agent_name")?,
            timestamp: Self::parse_timestamp(&timestamp)?,
            position: Position::new(
                Self::column(row, "x")?,
                Self::column(row, "y")?,
                Self::column(row, "z")?,
            ),
            biome: Self::column(row, "biome")?,
            notable_blocks: serde_json::from_str(&blocks).unwrap_or_default(),
        })
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn stamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl LongTermStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append_experience(&self, record: ExperienceRecord) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            INSERT INTO experiences (agent_name, timestamp, action, context, result, success)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&record.agent_name)
        .bind(stamp(&record.timestamp))
        .bind(record.action.as_str())
        .bind(&record.snapshot)
        .bind(&record.result)
        .bind(record.success as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT experience failed: {e}")))?;

        debug!(agent = %record.agent_name, action = %record.action, "Stored experience");
        Ok(())
    }

    async fn append_interaction(&self, record: InteractionRecord) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            INSERT INTO interactions (agent_name, timestamp, other_agent, message, response)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&record.agent_name)
        .bind(stamp(&record.timestamp))
        .bind(&record.peer)
        .bind(&record.message)
        .bind(&record.reply)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT interaction failed: {e}")))?;
        Ok(())
    }

    async fn append_location(&self, record: LocationRecord) -> Result<(), MemoryError> {
        let blocks = serde_json::to_string(&record.notable_blocks)
            .map_err(|e| MemoryError::Storage(format!("Blocks serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO locations (agent_name, timestamp, x, y, z, biome, interesting_blocks)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&record.agent_name)
        .bind(stamp(&record.timestamp))
        .bind(record.position.x)
        .bind(record.position.y)
        .bind(record.position.z)
        .bind(&record.biome)
        .bind(&blocks)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT location failed: {e}")))?;
        Ok(())
    }

    async fn successful_experiences(
        &self,
        agent: &str,
        action: ActionToken,
        limit: usize,
    ) -> Result<Vec<ExperienceRecord>, MemoryError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM experiences
            WHERE agent_name = ?1 AND action = ?2 AND success = 1
            ORDER BY timestamp DESC, id DESC
            LIMIT ?3
            "#,
        )
        .bind(agent)
        .bind(action.as_str())
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("experiences: {e}")))?;

        rows.iter().map(Self::row_to_experience).collect()
    }

    async fn interactions_with(
        &self,
        agent: &str,
        peer: &str,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>, MemoryError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM interactions
            WHERE agent_name = ?1 AND other_agent = ?2
            ORDER BY timestamp DESC, id DESC
            LIMIT ?3
            "#,
        )
        .bind(agent)
        .bind(peer)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("interactions: {e}")))?;

        rows.iter().map(Self::row_to_interaction).collect()
    }

    async fn locations(&self, agent: &str, limit: usize) -> Result<Vec<LocationRecord>, MemoryError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM locations
            WHERE agent_name = ?1
            ORDER BY timestamp DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(agent)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("locations: {e}")))?;

        rows.iter().map(Self::row_to_location).collect()
    }

    async fn close(&self) -> Result<(), MemoryError> {
        self.pool.close().await;
        info!("SQLite store closed");
        Ok(())
    }
}

/// SQLite reads a negative LIMIT as "no limit", so saturate instead of wrapping.
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    fn experience(agent: &str, action: ActionToken, success: bool) -> ExperienceRecord {
        ExperienceRecord {
            agent_name: agent.into(),
            timestamp: Utc::now(),
            action,
            snapshot: r#"{"health":20.0}"#.into(),
            result: r#""crafted wooden_pickaxe""#.into(),
            success,
        }
    }

    #[tokio::test]
    async fn store_and_query_experiences() {
        let db = test_store().await;
        db.append_experience(experience("AI_Explorer", ActionToken::Craft, true))
            .await
            .unwrap();
        db.append_experience(experience("AI_Explorer", ActionToken::Craft, false))
            .await
            .unwrap();
        db.append_experience(experience("AI_Friend", ActionToken::Craft, true))
            .await
            .unwrap();

        let rows = db
            .successful_experiences("AI_Explorer", ActionToken::Craft, 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, ActionToken::Craft);
        assert!(rows[0].success);
        assert_eq!(rows[0].snapshot, r#"{"health":20.0}"#);
    }

    #[tokio::test]
    async fn experiences_newest_first_with_limit() {
        let db = test_store().await;
        for age in [30, 10, 20] {
            let mut record = experience("A", ActionToken::Explore, true);
            record.timestamp = Utc::now() - Duration::seconds(age);
            record.result = format!("\"{age}\"");
            db.append_experience(record).await.unwrap();
        }
        let rows = db
            .successful_experiences("A", ActionToken::Explore, 2)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].result, "\"10\"");
        assert_eq!(rows[1].result, "\"20\"");
    }

    #[tokio::test]
    async fn huge_limit_saturates_instead_of_wrapping() {
        assert_eq!(sql_limit(7), 7);
        assert_eq!(sql_limit(usize::MAX), i64::MAX);

        let db = test_store().await;
        for _ in 0..3 {
            db.append_experience(experience("AI_Explorer", ActionToken::Eat, true))
                .await
                .unwrap();
        }
        let rows = db
            .successful_experiences("AI_Explorer", ActionToken::Eat, usize::MAX)
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        let none = db
            .successful_experiences("AI_Explorer", ActionToken::Eat, 0)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn interactions_roundtrip() {
        let db = test_store().await;
        db.append_interaction(InteractionRecord {
            agent_name: "AI_Friend".into(),
            timestamp: Utc::now(),
            peer: "Steve".into(),
            message: "hey AI_Friend".into(),
            reply: "Hi Steve!".into(),
        })
        .await
        .unwrap();

        let rows = db.interactions_with("AI_Friend", "Steve", 5).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reply, "Hi Steve!");
        assert!(db.interactions_with("AI_Friend", "Alex", 5).await.unwrap().is_empty());
        assert!(db.interactions_with("AI_Explorer", "Steve", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn locations_keep_blocks() {
        let db = test_store().await;
        db.append_location(LocationRecord {
            agent_name: "AI_Explorer".into(),
            timestamp: Utc::now(),
            position: Position::new(12.0, 64.0, -7.5),
            biome: "forest".into(),
            notable_blocks: vec!["oak_log".into(), "iron_ore".into()],
        })
        .await
        .unwrap();

        let rows = db.locations("AI_Explorer", 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].position, Position::new(12.0, 64.0, -7.5));
        assert_eq!(rows[0].notable_blocks, vec!["oak_log", "iron_ore"]);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("agents.db");

        let db = SqliteStore::open_file(&path).await.unwrap();
        db.append_experience(experience("AI_Explorer", ActionToken::Eat, true))
            .await
            .unwrap();
        db.close().await.unwrap();

        let reopened = SqliteStore::open_file(&path).await.unwrap();
        let rows = reopened
            .successful_experiences("AI_Explorer", ActionToken::Eat, 5)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
