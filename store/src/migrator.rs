//! Versioned schema migrator with pre-apply file-copy backups and rollback
//! (§4.2). Deliberately not `sqlx::migrate!`: that macro has no backup or
//! rollback contract, and migrations here need to run as plain SQL strings
//! against a file the migrator controls the lifecycle of.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use task_core::error::{Result, TaskError};

/// One migration: a monotonic version, human description, and the SQL
/// statements applied as a single transaction.
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub statements: &'static [&'static str],
}

/// All schema migrations, in order. Applying version N is a single
/// transaction; partial failure leaves the database unchanged.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "initial schema: tasks, dependencies, participants, notifications, progress",
    statements: &[
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id                   TEXT PRIMARY KEY,
            title                TEXT NOT NULL,
            description          TEXT,
            status               TEXT NOT NULL,
            priority             TEXT NOT NULL,
            assignee             TEXT,
            created_by           TEXT NOT NULL,
            created_at           TEXT NOT NULL,
            updated_at           TEXT NOT NULL,
            completed_at         TEXT,
            success_criteria     TEXT NOT NULL DEFAULT '[]',
            feedback_quality     INTEGER,
            feedback_timeliness  INTEGER,
            feedback_notes       TEXT,
            completion_summary   TEXT,
            deadline             TEXT,
            estimated_hours      REAL,
            actual_hours         REAL,
            file_refs            TEXT NOT NULL DEFAULT '[]'
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)",
        "CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assignee)",
        "CREATE INDEX IF NOT EXISTS idx_tasks_deadline ON tasks(deadline)",
        r#"
        CREATE TABLE IF NOT EXISTS dependencies (
            task_id     TEXT NOT NULL,
            depends_on  TEXT NOT NULL,
            PRIMARY KEY (task_id, depends_on),
            FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE,
            FOREIGN KEY (depends_on) REFERENCES tasks(id)
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_dependencies_task ON dependencies(task_id)",
        "CREATE INDEX IF NOT EXISTS idx_dependencies_depends_on ON dependencies(depends_on)",
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            task_id    TEXT NOT NULL,
            agent_id   TEXT NOT NULL,
            joined_at  TEXT NOT NULL,
            PRIMARY KEY (task_id, agent_id),
            FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id    TEXT,
            task_id     TEXT,
            kind        TEXT NOT NULL,
            message     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            read        INTEGER NOT NULL DEFAULT 0
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_notifications_agent_read ON notifications(agent_id, read)",
        r#"
        CREATE TABLE IF NOT EXISTS progress (
            task_id     TEXT NOT NULL,
            ts          TEXT NOT NULL,
            seq         INTEGER NOT NULL,
            agent_id    TEXT NOT NULL,
            message     TEXT NOT NULL,
            PRIMARY KEY (task_id, ts, seq),
            FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version      INTEGER PRIMARY KEY,
            applied_at   TEXT NOT NULL,
            description  TEXT NOT NULL
        )
        "#,
    ],
}];

pub struct Migrator<'a> {
    pool: &'a SqlitePool,
    db_path: Option<std::path::PathBuf>,
    backups_dir: std::path::PathBuf,
}

impl<'a> Migrator<'a> {
    pub fn new(pool: &'a SqlitePool, db_path: Option<std::path::PathBuf>, backups_dir: std::path::PathBuf) -> Self {
        Self { pool, db_path, backups_dir }
    }

    pub async fn current_version(&self) -> Result<i64> {
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        )
        .fetch_optional(self.pool)
        .await
        .map_err(crate::common::sqlx_error_to_task_error)?;

        if exists.is_none() {
            return Ok(0);
        }

        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(self.pool)
            .await
            .map_err(crate::common::sqlx_error_to_task_error)?;
        Ok(version.unwrap_or(0))
    }

    /// Applies any missing migrations in order. Refuses to run against a
    /// database whose recorded version is newer than this build
    /// understands (§6.4).
    pub async fn apply_pending(&self) -> Result<()> {
        let current = self.current_version().await?;
        let latest_known = MIGRATIONS.iter().map(|m| m.version).max().unwrap_or(0);
        if current > latest_known {
            return Err(TaskError::SchemaMismatch { found: current, supported: latest_known });
        }

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            self.backup_before(migration.version).await?;
            self.apply_one(migration).await?;
        }
        Ok(())
    }

    async fn backup_before(&self, version: i64) -> Result<()> {
        let Some(db_path) = &self.db_path else {
            return Ok(());
        };
        if !db_path.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.backups_dir)
            .map_err(|e| TaskError::Internal(format!("cannot create backups dir: {e}")))?;
        let ts = Utc::now().format("%Y%m%dT%H%M%SZ");
        let dest = self.backups_dir.join(format!("tasks-{version}-{ts}.db"));
        std::fs::copy(db_path, &dest)
            .map_err(|e| TaskError::Internal(format!("migration backup failed: {e}")))?;
        Ok(())
    }

    async fn apply_one(&self, migration: &Migration) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(crate::common::sqlx_error_to_task_error)?;
        for statement in migration.statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(crate::common::sqlx_error_to_task_error)?;
        }
        sqlx::query("INSERT INTO schema_version (version, applied_at, description) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(Utc::now())
            .bind(migration.description)
            .execute(&mut *tx)
            .await
            .map_err(crate::common::sqlx_error_to_task_error)?;
        tx.commit().await.map_err(crate::common::sqlx_error_to_task_error)?;
        tracing::info!(version = migration.version, "applied migration");
        Ok(())
    }

    /// Restores the most recent backup file and rewinds the version row
    /// (§4.2). Requires a file-backed database; in-memory stores have no
    /// backups to restore from.
    pub async fn rollback(&self) -> Result<()> {
        let Some(db_path) = &self.db_path else {
            return Err(TaskError::Internal("rollback requires a file-backed database".to_string()));
        };
        let mut backups: Vec<std::path::PathBuf> = std::fs::read_dir(&self.backups_dir)
            .map_err(|e| TaskError::Internal(format!("cannot read backups dir: {e}")))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|ext| ext == "db").unwrap_or(false))
            .collect();
        backups.sort();
        let Some(latest) = backups.pop() else {
            return Err(TaskError::Internal("no backup available to roll back to".to_string()));
        };
        std::fs::copy(&latest, db_path)
            .map_err(|e| TaskError::Internal(format!("rollback copy failed: {e}")))?;
        Ok(())
    }

    pub async fn history(&self) -> Result<Vec<(i64, String)>> {
        let rows = sqlx::query("SELECT version, description FROM schema_version ORDER BY version")
            .fetch_all(self.pool)
            .await
            .map_err(crate::common::sqlx_error_to_task_error)?;
        Ok(rows.into_iter().map(|r| (r.get("version"), r.get("description"))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fresh_pool() -> SqlitePool {
        sqlx::sqlite::SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn applying_migrations_is_idempotent() {
        let pool = fresh_pool().await;
        let migrator = Migrator::new(&pool, None, std::path::PathBuf::from("/tmp/does-not-matter"));
        migrator.apply_pending().await.unwrap();
        let after_first = migrator.current_version().await.unwrap();
        migrator.apply_pending().await.unwrap();
        let after_second = migrator.current_version().await.unwrap();
        assert_eq!(after_first, after_second);
        assert_eq!(after_first, 1);
    }

    #[tokio::test]
    async fn refuses_newer_schema_than_supported() {
        let pool = fresh_pool().await;
        let migrator = Migrator::new(&pool, None, std::path::PathBuf::from("/tmp/does-not-matter"));
        migrator.apply_pending().await.unwrap();
        sqlx::query("INSERT INTO schema_version (version, applied_at, description) VALUES (99, ?, 'future')")
            .bind(Utc::now())
            .execute(&pool)
            .await
            .unwrap();
        let err = migrator.apply_pending().await.unwrap_err();
        assert!(matches!(err, TaskError::SchemaMismatch { .. }));
    }
}
