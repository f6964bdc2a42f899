use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema (lesson progress, bookmarks, the checkpoint
/// activity log, and indexes).
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_progress (
                    learner_id INTEGER NOT NULL,
                    course_id INTEGER NOT NULL,
                    lesson_id INTEGER NOT NULL,
                    lesson_name TEXT NOT NULL,
                    lesson_order INTEGER NOT NULL CHECK (lesson_order >= 0),
                    status TEXT NOT NULL,
                    time_spent_secs REAL NOT NULL CHECK (time_spent_secs >= 0),
                    last_position_secs REAL NOT NULL CHECK (last_position_secs >= 0),
                    observed_max_secs REAL NOT NULL CHECK (observed_max_secs >= 0),
                    total_duration_secs REAL NOT NULL CHECK (total_duration_secs >= 0),
                    percent_watched INTEGER NOT NULL CHECK (percent_watched BETWEEN 0 AND 100),
                    started_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    completed_at TEXT,
                    PRIMARY KEY (learner_id, lesson_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS bookmarks (
                    id TEXT PRIMARY KEY,
                    learner_id INTEGER NOT NULL,
                    lesson_id INTEGER NOT NULL,
                    position_secs REAL NOT NULL CHECK (position_secs >= 0),
                    title TEXT NOT NULL,
                    note TEXT,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (learner_id, lesson_id)
                        REFERENCES lesson_progress(learner_id, lesson_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS checkpoint_log (
                    id INTEGER PRIMARY KEY,
                    learner_id INTEGER NOT NULL,
                    course_id INTEGER NOT NULL,
                    lesson_id INTEGER NOT NULL,
                    time_delta_secs REAL NOT NULL CHECK (time_delta_secs >= 0),
                    recorded_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_lesson_progress_learner_course
                    ON lesson_progress (learner_id, course_id, lesson_order);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_bookmarks_learner_lesson
                    ON bookmarks (learner_id, lesson_id, created_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_checkpoint_log_learner_recorded
                    ON checkpoint_log (learner_id, recorded_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
