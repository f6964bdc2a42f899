use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use progress_core::model::{CheckpointRecord, LearnerId};
use sqlx::Row;
use std::collections::BTreeSet;

use super::{
    SqliteRepository,
    mapping::{id_i64, ser},
};
use crate::repository::{CheckpointLogRepository, StorageError};

#[async_trait]
impl CheckpointLogRepository for SqliteRepository {
    async fn append_checkpoint(&self, record: &CheckpointRecord) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO checkpoint_log (
                    learner_id, course_id, lesson_id, time_delta_secs, recorded_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("learner_id", record.learner_id.value())?)
        .bind(id_i64("course_id", record.course_id.value())?)
        .bind(id_i64("lesson_id", record.lesson_id.value())?)
        .bind(record.time_delta_secs.max(0.0))
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.last_insert_rowid())
    }

    async fn list_activity_days(
        &self,
        learner_id: LearnerId,
        since: DateTime<Utc>,
    ) -> Result<BTreeSet<NaiveDate>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT recorded_at FROM checkpoint_log
                WHERE learner_id = ?1 AND recorded_at >= ?2 AND time_delta_secs > 0
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        // Calendar-day grouping happens here rather than in SQL so the date
        // semantics stay identical to the in-memory backend.
        let mut days = BTreeSet::new();
        for row in rows {
            let recorded_at: DateTime<Utc> = row.try_get("recorded_at").map_err(ser)?;
            days.insert(recorded_at.date_naive());
        }
        Ok(days)
    }
}
