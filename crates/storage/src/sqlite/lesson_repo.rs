use async_trait::async_trait;
use progress_core::model::{Bookmark, CourseId, LearnerId, LessonId, LessonProgress};
use sqlx::Row;
use std::collections::HashMap;

use super::{
    SqliteRepository,
    mapping::{id_i64, map_bookmark_row, map_lesson_row, ser},
};
use crate::repository::{LessonProgressRepository, StorageError, UpsertDisposition};

const SELECT_COLUMNS: &str = r"
    learner_id, course_id, lesson_id, lesson_name, lesson_order, status,
    time_spent_secs, last_position_secs, observed_max_secs, total_duration_secs,
    percent_watched, started_at, updated_at, completed_at
";

impl SqliteRepository {
    /// Bookmarks for every lesson of a learner, grouped by lesson id.
    async fn bookmarks_by_lesson(
        &self,
        learner_id: LearnerId,
    ) -> Result<HashMap<i64, Vec<Bookmark>>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, lesson_id, position_secs, title, note, created_at
                FROM bookmarks
                WHERE learner_id = ?1
                ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut grouped: HashMap<i64, Vec<Bookmark>> = HashMap::new();
        for row in rows {
            let lesson_id: i64 = row.try_get("lesson_id").map_err(ser)?;
            grouped.entry(lesson_id).or_default().push(map_bookmark_row(&row)?);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl LessonProgressRepository for SqliteRepository {
    async fn get(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM lesson_progress WHERE learner_id = ?1 AND lesson_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(id_i64("learner_id", learner_id.value())?)
            .bind(id_i64("lesson_id", lesson_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lesson = map_lesson_row(&row)?;
        let bookmarks = self.list_bookmarks_inner(learner_id, lesson_id).await?;
        Ok(Some(lesson.with_bookmarks(bookmarks)))
    }

    async fn upsert_snapshot(
        &self,
        snapshot: &LessonProgress,
    ) -> Result<UpsertDisposition, StorageError> {
        let learner = id_i64("learner_id", snapshot.learner_id().value())?;
        let lesson = id_i64("lesson_id", snapshot.lesson_id().value())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM lesson_progress WHERE learner_id = ?1 AND lesson_id = ?2"
        );
        let existing = sqlx::query(&sql)
            .bind(learner)
            .bind(lesson)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        // Merge in the domain so both backends share the exact monotonic
        // rollback-guard semantics.
        let (merged, applied) = match existing {
            Some(row) => {
                let stored = map_lesson_row(&row)?;
                LessonProgress::absorb(stored, snapshot.clone())
            }
            None => (snapshot.clone(), true),
        };

        if !applied {
            tx.rollback()
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            return Ok(UpsertDisposition::StaleDiscarded);
        }

        sqlx::query(
            r"
                INSERT OR REPLACE INTO lesson_progress (
                    learner_id, course_id, lesson_id, lesson_name, lesson_order,
                    status, time_spent_secs, last_position_secs, observed_max_secs,
                    total_duration_secs, percent_watched, started_at, updated_at,
                    completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ",
        )
        .bind(learner)
        .bind(id_i64("course_id", merged.course_id().value())?)
        .bind(lesson)
        .bind(merged.lesson_name())
        .bind(i64::from(merged.lesson_order()))
        .bind(merged.status().as_str())
        .bind(merged.time_spent_secs())
        .bind(merged.last_position_secs())
        .bind(merged.observed_max_secs())
        .bind(merged.total_duration_secs())
        .bind(i64::from(merged.percent_watched()))
        .bind(merged.started_at())
        .bind(merged.updated_at())
        .bind(merged.completed_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(UpsertDisposition::Applied)
    }

    async fn list_for_course(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let sql = format!(
            r"
                SELECT {SELECT_COLUMNS} FROM lesson_progress
                WHERE learner_id = ?1 AND course_id = ?2
                ORDER BY lesson_order ASC, lesson_id ASC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("learner_id", learner_id.value())?)
            .bind(id_i64("course_id", course_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut bookmarks = self.bookmarks_by_lesson(learner_id).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let lesson = map_lesson_row(&row)?;
            let lesson_key = id_i64("lesson_id", lesson.lesson_id().value())?;
            let attached = bookmarks.remove(&lesson_key).unwrap_or_default();
            out.push(lesson.with_bookmarks(attached));
        }
        Ok(out)
    }

    async fn list_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let sql = format!(
            r"
                SELECT {SELECT_COLUMNS} FROM lesson_progress
                WHERE learner_id = ?1
                ORDER BY course_id ASC, lesson_order ASC, lesson_id ASC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("learner_id", learner_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut bookmarks = self.bookmarks_by_lesson(learner_id).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let lesson = map_lesson_row(&row)?;
            let lesson_key = id_i64("lesson_id", lesson.lesson_id().value())?;
            let attached = bookmarks.remove(&lesson_key).unwrap_or_default();
            out.push(lesson.with_bookmarks(attached));
        }
        Ok(out)
    }
}
