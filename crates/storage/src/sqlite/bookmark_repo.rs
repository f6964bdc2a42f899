use async_trait::async_trait;
use progress_core::model::{Bookmark, BookmarkId, LearnerId, LessonId};

use super::{
    SqliteRepository,
    mapping::{id_i64, map_bookmark_row},
};
use crate::repository::{BookmarkRepository, StorageError};

impl SqliteRepository {
    pub(super) async fn list_bookmarks_inner(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Vec<Bookmark>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, position_secs, title, note, created_at
                FROM bookmarks
                WHERE learner_id = ?1 AND lesson_id = ?2
                ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_bookmark_row(&row)?);
        }
        Ok(out)
    }

    async fn lesson_exists(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT 1 FROM lesson_progress WHERE learner_id = ?1 AND lesson_id = ?2",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl BookmarkRepository for SqliteRepository {
    async fn append_bookmark(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
        bookmark: &Bookmark,
    ) -> Result<(), StorageError> {
        if !self.lesson_exists(learner_id, lesson_id).await? {
            return Err(StorageError::NotFound);
        }

        // ON CONFLICT DO NOTHING keeps retried appends idempotent.
        sqlx::query(
            r"
                INSERT INTO bookmarks (
                    id, learner_id, lesson_id, position_secs, title, note, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(bookmark.id().to_string())
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .bind(bookmark.position_secs())
        .bind(bookmark.title())
        .bind(bookmark.note())
        .bind(bookmark.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn list_bookmarks(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Vec<Bookmark>, StorageError> {
        self.list_bookmarks_inner(learner_id, lesson_id).await
    }

    async fn get_bookmark(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
        bookmark_id: BookmarkId,
    ) -> Result<Bookmark, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, position_secs, title, note, created_at
                FROM bookmarks
                WHERE learner_id = ?1 AND lesson_id = ?2 AND id = ?3
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .bind(bookmark_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_bookmark_row(&row)
    }
}
