use std::sync::Arc;

use progress_core::Clock;
use progress_core::model::{Bookmark, BookmarkId, LearnerId, LessonId};
use storage::repository::{BookmarkRepository, LessonProgressRepository};

use crate::error::BookmarkServiceError;

/// Bookmark operations over the lesson record store.
///
/// Bookmarks are discrete intentional actions, so they persist immediately
/// rather than riding the checkpoint batching policy. Validation failures
/// surface to the caller synchronously with no partial write.
#[derive(Clone)]
pub struct BookmarkService {
    clock: Clock,
    lessons: Arc<dyn LessonProgressRepository>,
    bookmarks: Arc<dyn BookmarkRepository>,
}

impl BookmarkService {
    #[must_use]
    pub fn new(
        clock: Clock,
        lessons: Arc<dyn LessonProgressRepository>,
        bookmarks: Arc<dyn BookmarkRepository>,
    ) -> Self {
        Self {
            clock,
            lessons,
            bookmarks,
        }
    }

    /// Creates and persists a bookmark at a playback position.
    ///
    /// The position is validated against the stored record's media duration.
    ///
    /// # Errors
    ///
    /// Returns `BookmarkServiceError::LessonNotStarted` if no progress record
    /// exists yet, `BookmarkServiceError::Bookmark` for an empty title or
    /// out-of-range position, and `BookmarkServiceError::Storage` on
    /// persistence failures.
    pub async fn add_bookmark(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
        position_secs: f64,
        title: impl Into<String> + Send,
        note: Option<String>,
    ) -> Result<Bookmark, BookmarkServiceError> {
        let record = self
            .lessons
            .get(learner_id, lesson_id)
            .await?
            .ok_or(BookmarkServiceError::LessonNotStarted)?;

        let bookmark = Bookmark::new(
            BookmarkId::generate(),
            position_secs,
            title,
            note,
            record.total_duration_secs(),
            self.clock.now(),
        )?;

        self.bookmarks
            .append_bookmark(learner_id, lesson_id, &bookmark)
            .await?;
        Ok(bookmark)
    }

    /// All bookmarks on a lesson, in creation order.
    ///
    /// # Errors
    ///
    /// Returns `BookmarkServiceError::Storage` on repository failures.
    pub async fn list_bookmarks(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Vec<Bookmark>, BookmarkServiceError> {
        Ok(self.bookmarks.list_bookmarks(learner_id, lesson_id).await?)
    }

    /// Resolves a bookmark jump: returns the stored position for the caller
    /// to seek the player to. Pure read; progress state is untouched.
    ///
    /// # Errors
    ///
    /// Returns `BookmarkServiceError::Storage` if the bookmark is missing or
    /// the repository fails.
    pub async fn jump_to_bookmark(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
        bookmark_id: BookmarkId,
    ) -> Result<f64, BookmarkServiceError> {
        let bookmark = self
            .bookmarks
            .get_bookmark(learner_id, lesson_id, bookmark_id)
            .await?;
        Ok(bookmark.position_secs())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
