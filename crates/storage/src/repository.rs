use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use progress_core::model::{
    Bookmark, BookmarkId, CheckpointRecord, CourseId, LearnerId, LessonId, LessonProgress,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Outcome of a snapshot upsert under the monotonic ordering guard.
///
/// Checkpoints carry absolute snapshots, so a stale one (older `time_spent`
/// than what is stored) is discarded rather than rolling state back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertDisposition {
    /// The snapshot was written (possibly merged with preserved fields).
    Applied,
    /// The snapshot was older than the stored record and ignored.
    StaleDiscarded,
}

/// Repository contract for lesson progress records.
#[async_trait]
pub trait LessonProgressRepository: Send + Sync {
    /// Fetch the record for a learner/lesson pair, with its bookmarks.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures. A missing record is
    /// `Ok(None)` — records are created lazily on first playback.
    async fn get(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError>;

    /// Persist a full checkpoint snapshot behind the monotonic guard.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored. A discarded
    /// stale snapshot is not an error.
    async fn upsert_snapshot(
        &self,
        snapshot: &LessonProgress,
    ) -> Result<UpsertDisposition, StorageError>;

    /// All lesson records for a learner within one course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_for_course(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError>;

    /// All lesson records for a learner across courses.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<LessonProgress>, StorageError>;
}

/// Repository contract for bookmarks.
///
/// Bookmarks persist immediately on creation, outside the checkpoint batching
/// path — they are discrete intentional actions.
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Append a bookmark to a lesson record. Re-appending an existing id is a
    /// no-op (idempotent retry).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson record does not exist.
    async fn append_bookmark(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
        bookmark: &Bookmark,
    ) -> Result<(), StorageError>;

    /// All bookmarks for a lesson, in creation order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_bookmarks(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Vec<Bookmark>, StorageError>;

    /// Fetch a single bookmark by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_bookmark(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
        bookmark_id: BookmarkId,
    ) -> Result<Bookmark, StorageError>;
}

/// Repository contract for the append-only checkpoint activity log.
#[async_trait]
pub trait CheckpointLogRepository: Send + Sync {
    /// Append one checkpoint record, returning its storage id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn append_checkpoint(&self, record: &CheckpointRecord) -> Result<i64, StorageError>;

    /// Distinct UTC calendar days with at least one qualifying checkpoint
    /// (positive watch-time delta) since `since`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_activity_days(
        &self,
        learner_id: LearnerId,
        since: DateTime<Utc>,
    ) -> Result<BTreeSet<NaiveDate>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    lessons: Arc<Mutex<HashMap<(LearnerId, LessonId), LessonProgress>>>,
    checkpoints: Arc<Mutex<Vec<CheckpointRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lessons: Arc::new(Mutex::new(HashMap::new())),
            checkpoints: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl LessonProgressRepository for InMemoryRepository {
    async fn get(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(learner_id, lesson_id)).cloned())
    }

    async fn upsert_snapshot(
        &self,
        snapshot: &LessonProgress,
    ) -> Result<UpsertDisposition, StorageError> {
        let mut guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let key = (snapshot.learner_id(), snapshot.lesson_id());
        match guard.remove(&key) {
            Some(stored) => {
                let (merged, applied) = LessonProgress::absorb(stored, snapshot.clone());
                guard.insert(key, merged);
                if applied {
                    Ok(UpsertDisposition::Applied)
                } else {
                    Ok(UpsertDisposition::StaleDiscarded)
                }
            }
            None => {
                guard.insert(key, snapshot.clone());
                Ok(UpsertDisposition::Applied)
            }
        }
    }

    async fn list_for_course(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut lessons: Vec<_> = guard
            .values()
            .filter(|l| l.learner_id() == learner_id && l.course_id() == course_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.lesson_order(), l.lesson_id()));
        Ok(lessons)
    }

    async fn list_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut lessons: Vec<_> = guard
            .values()
            .filter(|l| l.learner_id() == learner_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.course_id(), l.lesson_order(), l.lesson_id()));
        Ok(lessons)
    }
}

#[async_trait]
impl BookmarkRepository for InMemoryRepository {
    async fn append_bookmark(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
        bookmark: &Bookmark,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let lesson = guard
            .get_mut(&(learner_id, lesson_id))
            .ok_or(StorageError::NotFound)?;
        lesson.add_bookmark(bookmark.clone());
        Ok(())
    }

    async fn list_bookmarks(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Vec<Bookmark>, StorageError> {
        let guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let lesson = guard
            .get(&(learner_id, lesson_id))
            .ok_or(StorageError::NotFound)?;
        Ok(lesson.bookmarks().to_vec())
    }

    async fn get_bookmark(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
        bookmark_id: BookmarkId,
    ) -> Result<Bookmark, StorageError> {
        let guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .get(&(learner_id, lesson_id))
            .and_then(|l| l.bookmark(bookmark_id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl CheckpointLogRepository for InMemoryRepository {
    async fn append_checkpoint(&self, record: &CheckpointRecord) -> Result<i64, StorageError> {
        let mut guard = self
            .checkpoints
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(record.clone());
        i64::try_from(guard.len()).map_err(|_| StorageError::Serialization("id overflow".into()))
    }

    async fn list_activity_days(
        &self,
        learner_id: LearnerId,
        since: DateTime<Utc>,
    ) -> Result<BTreeSet<NaiveDate>, StorageError> {
        let guard = self
            .checkpoints
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .filter(|r| {
                r.learner_id == learner_id && r.recorded_at >= since && r.qualifies_for_streak()
            })
            .map(|r| r.recorded_at.date_naive())
            .collect())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub lessons: Arc<dyn LessonProgressRepository>,
    pub bookmarks: Arc<dyn BookmarkRepository>,
    pub checkpoints: Arc<dyn CheckpointLogRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let lessons: Arc<dyn LessonProgressRepository> = Arc::new(repo.clone());
        let bookmarks: Arc<dyn BookmarkRepository> = Arc::new(repo.clone());
        let checkpoints: Arc<dyn CheckpointLogRepository> = Arc::new(repo);
        Self {
            lessons,
            bookmarks,
            checkpoints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use progress_core::time::fixed_now;

    fn build_lesson(learner: u64, lesson: u64, watched: f64) -> LessonProgress {
        let mut progress = LessonProgress::new(
            LearnerId::new(learner),
            CourseId::new(1),
            LessonId::new(lesson),
            format!("Lesson {lesson}"),
            u32::try_from(lesson).unwrap(),
            1200.0,
            fixed_now(),
        )
        .unwrap();
        if watched > 0.0 {
            progress.record_playback(watched, watched, watched, fixed_now());
        }
        progress
    }

    #[tokio::test]
    async fn round_trips_lesson_progress() {
        let repo = InMemoryRepository::new();
        let lesson = build_lesson(1, 10, 60.0);
        repo.upsert_snapshot(&lesson).await.unwrap();

        let fetched = repo
            .get(LearnerId::new(1), LessonId::new(10))
            .await
            .unwrap()
            .expect("record exists");
        assert_eq!(fetched.time_spent_secs(), 60.0);

        let missing = repo.get(LearnerId::new(1), LessonId::new(11)).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn stale_snapshot_is_discarded() {
        let repo = InMemoryRepository::new();
        let newer = build_lesson(1, 10, 400.0);
        let stale = build_lesson(1, 10, 250.0);

        assert_eq!(
            repo.upsert_snapshot(&newer).await.unwrap(),
            UpsertDisposition::Applied
        );
        assert_eq!(
            repo.upsert_snapshot(&stale).await.unwrap(),
            UpsertDisposition::StaleDiscarded
        );

        let stored = repo
            .get(LearnerId::new(1), LessonId::new(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.time_spent_secs(), 400.0);
    }

    #[tokio::test]
    async fn bookmarks_require_existing_record() {
        let repo = InMemoryRepository::new();
        let bookmark = Bookmark::new(
            BookmarkId::generate(),
            30.0,
            "definition",
            None,
            1200.0,
            fixed_now(),
        )
        .unwrap();

        let err = repo
            .append_bookmark(LearnerId::new(1), LessonId::new(10), &bookmark)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        repo.upsert_snapshot(&build_lesson(1, 10, 10.0)).await.unwrap();
        repo.append_bookmark(LearnerId::new(1), LessonId::new(10), &bookmark)
            .await
            .unwrap();

        let listed = repo
            .list_bookmarks(LearnerId::new(1), LessonId::new(10))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id(), bookmark.id());
    }

    #[tokio::test]
    async fn activity_days_filter_qualifying_checkpoints() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();

        for (delta, days_ago) in [(30.0, 0), (0.0, 1), (45.0, 2)] {
            let record = CheckpointRecord::new(
                LearnerId::new(1),
                CourseId::new(1),
                LessonId::new(10),
                delta,
                now - Duration::days(days_ago),
            );
            repo.append_checkpoint(&record).await.unwrap();
        }

        let days = repo
            .list_activity_days(LearnerId::new(1), now - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(days.len(), 2);
        assert!(days.contains(&now.date_naive()));
        // the zero-delta checkpoint day does not qualify
        assert!(!days.contains(&(now - Duration::days(1)).date_naive()));
    }

    #[tokio::test]
    async fn list_for_course_is_ordered_by_lesson_order() {
        let repo = InMemoryRepository::new();
        repo.upsert_snapshot(&build_lesson(1, 3, 5.0)).await.unwrap();
        repo.upsert_snapshot(&build_lesson(1, 1, 5.0)).await.unwrap();
        repo.upsert_snapshot(&build_lesson(2, 2, 5.0)).await.unwrap();

        let lessons = repo
            .list_for_course(LearnerId::new(1), CourseId::new(1))
            .await
            .unwrap();
        let ids: Vec<_> = lessons.iter().map(|l| l.lesson_id().value()).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
