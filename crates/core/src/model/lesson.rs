use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::bookmark::Bookmark;
use crate::model::ids::{BookmarkId, CourseId, LearnerId, LessonId};
use crate::playback::percent_watched;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum LessonProgressError {
    #[error("lesson name cannot be empty")]
    EmptyLessonName,

    #[error("{field} must be a finite non-negative number of seconds, got {value}")]
    InvalidSeconds { field: &'static str, value: f64 },

    #[error("completed lesson is missing its completion timestamp")]
    MissingCompletionTimestamp,
}

//
// ─── STATUS ───────────────────────────────────────────────────────────────────
//

/// Lesson-level progress status. Moves forward only; `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    /// Storage representation, kept in sync with the repository mapping.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ProgressStatus::Completed)
    }
}

/// Result of asking a lesson to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The lesson just crossed the threshold; fire the one-time signal.
    Transitioned,
    /// Already completed earlier; retried checkpoints land here.
    AlreadyCompleted,
    /// Percent watched has not reached the threshold yet.
    BelowThreshold,
}

//
// ─── LESSON PROGRESS ──────────────────────────────────────────────────────────
//

/// Durable per-learner, per-lesson progress record.
///
/// Created lazily on the first playback event, mutated by checkpoints and the
/// completion transition, never deleted by this subsystem. Watch time and the
/// observed cursor maximum only grow; status never regresses once completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonProgress {
    learner_id: LearnerId,
    course_id: CourseId,
    lesson_id: LessonId,
    lesson_name: String,
    lesson_order: u32,
    status: ProgressStatus,
    time_spent_secs: f64,
    last_position_secs: f64,
    observed_max_secs: f64,
    total_duration_secs: f64,
    bookmarks: Vec<Bookmark>,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    /// Creates a fresh record for the first playback event of a lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonProgressError` for a blank lesson name or a negative
    /// duration. A zero duration is allowed (unknown media length) and keeps
    /// `percent_watched` at 0.
    pub fn new(
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
        lesson_name: impl Into<String>,
        lesson_order: u32,
        total_duration_secs: f64,
        now: DateTime<Utc>,
    ) -> Result<Self, LessonProgressError> {
        let lesson_name = lesson_name.into();
        if lesson_name.trim().is_empty() {
            return Err(LessonProgressError::EmptyLessonName);
        }
        check_secs("total_duration_secs", total_duration_secs)?;

        Ok(Self {
            learner_id,
            course_id,
            lesson_id,
            lesson_name,
            lesson_order,
            status: ProgressStatus::NotStarted,
            time_spent_secs: 0.0,
            last_position_secs: 0.0,
            observed_max_secs: 0.0,
            total_duration_secs,
            bookmarks: Vec::new(),
            started_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    /// Rehydrates a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `LessonProgressError` if any seconds field is negative or
    /// non-finite, the name is blank, or a completed record lacks its
    /// completion timestamp.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
        lesson_name: String,
        lesson_order: u32,
        status: ProgressStatus,
        time_spent_secs: f64,
        last_position_secs: f64,
        observed_max_secs: f64,
        total_duration_secs: f64,
        started_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, LessonProgressError> {
        if lesson_name.trim().is_empty() {
            return Err(LessonProgressError::EmptyLessonName);
        }
        check_secs("time_spent_secs", time_spent_secs)?;
        check_secs("last_position_secs", last_position_secs)?;
        check_secs("observed_max_secs", observed_max_secs)?;
        check_secs("total_duration_secs", total_duration_secs)?;
        if status == ProgressStatus::Completed && completed_at.is_none() {
            return Err(LessonProgressError::MissingCompletionTimestamp);
        }

        Ok(Self {
            learner_id,
            course_id,
            lesson_id,
            lesson_name,
            lesson_order,
            status,
            time_spent_secs,
            last_position_secs,
            observed_max_secs,
            total_duration_secs,
            bookmarks: Vec::new(),
            started_at,
            updated_at,
            completed_at,
        })
    }

    //
    // ─── MUTATION ─────────────────────────────────────────────────────────────
    //

    /// Folds one filtered playback observation into the record.
    ///
    /// `authentic_delta_secs` is the watch-time credit decided by the sample
    /// filter (0 for seeks/rewinds). The cursor position updates
    /// unconditionally so resume always lands where the learner left off.
    pub fn record_playback(
        &mut self,
        position_secs: f64,
        observed_max_secs: f64,
        authentic_delta_secs: f64,
        now: DateTime<Utc>,
    ) {
        if authentic_delta_secs > 0.0 {
            self.time_spent_secs += authentic_delta_secs;
        }
        if position_secs.is_finite() && position_secs >= 0.0 {
            self.last_position_secs = position_secs;
        }
        self.observed_max_secs = self.observed_max_secs.max(observed_max_secs);
        self.updated_at = now;

        if self.status == ProgressStatus::NotStarted
            && (self.time_spent_secs > 0.0 || self.observed_max_secs > 0.0)
        {
            self.status = ProgressStatus::InProgress;
        }
    }

    /// The player reported a new media duration for this lesson.
    ///
    /// Percent watched is recomputed against the new value from here on; the
    /// stale percentage is never preserved.
    pub fn refresh_duration(&mut self, total_duration_secs: f64) {
        if total_duration_secs.is_finite() && total_duration_secs >= 0.0 {
            self.total_duration_secs = total_duration_secs;
        }
    }

    /// Attempts the `in_progress -> completed` transition.
    ///
    /// Fires at most once per lesson: a second call on a completed record is a
    /// no-op returning `AlreadyCompleted`, which guards against duplicate
    /// signals from retried checkpoints. A later drop in percent watched never
    /// reverses the transition.
    pub fn try_complete(
        &mut self,
        threshold_percent: u8,
        now: DateTime<Utc>,
    ) -> CompletionOutcome {
        if self.status == ProgressStatus::Completed {
            return CompletionOutcome::AlreadyCompleted;
        }
        if self.percent_watched() < threshold_percent {
            return CompletionOutcome::BelowThreshold;
        }
        self.status = ProgressStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        CompletionOutcome::Transitioned
    }

    /// Adds a bookmark to the set. Re-adding an existing id is a no-op.
    pub fn add_bookmark(&mut self, bookmark: Bookmark) {
        if self.bookmark(bookmark.id()).is_none() {
            self.bookmarks.push(bookmark);
        }
    }

    /// Replaces the bookmark set with the persisted one (used on load).
    #[must_use]
    pub fn with_bookmarks(mut self, bookmarks: Vec<Bookmark>) -> Self {
        self.bookmarks = bookmarks;
        self
    }

    //
    // ─── ORDERING GUARD ───────────────────────────────────────────────────────
    //

    /// Whether this snapshot may overwrite `stored`.
    ///
    /// Checkpoints are ordered by monotonic `time_spent_secs`, not by arrival
    /// time; an equal value is an idempotent retry and may apply.
    #[must_use]
    pub fn supersedes(&self, stored: &Self) -> bool {
        self.time_spent_secs >= stored.time_spent_secs
    }

    /// Last-writer-wins-by-value merge of an incoming snapshot over a stored
    /// record. Returns the surviving record and whether the incoming snapshot
    /// was applied.
    ///
    /// A stale snapshot (smaller `time_spent_secs`) is discarded outright.
    /// Even when applied, completion status, the observed maximum, and the
    /// earliest start date never roll back, and the stored bookmark set is
    /// kept (bookmarks persist through their own path).
    #[must_use]
    pub fn absorb(stored: Self, incoming: Self) -> (Self, bool) {
        if !incoming.supersedes(&stored) {
            return (stored, false);
        }

        let mut merged = incoming;
        merged.observed_max_secs = merged.observed_max_secs.max(stored.observed_max_secs);
        merged.started_at = merged.started_at.min(stored.started_at);
        if stored.status == ProgressStatus::Completed {
            merged.status = ProgressStatus::Completed;
            merged.completed_at = stored.completed_at;
        }
        let mut bookmarks = stored.bookmarks;
        for bookmark in merged.bookmarks {
            if !bookmarks.iter().any(|b| b.id() == bookmark.id()) {
                bookmarks.push(bookmark);
            }
        }
        merged.bookmarks = bookmarks;
        (merged, true)
    }

    //
    // ─── ACCESSORS ────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn lesson_name(&self) -> &str {
        &self.lesson_name
    }

    #[must_use]
    pub fn lesson_order(&self) -> u32 {
        self.lesson_order
    }

    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    /// Accumulated authentic watch time in seconds.
    #[must_use]
    pub fn time_spent_secs(&self) -> f64 {
        self.time_spent_secs
    }

    /// Last known playback cursor, used to resume.
    #[must_use]
    pub fn last_position_secs(&self) -> f64 {
        self.last_position_secs
    }

    /// High-water mark of the playback cursor across all sessions.
    #[must_use]
    pub fn observed_max_secs(&self) -> f64 {
        self.observed_max_secs
    }

    #[must_use]
    pub fn total_duration_secs(&self) -> f64 {
        self.total_duration_secs
    }

    /// Percentage of content reached, derived from the observed maximum.
    #[must_use]
    pub fn percent_watched(&self) -> u8 {
        percent_watched(self.observed_max_secs, self.total_duration_secs)
    }

    #[must_use]
    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    #[must_use]
    pub fn bookmark(&self, id: BookmarkId) -> Option<&Bookmark> {
        self.bookmarks.iter().find(|b| b.id() == id)
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

fn check_secs(field: &'static str, value: f64) -> Result<(), LessonProgressError> {
    if !value.is_finite() || value < 0.0 {
        return Err(LessonProgressError::InvalidSeconds { field, value });
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
