use chrono::{DateTime, Utc};
use std::fmt;

use progress_core::model::{
    CompletionOutcome, CourseId, LearnerId, LessonId, LessonProgress, ProgressStatus,
};
use progress_core::playback::{SampleKind, WatchTimer};

use super::progress::SessionProgress;

//
// ─── LIFECYCLE EVENTS ──────────────────────────────────────────────────────────
//

/// Discrete player lifecycle events consumed by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Play,
    Pause,
    Ended,
    NavigatedAway,
}

//
// ─── PLAYBACK SESSION ──────────────────────────────────────────────────────────
//

/// In-memory state for one learner's active playback of one lesson.
///
/// Holds the working copy of the `LessonProgress` record and a `WatchTimer`
/// resumed from its persisted totals. All methods are synchronous; persistence
/// is the tracker's job, so a slow store never blocks sample handling.
pub struct PlaybackSession {
    record: LessonProgress,
    timer: WatchTimer,
    unsaved_secs: f64,
    has_persisted_baseline: bool,
    stopped: bool,
}

impl PlaybackSession {
    pub(crate) fn new(record: LessonProgress, has_persisted_baseline: bool) -> Self {
        let timer = WatchTimer::resume(
            record.total_duration_secs(),
            record.time_spent_secs(),
            record.observed_max_secs(),
        );
        Self {
            record,
            timer,
            unsaved_secs: 0.0,
            has_persisted_baseline,
            stopped: false,
        }
    }

    /// Feeds one time-cursor sample from the player.
    ///
    /// The filter decides whether the delta is authentic; the working record
    /// absorbs the classified observation either way (cursor position and the
    /// observed maximum update even for discarded jumps).
    pub(crate) fn record_sample(&mut self, cursor_secs: f64, now: DateTime<Utc>) -> SampleKind {
        let kind = self.timer.observe(cursor_secs);
        self.record.record_playback(
            cursor_secs,
            self.timer.observed_max_secs(),
            kind.credited_secs(),
            now,
        );
        self.unsaved_secs += kind.credited_secs();
        kind
    }

    /// Applies a discrete lifecycle event to the in-memory state.
    pub(crate) fn apply_lifecycle(&mut self, event: LifecycleEvent, now: DateTime<Utc>) {
        match event {
            // a fresh continuity segment starts; the next sample is Initial
            LifecycleEvent::Play | LifecycleEvent::Pause | LifecycleEvent::NavigatedAway => {
                self.timer.suspend();
            }
            LifecycleEvent::Ended => {
                // the cursor snapped to the end; no watch time for the gap
                let duration = self.record.total_duration_secs();
                self.timer.note_cursor(duration);
                self.record
                    .record_playback(duration, self.timer.observed_max_secs(), 0.0, now);
            }
        }
    }

    /// Records an explicit seek command (resume jump, bookmark jump).
    ///
    /// The moved cursor earns no watch time and resets sample continuity.
    pub fn note_seek(&mut self, target_secs: f64, now: DateTime<Utc>) {
        self.timer.note_cursor(target_secs);
        self.record
            .record_playback(target_secs, self.timer.observed_max_secs(), 0.0, now);
    }

    pub(crate) fn try_complete(
        &mut self,
        threshold_percent: u8,
        now: DateTime<Utc>,
    ) -> CompletionOutcome {
        self.record.try_complete(threshold_percent, now)
    }

    /// Unsaved authentic watch time accumulated since the last checkpoint.
    #[must_use]
    pub fn unsaved_secs(&self) -> f64 {
        self.unsaved_secs
    }

    pub(crate) fn take_unsaved(&mut self) -> f64 {
        std::mem::take(&mut self.unsaved_secs)
    }

    /// Puts an unflushed amount back after a failed checkpoint so the next
    /// trigger carries the full accumulation.
    pub(crate) fn restore_unsaved(&mut self, delta_secs: f64) {
        self.unsaved_secs += delta_secs;
    }

    /// Whether there is anything worth persisting yet. Records are created
    /// lazily on first playback, so a session that never saw a sample does not
    /// materialize an empty row.
    pub(crate) fn should_persist(&self) -> bool {
        self.has_persisted_baseline || self.record.status() != ProgressStatus::NotStarted
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.has_persisted_baseline = true;
    }

    pub(crate) fn stop(&mut self) {
        self.stopped = true;
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// The current full snapshot, as carried by checkpoints.
    #[must_use]
    pub fn snapshot(&self) -> LessonProgress {
        self.record.clone()
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            status: self.record.status(),
            percent_watched: self.record.percent_watched(),
            time_spent_secs: self.record.time_spent_secs(),
            last_position_secs: self.record.last_position_secs(),
            is_complete: self.record.status().is_terminal(),
        }
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.record.learner_id()
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.record.course_id()
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.record.lesson_id()
    }

    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.record.status()
    }

    #[must_use]
    pub fn percent_watched(&self) -> u8 {
        self.record.percent_watched()
    }

    #[must_use]
    pub fn time_spent_secs(&self) -> f64 {
        self.record.time_spent_secs()
    }

    #[must_use]
    pub fn last_position_secs(&self) -> f64 {
        self.record.last_position_secs()
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("learner_id", &self.record.learner_id())
            .field("lesson_id", &self.record.lesson_id())
            .field("status", &self.record.status())
            .field("time_spent_secs", &self.record.time_spent_secs())
            .field("unsaved_secs", &self.unsaved_secs)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
