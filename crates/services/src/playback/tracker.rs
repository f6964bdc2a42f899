use chrono::{DateTime, Utc};
use std::sync::Arc;

use progress_core::Clock;
use progress_core::model::{
    CheckpointRecord, CompletionOutcome, CourseId, LearnerId, LessonId, LessonProgress,
    TrackerSettings,
};
use progress_core::playback::SampleKind;
use storage::repository::{CheckpointLogRepository, LessonProgressRepository};

use super::session::{LifecycleEvent, PlaybackSession};
use crate::error::TrackingError;

//
// ─── DESCRIPTORS AND OUTCOMES ──────────────────────────────────────────────────
//

/// Lesson identity and media metadata supplied by the curriculum when a
/// session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonDescriptor {
    pub course_id: CourseId,
    pub lesson_id: LessonId,
    pub lesson_name: String,
    pub lesson_order: u32,
    pub total_duration_secs: f64,
}

/// One-time signal that a lesson crossed the completion threshold.
///
/// Emitted exactly once per lesson, separate from ordinary checkpoints, for
/// the UI's completion modal and content unlocking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    pub learner_id: LearnerId,
    pub course_id: CourseId,
    pub lesson_id: LessonId,
    pub completed_at: DateTime<Utc>,
}

/// A freshly started session plus the position the player should seek to.
#[derive(Debug)]
pub struct StartedSession {
    pub session: PlaybackSession,
    /// `Some` when auto-resume applies; the caller issues `seekTo` with it.
    pub resume_position_secs: Option<f64>,
}

/// Result of feeding one cursor sample through the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleOutcome {
    pub kind: SampleKind,
    /// Whether a checkpoint was persisted during this call.
    pub checkpointed: bool,
    pub completion: Option<CompletionEvent>,
}

/// Result of a lifecycle-triggered flush.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushOutcome {
    pub checkpointed: bool,
    pub completion: Option<CompletionEvent>,
}

//
// ─── TRACKER ───────────────────────────────────────────────────────────────────
//

/// Orchestrates playback sessions and checkpoint persistence.
///
/// Checkpoints fire when unsaved watch time reaches the configured interval or
/// on explicit lifecycle events. Each one carries the full current snapshot,
/// so retries and duplicates cannot corrupt stored state. Persistence failures
/// are contained here: the in-memory accumulation is kept and the next trigger
/// retries with the full amount, so playback never notices a flaky store.
#[derive(Clone)]
pub struct ProgressTrackerService {
    clock: Clock,
    lessons: Arc<dyn LessonProgressRepository>,
    checkpoints: Arc<dyn CheckpointLogRepository>,
    settings: TrackerSettings,
}

impl ProgressTrackerService {
    #[must_use]
    pub fn new(
        clock: Clock,
        lessons: Arc<dyn LessonProgressRepository>,
        checkpoints: Arc<dyn CheckpointLogRepository>,
    ) -> Self {
        Self {
            clock,
            lessons,
            checkpoints,
            settings: TrackerSettings::default_policy(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: TrackerSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Starts a playback session for a learner and lesson.
    ///
    /// Loads the persisted record if one exists (creating the working record
    /// lazily otherwise) and computes the auto-resume cue.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::Storage` if the record cannot be loaded, or
    /// `TrackingError::Lesson` if the descriptor fails validation.
    pub async fn start_session(
        &self,
        learner_id: LearnerId,
        descriptor: &LessonDescriptor,
    ) -> Result<StartedSession, TrackingError> {
        let existing = self.lessons.get(learner_id, descriptor.lesson_id).await?;
        let has_persisted_baseline = existing.is_some();

        let record = match existing {
            Some(mut record) => {
                // duration may have changed since the last session (re-encode);
                // percent is recomputed against the fresh value
                record.refresh_duration(descriptor.total_duration_secs);
                record
            }
            None => LessonProgress::new(
                learner_id,
                descriptor.course_id,
                descriptor.lesson_id,
                descriptor.lesson_name.clone(),
                descriptor.lesson_order,
                descriptor.total_duration_secs,
                self.clock.now(),
            )?,
        };

        let resume_position_secs = self.resume_cue(&record);
        Ok(StartedSession {
            session: PlaybackSession::new(record, has_persisted_baseline),
            resume_position_secs,
        })
    }

    fn resume_cue(&self, record: &LessonProgress) -> Option<f64> {
        if !self.settings.auto_resume() || record.status().is_terminal() {
            return None;
        }
        let position = record.last_position_secs();
        if position < self.settings.resume_threshold_secs() {
            return None;
        }
        if record.total_duration_secs() > 0.0 && position >= record.total_duration_secs() {
            return None;
        }
        Some(position)
    }

    /// Feeds one time-cursor sample from the player.
    ///
    /// May persist a checkpoint (time-based trigger, or immediately on the
    /// completion transition). Persistence failures are swallowed after
    /// logging; `checkpointed` reports what actually happened.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::SessionStopped` if the session was stopped.
    pub async fn record_sample(
        &self,
        session: &mut PlaybackSession,
        cursor_secs: f64,
    ) -> Result<SampleOutcome, TrackingError> {
        if session.is_stopped() {
            return Err(TrackingError::SessionStopped);
        }

        let now = self.clock.now();
        let kind = session.record_sample(cursor_secs, now);
        let completion = self.check_completion(session, now);

        let due = completion.is_some()
            || session.unsaved_secs() >= self.settings.checkpoint_interval_secs();
        let checkpointed = if due {
            self.checkpoint(session, now).await
        } else {
            false
        };

        Ok(SampleOutcome {
            kind,
            checkpointed,
            completion,
        })
    }

    /// Applies a lifecycle event (`pause`, `ended`, navigation) and flushes.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::SessionStopped` if the session was stopped.
    pub async fn flush(
        &self,
        session: &mut PlaybackSession,
        event: LifecycleEvent,
    ) -> Result<FlushOutcome, TrackingError> {
        if session.is_stopped() {
            return Err(TrackingError::SessionStopped);
        }

        let now = self.clock.now();
        session.apply_lifecycle(event, now);
        let completion = self.check_completion(session, now);

        let checkpointed = if session.should_persist() {
            self.checkpoint(session, now).await
        } else {
            false
        };

        Ok(FlushOutcome {
            checkpointed,
            completion,
        })
    }

    /// Ends the session: final best-effort checkpoint, then no further
    /// samples are accepted.
    ///
    /// # Errors
    ///
    /// Returns `TrackingError::SessionStopped` if already stopped.
    pub async fn stop_session(
        &self,
        session: &mut PlaybackSession,
    ) -> Result<FlushOutcome, TrackingError> {
        let outcome = self.flush(session, LifecycleEvent::NavigatedAway).await?;
        session.stop();
        Ok(outcome)
    }

    fn check_completion(
        &self,
        session: &mut PlaybackSession,
        now: DateTime<Utc>,
    ) -> Option<CompletionEvent> {
        match session.try_complete(self.settings.completion_threshold_percent(), now) {
            CompletionOutcome::Transitioned => {
                let event = CompletionEvent {
                    learner_id: session.learner_id(),
                    course_id: session.course_id(),
                    lesson_id: session.lesson_id(),
                    completed_at: now,
                };
                tracing::info!(
                    learner = %event.learner_id,
                    lesson = %event.lesson_id,
                    "lesson completed"
                );
                Some(event)
            }
            CompletionOutcome::AlreadyCompleted | CompletionOutcome::BelowThreshold => None,
        }
    }

    /// Persists the full current snapshot. On failure the unsaved amount is
    /// restored so the next trigger retries with everything accumulated.
    async fn checkpoint(&self, session: &mut PlaybackSession, now: DateTime<Utc>) -> bool {
        let delta = session.take_unsaved();
        let snapshot = session.snapshot();

        match self.lessons.upsert_snapshot(&snapshot).await {
            Ok(_disposition) => {
                session.mark_persisted();
                let record = CheckpointRecord::new(
                    session.learner_id(),
                    session.course_id(),
                    session.lesson_id(),
                    delta,
                    now,
                );
                if let Err(err) = self.checkpoints.append_checkpoint(&record).await {
                    tracing::warn!(error = %err, "failed to append checkpoint log entry");
                }
                tracing::debug!(
                    lesson = %session.lesson_id(),
                    delta_secs = delta,
                    "checkpoint persisted"
                );
                true
            }
            Err(err) => {
                session.restore_unsaved(delta);
                tracing::warn!(
                    error = %err,
                    lesson = %session.lesson_id(),
                    unsaved_secs = session.unsaved_secs(),
                    "checkpoint persistence failed; retrying on next trigger"
                );
                false
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use progress_core::model::ProgressStatus;
    use progress_core::time::{fixed_clock, fixed_now};
    use std::sync::atomic::{AtomicBool, Ordering};
    use storage::repository::{InMemoryRepository, StorageError, UpsertDisposition};

    fn descriptor(duration: f64) -> LessonDescriptor {
        LessonDescriptor {
            course_id: CourseId::new(10),
            lesson_id: LessonId::new(100),
            lesson_name: "Intro to Ownership".into(),
            lesson_order: 1,
            total_duration_secs: duration,
        }
    }

    fn build_tracker(repo: &InMemoryRepository) -> ProgressTrackerService {
        ProgressTrackerService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn checkpoint_fires_at_interval() {
        let repo = InMemoryRepository::new();
        let tracker = build_tracker(&repo);
        let started = tracker
            .start_session(LearnerId::new(1), &descriptor(1200.0))
            .await
            .unwrap();
        let mut session = started.session;
        assert!(started.resume_position_secs.is_none());

        // 2s steps; the 30s threshold is reached at cursor 30
        let mut checkpoints = 0;
        let mut cursor = 0.0;
        while cursor <= 30.0 {
            let outcome = tracker.record_sample(&mut session, cursor).await.unwrap();
            if outcome.checkpointed {
                checkpoints += 1;
            }
            cursor += 2.0;
        }
        assert_eq!(checkpoints, 1);

        let stored = repo
            .get(LearnerId::new(1), LessonId::new(100))
            .await
            .unwrap()
            .expect("record persisted");
        assert_eq!(stored.status(), ProgressStatus::InProgress);
        assert!((stored.time_spent_secs() - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn completion_fires_exactly_once() {
        let repo = InMemoryRepository::new();
        let tracker = build_tracker(&repo);
        let mut session = tracker
            .start_session(LearnerId::new(1), &descriptor(1200.0))
            .await
            .unwrap()
            .session;

        // watch continuously to 90% of 1200s
        let mut completions = Vec::new();
        let mut cursor = 0.0;
        while cursor <= 1080.0 {
            let outcome = tracker.record_sample(&mut session, cursor).await.unwrap();
            if let Some(event) = outcome.completion {
                completions.push(event);
            }
            cursor += 2.0;
        }

        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].lesson_id, LessonId::new(100));
        assert!((session.time_spent_secs() - 1080.0).abs() < 1e-6);
        assert_eq!(session.percent_watched(), 90);

        let stored = repo
            .get(LearnerId::new(1), LessonId::new(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status(), ProgressStatus::Completed);
    }

    #[tokio::test]
    async fn scrubbing_earns_no_watch_time() {
        let repo = InMemoryRepository::new();
        let tracker = build_tracker(&repo);
        let mut session = tracker
            .start_session(LearnerId::new(1), &descriptor(1200.0))
            .await
            .unwrap()
            .session;

        tracker.record_sample(&mut session, 100.0).await.unwrap();
        let outcome = tracker.record_sample(&mut session, 1100.0).await.unwrap();

        assert!(matches!(outcome.kind, SampleKind::Jump { .. }));
        assert_eq!(session.time_spent_secs(), 0.0);
        assert_eq!(session.percent_watched(), 92);
        // 92% crosses the threshold: furthest-reached drives completion
        assert!(outcome.completion.is_some());
    }

    #[tokio::test]
    async fn pause_flushes_partial_progress() {
        let repo = InMemoryRepository::new();
        let tracker = build_tracker(&repo);
        let mut session = tracker
            .start_session(LearnerId::new(1), &descriptor(1200.0))
            .await
            .unwrap()
            .session;

        tracker.record_sample(&mut session, 0.0).await.unwrap();
        tracker.record_sample(&mut session, 2.0).await.unwrap();
        tracker.record_sample(&mut session, 4.0).await.unwrap();

        // below the 30s interval, nothing persisted yet
        assert!(
            repo.get(LearnerId::new(1), LessonId::new(100))
                .await
                .unwrap()
                .is_none()
        );

        let outcome = tracker
            .flush(&mut session, LifecycleEvent::Pause)
            .await
            .unwrap();
        assert!(outcome.checkpointed);

        let stored = repo
            .get(LearnerId::new(1), LessonId::new(100))
            .await
            .unwrap()
            .unwrap();
        assert!((stored.time_spent_secs() - 4.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn untouched_session_never_materializes_a_record() {
        let repo = InMemoryRepository::new();
        let tracker = build_tracker(&repo);
        let mut session = tracker
            .start_session(LearnerId::new(1), &descriptor(1200.0))
            .await
            .unwrap()
            .session;

        let outcome = tracker.stop_session(&mut session).await.unwrap();
        assert!(!outcome.checkpointed);
        assert!(
            repo.get(LearnerId::new(1), LessonId::new(100))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn stopped_session_rejects_samples() {
        let repo = InMemoryRepository::new();
        let tracker = build_tracker(&repo);
        let mut session = tracker
            .start_session(LearnerId::new(1), &descriptor(1200.0))
            .await
            .unwrap()
            .session;

        tracker.stop_session(&mut session).await.unwrap();
        let err = tracker.record_sample(&mut session, 2.0).await.unwrap_err();
        assert!(matches!(err, TrackingError::SessionStopped));
    }

    #[tokio::test]
    async fn resume_cue_requires_meaningful_position() {
        let repo = InMemoryRepository::new();
        let tracker = build_tracker(&repo);

        // establish a persisted record at 400s
        let mut session = tracker
            .start_session(LearnerId::new(1), &descriptor(1200.0))
            .await
            .unwrap()
            .session;
        let mut cursor = 398.0;
        session.note_seek(cursor, fixed_now());
        while cursor <= 404.0 {
            tracker.record_sample(&mut session, cursor).await.unwrap();
            cursor += 2.0;
        }
        tracker.stop_session(&mut session).await.unwrap();

        let resumed = tracker
            .start_session(LearnerId::new(1), &descriptor(1200.0))
            .await
            .unwrap();
        assert_eq!(resumed.resume_position_secs, Some(404.0));

        // watch time carried forward from the persisted record
        assert!((resumed.session.time_spent_secs() - 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn completed_lesson_gets_no_resume_cue() {
        let repo = InMemoryRepository::new();
        let tracker = build_tracker(&repo);
        let mut session = tracker
            .start_session(LearnerId::new(1), &descriptor(1200.0))
            .await
            .unwrap()
            .session;

        session.note_seek(1150.0, fixed_now());
        tracker.record_sample(&mut session, 1150.0).await.unwrap();
        tracker.stop_session(&mut session).await.unwrap();

        let resumed = tracker
            .start_session(LearnerId::new(1), &descriptor(1200.0))
            .await
            .unwrap();
        assert_eq!(resumed.session.status(), ProgressStatus::Completed);
        assert_eq!(resumed.resume_position_secs, None);
    }

    // ── failure containment ──────────────────────────────────────────────────

    /// Lesson repository that can be switched into a failing mode.
    #[derive(Clone)]
    struct FlakyLessonRepo {
        inner: InMemoryRepository,
        failing: Arc<AtomicBool>,
    }

    #[async_trait]
    impl LessonProgressRepository for FlakyLessonRepo {
        async fn get(
            &self,
            learner_id: LearnerId,
            lesson_id: LessonId,
        ) -> Result<Option<progress_core::model::LessonProgress>, StorageError> {
            self.inner.get(learner_id, lesson_id).await
        }

        async fn upsert_snapshot(
            &self,
            snapshot: &progress_core::model::LessonProgress,
        ) -> Result<UpsertDisposition, StorageError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("store unavailable".into()));
            }
            self.inner.upsert_snapshot(snapshot).await
        }

        async fn list_for_course(
            &self,
            learner_id: LearnerId,
            course_id: CourseId,
        ) -> Result<Vec<progress_core::model::LessonProgress>, StorageError> {
            self.inner.list_for_course(learner_id, course_id).await
        }

        async fn list_for_learner(
            &self,
            learner_id: LearnerId,
        ) -> Result<Vec<progress_core::model::LessonProgress>, StorageError> {
            self.inner.list_for_learner(learner_id).await
        }
    }

    #[tokio::test]
    async fn failed_checkpoint_retries_with_full_accumulation() {
        let inner = InMemoryRepository::new();
        let failing = Arc::new(AtomicBool::new(true));
        let flaky = FlakyLessonRepo {
            inner: inner.clone(),
            failing: Arc::clone(&failing),
        };
        let tracker = ProgressTrackerService::new(
            fixed_clock(),
            Arc::new(flaky),
            Arc::new(inner.clone()),
        );

        let mut session = tracker
            .start_session(LearnerId::new(1), &descriptor(1200.0))
            .await
            .unwrap()
            .session;

        tracker.record_sample(&mut session, 0.0).await.unwrap();
        tracker.record_sample(&mut session, 4.0).await.unwrap();

        // store down: flush fails but accumulation survives
        let outcome = tracker
            .flush(&mut session, LifecycleEvent::Pause)
            .await
            .unwrap();
        assert!(!outcome.checkpointed);
        assert!((session.unsaved_secs() - 4.0).abs() < 1e-9);

        // store back up: next flush carries the full amount
        failing.store(false, Ordering::SeqCst);
        tracker.record_sample(&mut session, 6.0).await.unwrap();
        tracker.record_sample(&mut session, 8.0).await.unwrap();
        let outcome = tracker
            .flush(&mut session, LifecycleEvent::Pause)
            .await
            .unwrap();
        assert!(outcome.checkpointed);
        assert_eq!(session.unsaved_secs(), 0.0);

        let stored = inner
            .get(LearnerId::new(1), LessonId::new(100))
            .await
            .unwrap()
            .unwrap();
        assert!((stored.time_spent_secs() - 6.0).abs() < 1e-9);
    }
}
