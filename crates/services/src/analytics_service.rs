use chrono::Duration;
use std::sync::Arc;

use progress_core::Clock;
use progress_core::model::{
    AssignmentCounts, CourseId, CourseProgress, LearnerId, ProgressAnalytics, current_streak,
};
use storage::repository::{CheckpointLogRepository, LessonProgressRepository};

use crate::error::AnalyticsError;

/// How far back the checkpoint log is scanned when computing streaks.
const STREAK_LOOKBACK_DAYS: i64 = 366;

/// Curriculum-side description of a course, supplied by the caller.
///
/// Lesson records only exist for touched lessons, so the authoritative lesson
/// count (and the assignment tallies) come from outside this engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOutline {
    pub course_id: CourseId,
    pub total_lessons: u32,
    pub assignments: AssignmentCounts,
}

impl CourseOutline {
    #[must_use]
    pub fn new(course_id: CourseId, total_lessons: u32) -> Self {
        Self {
            course_id,
            total_lessons,
            assignments: AssignmentCounts::default(),
        }
    }

    #[must_use]
    pub fn with_assignments(mut self, assignments: AssignmentCounts) -> Self {
        self.assignments = assignments;
        self
    }
}

/// Read-side aggregation queries for dashboards.
///
/// Course and learner aggregates are views recomputed on read from the
/// underlying lesson records; nothing here has an independent write path.
#[derive(Clone)]
pub struct AnalyticsService {
    clock: Clock,
    lessons: Arc<dyn LessonProgressRepository>,
    checkpoints: Arc<dyn CheckpointLogRepository>,
}

impl AnalyticsService {
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
        }
    }

    /// Course-level roll-up for one learner.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn course_progress(
        &self,
        learner_id: LearnerId,
        outline: &CourseOutline,
    ) -> Result<CourseProgress, AnalyticsError> {
        let lessons = self
            .lessons
            .list_for_course(learner_id, outline.course_id)
            .await?;
        Ok(CourseProgress::from_lessons(
            learner_id,
            outline.course_id,
            outline.total_lessons,
            &lessons,
            outline.assignments,
        ))
    }

    /// Cross-course statistics for one learner's dashboard.
    ///
    /// The outlines enumerate the learner's enrolled courses (enrollment CRUD
    /// is external); the streak scans the checkpoint activity log.
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` on repository failures.
    pub async fn learner_analytics(
        &self,
        learner_id: LearnerId,
        outlines: &[CourseOutline],
    ) -> Result<ProgressAnalytics, AnalyticsError> {
        let mut courses = Vec::with_capacity(outlines.len());
        for outline in outlines {
            courses.push(self.course_progress(learner_id, outline).await?);
        }

        let since = self.clock.now() - Duration::days(STREAK_LOOKBACK_DAYS);
        let activity_days = self.checkpoints.list_activity_days(learner_id, since).await?;
        let streak = current_streak(&activity_days, self.clock.today());

        Ok(ProgressAnalytics::from_courses(learner_id, &courses, streak))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use progress_core::model::{CheckpointRecord, LessonId, LessonProgress};
    use progress_core::time::{fixed_clock, fixed_now};
    use storage::repository::{
        CheckpointLogRepository, InMemoryRepository, LessonProgressRepository,
    };

    async fn seed_lesson(repo: &InMemoryRepository, course: u64, lesson: u64, complete: bool) {
        let mut record = LessonProgress::new(
            LearnerId::new(1),
            CourseId::new(course),
            LessonId::new(lesson),
            format!("Lesson {lesson}"),
            u32::try_from(lesson).unwrap(),
            1000.0,
            fixed_now(),
        )
        .unwrap();
        let watched = if complete { 950.0 } else { 300.0 };
        record.record_playback(watched, watched, watched, fixed_now());
        record.try_complete(90, fixed_now());
        repo.upsert_snapshot(&record).await.unwrap();
    }

    fn build_service(repo: &InMemoryRepository) -> AnalyticsService {
        AnalyticsService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn course_progress_counts_completions() {
        let repo = InMemoryRepository::new();
        seed_lesson(&repo, 10, 1, true).await;
        seed_lesson(&repo, 10, 2, false).await;
        let service = build_service(&repo);

        let outline = CourseOutline::new(CourseId::new(10), 4);
        let progress = service
            .course_progress(LearnerId::new(1), &outline)
            .await
            .unwrap();

        assert_eq!(progress.completed_lessons(), 1);
        assert_eq!(progress.completion_percentage(), 25);
        assert_eq!(progress.total_time_spent_secs(), 1250.0);
    }

    #[tokio::test]
    async fn empty_course_reports_zero() {
        let repo = InMemoryRepository::new();
        let service = build_service(&repo);

        let outline = CourseOutline::new(CourseId::new(10), 0);
        let progress = service
            .course_progress(LearnerId::new(1), &outline)
            .await
            .unwrap();
        assert_eq!(progress.completion_percentage(), 0);
    }

    #[tokio::test]
    async fn learner_analytics_combines_courses_and_streak() {
        let repo = InMemoryRepository::new();
        seed_lesson(&repo, 10, 1, true).await;
        seed_lesson(&repo, 20, 2, true).await;

        // qualifying checkpoints today and yesterday
        for days_ago in [0, 1] {
            repo.append_checkpoint(&CheckpointRecord::new(
                LearnerId::new(1),
                CourseId::new(10),
                LessonId::new(1),
                30.0,
                fixed_now() - Duration::days(days_ago),
            ))
            .await
            .unwrap();
        }

        let service = build_service(&repo);
        let outlines = vec![
            CourseOutline::new(CourseId::new(10), 1),
            CourseOutline::new(CourseId::new(20), 2),
        ];
        let analytics = service
            .learner_analytics(LearnerId::new(1), &outlines)
            .await
            .unwrap();

        assert_eq!(analytics.total_courses(), 2);
        assert_eq!(analytics.completed_courses(), 1);
        assert_eq!(analytics.total_lessons(), 3);
        assert_eq!(analytics.completed_lessons(), 2);
        assert_eq!(analytics.completion_rate(), 67);
        assert_eq!(analytics.current_streak(), 2);
    }

    #[tokio::test]
    async fn analytics_recomputation_is_deterministic() {
        let repo = InMemoryRepository::new();
        seed_lesson(&repo, 10, 1, true).await;
        let service = build_service(&repo);

        let outlines = vec![CourseOutline::new(CourseId::new(10), 2)];
        let first = service
            .learner_analytics(LearnerId::new(1), &outlines)
            .await
            .unwrap();
        let second = service
            .learner_analytics(LearnerId::new(1), &outlines)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn no_courses_yields_zeroed_analytics() {
        let repo = InMemoryRepository::new();
        let service = build_service(&repo);

        let analytics = service
            .learner_analytics(LearnerId::new(1), &[])
            .await
            .unwrap();
        assert_eq!(analytics.total_courses(), 0);
        assert_eq!(analytics.completion_rate(), 0);
        assert_eq!(analytics.current_streak(), 0);
    }
}
