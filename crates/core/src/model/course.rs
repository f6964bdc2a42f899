use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, LearnerId};
use crate::model::lesson::{LessonProgress, ProgressStatus};

/// Assignment submission tallies for a course, supplied by the assignment
/// subsystem. Grading lives outside this engine; only the counts flow through
/// into the aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentCounts {
    pub total: u32,
    pub submitted: u32,
}

impl AssignmentCounts {
    #[must_use]
    pub fn new(total: u32, submitted: u32) -> Self {
        Self { total, submitted }
    }
}

/// Derived per-learner, per-course progress roll-up.
///
/// A view over the course's `LessonProgress` records with no independent write
/// path: any apparent update must mutate the underlying lessons and re-derive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProgress {
    learner_id: LearnerId,
    course_id: CourseId,
    enrollment_date: Option<DateTime<Utc>>,
    total_lessons: u32,
    completed_lessons: u32,
    total_assignments: u32,
    submitted_assignments: u32,
    completion_percentage: u8,
    total_time_spent_secs: f64,
}

impl CourseProgress {
    /// Computes the course roll-up from its lesson records.
    ///
    /// `total_lessons` comes from the curriculum (a learner may not have
    /// records for untouched lessons yet). A course with zero lessons reports
    /// 0% complete rather than dividing by zero.
    #[must_use]
    pub fn from_lessons(
        learner_id: LearnerId,
        course_id: CourseId,
        total_lessons: u32,
        lessons: &[LessonProgress],
        assignments: AssignmentCounts,
    ) -> Self {
        let completed_lessons = lessons
            .iter()
            .filter(|l| l.status() == ProgressStatus::Completed)
            .count();
        let completed_lessons = u32::try_from(completed_lessons).unwrap_or(u32::MAX);
        let total_time_spent_secs = lessons.iter().map(LessonProgress::time_spent_secs).sum();
        let enrollment_date = lessons.iter().map(LessonProgress::started_at).min();

        Self {
            learner_id,
            course_id,
            enrollment_date,
            total_lessons,
            completed_lessons: completed_lessons.min(total_lessons),
            total_assignments: assignments.total,
            submitted_assignments: assignments.submitted.min(assignments.total),
            completion_percentage: ratio_percent(completed_lessons, total_lessons),
            total_time_spent_secs,
        }
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    /// Earliest lesson activity for this course, standing in for the
    /// enrollment date (enrollment CRUD is external).
    #[must_use]
    pub fn enrollment_date(&self) -> Option<DateTime<Utc>> {
        self.enrollment_date
    }

    #[must_use]
    pub fn total_lessons(&self) -> u32 {
        self.total_lessons
    }

    #[must_use]
    pub fn completed_lessons(&self) -> u32 {
        self.completed_lessons
    }

    #[must_use]
    pub fn total_assignments(&self) -> u32 {
        self.total_assignments
    }

    #[must_use]
    pub fn submitted_assignments(&self) -> u32 {
        self.submitted_assignments
    }

    #[must_use]
    pub fn completion_percentage(&self) -> u8 {
        self.completion_percentage
    }

    #[must_use]
    pub fn total_time_spent_secs(&self) -> f64 {
        self.total_time_spent_secs
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.total_lessons > 0 && self.completed_lessons == self.total_lessons
    }
}

/// `round(numerator / denominator * 100)`, 0 when the denominator is 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn ratio_percent(numerator: u32, denominator: u32) -> u8 {
    if denominator == 0 {
        return 0;
    }
    let ratio = f64::from(numerator.min(denominator)) / f64::from(denominator);
    (ratio * 100.0).round() as u8
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::LessonId;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn build_lesson(id: u64, watched_secs: f64, complete: bool) -> LessonProgress {
        let mut lesson = LessonProgress::new(
            LearnerId::new(1),
            CourseId::new(10),
            LessonId::new(id),
            format!("Lesson {id}"),
            u32::try_from(id).unwrap(),
            1000.0,
            fixed_now() + Duration::days(i64::try_from(id).unwrap()),
        )
        .unwrap();
        lesson.record_playback(watched_secs, watched_secs, watched_secs, fixed_now());
        if complete {
            lesson.record_playback(950.0, 950.0, 0.0, fixed_now());
            lesson.try_complete(90, fixed_now());
        }
        lesson
    }

    #[test]
    fn zero_lessons_yields_zero_percentage() {
        let progress = CourseProgress::from_lessons(
            LearnerId::new(1),
            CourseId::new(10),
            0,
            &[],
            AssignmentCounts::default(),
        );
        assert_eq!(progress.completion_percentage(), 0);
        assert_eq!(progress.total_time_spent_secs(), 0.0);
        assert_eq!(progress.enrollment_date(), None);
    }

    #[test]
    fn counts_completed_lessons_and_sums_time() {
        let lessons = vec![
            build_lesson(1, 400.0, true),
            build_lesson(2, 300.0, false),
            build_lesson(3, 100.0, true),
        ];
        let progress = CourseProgress::from_lessons(
            LearnerId::new(1),
            CourseId::new(10),
            4,
            &lessons,
            AssignmentCounts::new(2, 1),
        );

        assert_eq!(progress.completed_lessons(), 2);
        assert_eq!(progress.completion_percentage(), 50);
        assert_eq!(progress.total_time_spent_secs(), 800.0);
        assert_eq!(progress.total_assignments(), 2);
        assert_eq!(progress.submitted_assignments(), 1);
        assert!(!progress.is_completed());
    }

    #[test]
    fn enrollment_date_is_earliest_lesson_start() {
        let lessons = vec![build_lesson(3, 10.0, false), build_lesson(1, 10.0, false)];
        let progress = CourseProgress::from_lessons(
            LearnerId::new(1),
            CourseId::new(10),
            3,
            &lessons,
            AssignmentCounts::default(),
        );
        assert_eq!(
            progress.enrollment_date(),
            Some(fixed_now() + Duration::days(1))
        );
    }

    #[test]
    fn fully_completed_course_reports_100() {
        let lessons = vec![build_lesson(1, 900.0, true), build_lesson(2, 900.0, true)];
        let progress = CourseProgress::from_lessons(
            LearnerId::new(1),
            CourseId::new(10),
            2,
            &lessons,
            AssignmentCounts::default(),
        );
        assert_eq!(progress.completion_percentage(), 100);
        assert!(progress.is_completed());
    }

    #[test]
    fn ratio_percent_rounds() {
        assert_eq!(ratio_percent(1, 3), 33);
        assert_eq!(ratio_percent(2, 3), 67);
        assert_eq!(ratio_percent(0, 0), 0);
    }
}
