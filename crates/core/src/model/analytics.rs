use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::course::{CourseProgress, ratio_percent};
use crate::model::ids::LearnerId;

/// Seconds of watch time required for the `TenHoursWatched` badge.
const TEN_HOURS_SECS: f64 = 36_000.0;

/// Consecutive days required for the `WeekStreak` badge.
const WEEK_STREAK_DAYS: u32 = 7;

//
// ─── STREAK ───────────────────────────────────────────────────────────────────
//

/// Counts consecutive calendar days with qualifying activity, anchored at
/// `today` or yesterday.
///
/// A streak survives until a full day passes with no qualifying checkpoint:
/// activity yesterday but not yet today still counts, while the first missed
/// day breaks it to 0.
#[must_use]
pub fn current_streak(activity_days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let anchor = if activity_days.contains(&today) {
        today
    } else if let Some(yesterday) = today.checked_sub_days(Days::new(1)) {
        if activity_days.contains(&yesterday) {
            yesterday
        } else {
            return 0;
        }
    } else {
        return 0;
    };

    let mut streak = 0;
    let mut day = anchor;
    while activity_days.contains(&day) {
        streak += 1;
        match day.checked_sub_days(Days::new(1)) {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

//
// ─── ACHIEVEMENTS ─────────────────────────────────────────────────────────────
//

/// Threshold-crossing badges derived from the learner aggregate.
///
/// These are facts, not stored state: re-evaluating against current data
/// always yields the same set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstLessonCompleted,
    FirstCourseCompleted,
    WeekStreak,
    TenHoursWatched,
}

impl Achievement {
    /// Human-readable badge title.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Achievement::FirstLessonCompleted => "First Lesson Completed",
            Achievement::FirstCourseCompleted => "First Course Completed",
            Achievement::WeekStreak => "7-Day Streak",
            Achievement::TenHoursWatched => "10 Hours Watched",
        }
    }
}

//
// ─── LEARNER ANALYTICS ────────────────────────────────────────────────────────
//

/// Derived cross-course statistics for one learner, consumed by dashboards.
///
/// A pure function of the learner's course roll-ups plus their activity-day
/// history; recomputing on unchanged data is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressAnalytics {
    learner_id: LearnerId,
    total_courses: u32,
    completed_courses: u32,
    total_lessons: u32,
    completed_lessons: u32,
    total_assignments: u32,
    submitted_assignments: u32,
    total_time_spent_secs: f64,
    completion_rate: u8,
    current_streak: u32,
    achievements: Vec<Achievement>,
}

impl ProgressAnalytics {
    /// Rolls all course aggregates for a learner into dashboard statistics.
    ///
    /// An empty course set yields zeroed aggregates, never a division error.
    #[must_use]
    pub fn from_courses(
        learner_id: LearnerId,
        courses: &[CourseProgress],
        current_streak: u32,
    ) -> Self {
        let total_courses = u32::try_from(courses.len()).unwrap_or(u32::MAX);
        let completed_courses = courses.iter().filter(|c| c.is_completed()).count();
        let completed_courses = u32::try_from(completed_courses).unwrap_or(u32::MAX);
        let total_lessons = courses.iter().map(CourseProgress::total_lessons).sum();
        let completed_lessons = courses.iter().map(CourseProgress::completed_lessons).sum();
        let total_assignments = courses.iter().map(CourseProgress::total_assignments).sum();
        let submitted_assignments = courses
            .iter()
            .map(CourseProgress::submitted_assignments)
            .sum();
        let total_time_spent_secs = courses
            .iter()
            .map(CourseProgress::total_time_spent_secs)
            .sum();

        let mut analytics = Self {
            learner_id,
            total_courses,
            completed_courses,
            total_lessons,
            completed_lessons,
            total_assignments,
            submitted_assignments,
            total_time_spent_secs,
            completion_rate: ratio_percent(completed_lessons, total_lessons),
            current_streak,
            achievements: Vec::new(),
        };
        analytics.achievements = analytics.earned_achievements();
        analytics
    }

    fn earned_achievements(&self) -> Vec<Achievement> {
        let mut earned = Vec::new();
        if self.completed_lessons >= 1 {
            earned.push(Achievement::FirstLessonCompleted);
        }
        if self.completed_courses >= 1 {
            earned.push(Achievement::FirstCourseCompleted);
        }
        if self.current_streak >= WEEK_STREAK_DAYS {
            earned.push(Achievement::WeekStreak);
        }
        if self.total_time_spent_secs >= TEN_HOURS_SECS {
            earned.push(Achievement::TenHoursWatched);
        }
        earned
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn total_courses(&self) -> u32 {
        self.total_courses
    }

    #[must_use]
    pub fn completed_courses(&self) -> u32 {
        self.completed_courses
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
    pub fn total_time_spent_secs(&self) -> f64 {
        self.total_time_spent_secs
    }

    /// Completed lessons over total lessons, as a rounded percentage.
    #[must_use]
    pub fn completion_rate(&self) -> u8 {
        self.completion_rate
    }

    #[must_use]
    pub fn current_streak(&self) -> u32 {
        self.current_streak
    }

    #[must_use]
    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::course::AssignmentCounts;
    use crate::model::ids::{CourseId, LessonId};
    use crate::model::lesson::LessonProgress;
    use crate::time::fixed_now;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn days(dates: &[&str]) -> BTreeSet<NaiveDate> {
        dates.iter().map(|d| date(d)).collect()
    }

    fn completed_lesson(course: u64, id: u64) -> LessonProgress {
        let mut lesson = LessonProgress::new(
            LearnerId::new(1),
            CourseId::new(course),
            LessonId::new(id),
            format!("Lesson {id}"),
            1,
            100.0,
            fixed_now(),
        )
        .unwrap();
        lesson.record_playback(95.0, 95.0, 95.0, fixed_now());
        lesson.try_complete(90, fixed_now());
        lesson
    }

    fn build_course(course: u64, total: u32, completed: u32) -> CourseProgress {
        let lessons: Vec<_> = (1..=u64::from(completed))
            .map(|id| completed_lesson(course, id))
            .collect();
        CourseProgress::from_lessons(
            LearnerId::new(1),
            CourseId::new(course),
            total,
            &lessons,
            AssignmentCounts::new(3, 2),
        )
    }

    #[test]
    fn streak_counts_back_from_today() {
        let days = days(&["2024-03-01", "2024-02-29", "2024-02-28"]);
        assert_eq!(current_streak(&days, date("2024-03-01")), 3);
    }

    #[test]
    fn streak_anchored_on_yesterday_still_counts() {
        let days = days(&["2024-02-29", "2024-02-28"]);
        assert_eq!(current_streak(&days, date("2024-03-01")), 2);
    }

    #[test]
    fn streak_breaks_after_a_missed_day() {
        let days = days(&["2024-02-27", "2024-02-26"]);
        assert_eq!(current_streak(&days, date("2024-03-01")), 0);
    }

    #[test]
    fn streak_ignores_disconnected_older_days() {
        let days = days(&["2024-03-01", "2024-02-28", "2024-02-27"]);
        assert_eq!(current_streak(&days, date("2024-03-01")), 1);
    }

    #[test]
    fn streak_on_empty_history_is_zero() {
        assert_eq!(current_streak(&BTreeSet::new(), date("2024-03-01")), 0);
    }

    #[test]
    fn empty_course_set_yields_zeroed_aggregates() {
        let analytics = ProgressAnalytics::from_courses(LearnerId::new(1), &[], 0);
        assert_eq!(analytics.total_courses(), 0);
        assert_eq!(analytics.completion_rate(), 0);
        assert_eq!(analytics.total_time_spent_secs(), 0.0);
        assert!(analytics.achievements().is_empty());
    }

    #[test]
    fn sums_across_courses() {
        let courses = vec![build_course(1, 4, 2), build_course(2, 2, 2)];
        let analytics = ProgressAnalytics::from_courses(LearnerId::new(1), &courses, 3);

        assert_eq!(analytics.total_courses(), 2);
        assert_eq!(analytics.completed_courses(), 1);
        assert_eq!(analytics.total_lessons(), 6);
        assert_eq!(analytics.completed_lessons(), 4);
        assert_eq!(analytics.total_assignments(), 6);
        assert_eq!(analytics.submitted_assignments(), 4);
        assert_eq!(analytics.completion_rate(), 67);
        assert_eq!(analytics.current_streak(), 3);
    }

    #[test]
    fn recomputation_is_deterministic() {
        let courses = vec![build_course(1, 4, 2)];
        let first = ProgressAnalytics::from_courses(LearnerId::new(1), &courses, 2);
        let second = ProgressAnalytics::from_courses(LearnerId::new(1), &courses, 2);
        assert_eq!(first, second);
    }

    #[test]
    fn achievements_track_thresholds() {
        let courses = vec![build_course(1, 2, 2)];
        let analytics = ProgressAnalytics::from_courses(LearnerId::new(1), &courses, 7);

        assert!(analytics.achievements().contains(&Achievement::FirstLessonCompleted));
        assert!(analytics.achievements().contains(&Achievement::FirstCourseCompleted));
        assert!(analytics.achievements().contains(&Achievement::WeekStreak));
        assert!(!analytics.achievements().contains(&Achievement::TenHoursWatched));
    }
}
