use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, LearnerId, LessonId};

/// Record of a single persisted progress checkpoint.
///
/// One is appended per successful checkpoint write, carrying the watch-time
/// delta it flushed. The log feeds streak computation and activity history;
/// a record qualifies for a streak day when it flushed actual watch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub learner_id: LearnerId,
    pub course_id: CourseId,
    pub lesson_id: LessonId,
    pub time_delta_secs: f64,
    pub recorded_at: DateTime<Utc>,
}

impl CheckpointRecord {
    #[must_use]
    pub fn new(
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
        time_delta_secs: f64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id,
            course_id,
            lesson_id,
            time_delta_secs,
            recorded_at,
        }
    }

    /// Whether this checkpoint counts toward the learner's daily streak.
    #[must_use]
    pub fn qualifies_for_streak(&self) -> bool {
        self.time_delta_secs > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn checkpoint_with_watch_time_qualifies() {
        let record = CheckpointRecord::new(
            LearnerId::new(1),
            CourseId::new(2),
            LessonId::new(3),
            30.0,
            fixed_now(),
        );
        assert!(record.qualifies_for_streak());
    }

    #[test]
    fn checkpoint_without_watch_time_does_not_qualify() {
        let record = CheckpointRecord::new(
            LearnerId::new(1),
            CourseId::new(2),
            LessonId::new(3),
            0.0,
            fixed_now(),
        );
        assert!(!record.qualifies_for_streak());
    }
}
