mod analytics;
mod bookmark;
mod checkpoint;
mod course;
mod ids;
mod lesson;
mod settings;

pub use analytics::{Achievement, ProgressAnalytics, current_streak};
pub use bookmark::{Bookmark, BookmarkError};
pub use checkpoint::CheckpointRecord;
pub use course::{AssignmentCounts, CourseProgress};
pub use ids::{BookmarkId, CourseId, LearnerId, LessonId, ParseIdError};
pub use lesson::{CompletionOutcome, LessonProgress, LessonProgressError, ProgressStatus};
pub use settings::{SettingsError, TrackerSettings};
