#![forbid(unsafe_code)]

//! Orchestration layer for learner progress tracking: playback sessions, the
//! checkpoint scheduler, bookmark operations, and dashboard aggregation
//! queries.

pub mod analytics_service;
pub mod app_services;
pub mod bookmark_service;
pub mod error;
pub mod playback;

pub use progress_core::Clock;

pub use analytics_service::{AnalyticsService, CourseOutline};
pub use app_services::AppServices;
pub use bookmark_service::BookmarkService;
pub use error::{AnalyticsError, BookmarkServiceError, TrackingError};
pub use playback::{
    CompletionEvent, FlushOutcome, LessonDescriptor, LifecycleEvent, PlaybackSession,
    ProgressTrackerService, SampleOutcome, SessionProgress, StartedSession,
};
