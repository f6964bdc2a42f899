//! Shared error types for the services crate.

use thiserror::Error;

use progress_core::model::{BookmarkError, LessonProgressError, SettingsError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressTrackerService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrackingError {
    #[error("playback session has already been stopped")]
    SessionStopped,
    #[error(transparent)]
    Lesson(#[from] LessonProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `BookmarkService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BookmarkServiceError {
    #[error("no progress record exists for this lesson yet")]
    LessonNotStarted,
    #[error(transparent)]
    Bookmark(#[from] BookmarkError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AnalyticsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalyticsError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
