use std::sync::Arc;

use progress_core::Clock;
use progress_core::model::TrackerSettings;
use storage::repository::Storage;

use crate::analytics_service::AnalyticsService;
use crate::bookmark_service::BookmarkService;
use crate::error::AppServicesError;
use crate::playback::ProgressTrackerService;

/// Assembles the app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    tracker: Arc<ProgressTrackerService>,
    bookmarks: Arc<BookmarkService>,
    analytics: Arc<AnalyticsService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: TrackerSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, settings))
    }

    /// Build services over in-memory storage (tests, prototyping).
    #[must_use]
    pub fn in_memory(clock: Clock, settings: TrackerSettings) -> Self {
        let storage = Storage::in_memory();
        Self::from_storage(&storage, clock, settings)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, settings: TrackerSettings) -> Self {
        let tracker = Arc::new(
            ProgressTrackerService::new(
                clock,
                Arc::clone(&storage.lessons),
                Arc::clone(&storage.checkpoints),
            )
            .with_settings(settings),
        );
        let bookmarks = Arc::new(BookmarkService::new(
            clock,
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.bookmarks),
        ));
        let analytics = Arc::new(AnalyticsService::new(
            clock,
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.checkpoints),
        ));

        Self {
            tracker,
            bookmarks,
            analytics,
        }
    }

    #[must_use]
    pub fn tracker(&self) -> Arc<ProgressTrackerService> {
        Arc::clone(&self.tracker)
    }

    #[must_use]
    pub fn bookmarks(&self) -> Arc<BookmarkService> {
        Arc::clone(&self.bookmarks)
    }

    #[must_use]
    pub fn analytics(&self) -> Arc<AnalyticsService> {
        Arc::clone(&self.analytics)
    }
}
