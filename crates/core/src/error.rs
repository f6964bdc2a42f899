use thiserror::Error;

use crate::model::{BookmarkError, LessonProgressError, SettingsError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    LessonProgress(#[from] LessonProgressError),
    #[error(transparent)]
    Bookmark(#[from] BookmarkError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
