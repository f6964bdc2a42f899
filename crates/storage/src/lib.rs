#![forbid(unsafe_code)]

//! Storage adapters for the progress tracking engine: repository traits, an
//! in-memory backend for tests, and the `SQLite` backend used in production.

pub mod repository;
pub mod sqlite;

pub use repository::{
    BookmarkRepository, CheckpointLogRepository, InMemoryRepository, LessonProgressRepository,
    Storage, StorageError, UpsertDisposition,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
