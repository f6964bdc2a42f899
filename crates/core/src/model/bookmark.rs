use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::BookmarkId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Validation failures when creating a bookmark.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum BookmarkError {
    #[error("bookmark title cannot be empty")]
    EmptyTitle,

    #[error("bookmark position {position_secs}s is outside the lesson duration {duration_secs}s")]
    PositionOutOfRange {
        position_secs: f64,
        duration_secs: f64,
    },
}

//
// ─── BOOKMARK ─────────────────────────────────────────────────────────────────
//

/// A labeled, timestamped annotation on a lesson.
///
/// Bookmarks are an unordered set keyed by id; insertion order carries no
/// meaning, so future deletion cannot break anything positional. They are
/// independent of progress state: adding one never touches watch time or
/// completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    id: BookmarkId,
    position_secs: f64,
    title: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl Bookmark {
    /// Creates a validated bookmark.
    ///
    /// # Errors
    ///
    /// Returns `BookmarkError::EmptyTitle` for a blank title, or
    /// `BookmarkError::PositionOutOfRange` when the position falls outside
    /// `[0, duration_secs]`.
    pub fn new(
        id: BookmarkId,
        position_secs: f64,
        title: impl Into<String>,
        note: Option<String>,
        duration_secs: f64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, BookmarkError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(BookmarkError::EmptyTitle);
        }
        if !position_secs.is_finite() || position_secs < 0.0 || position_secs > duration_secs {
            return Err(BookmarkError::PositionOutOfRange {
                position_secs,
                duration_secs,
            });
        }

        Ok(Self {
            id,
            position_secs,
            title,
            note,
            created_at,
        })
    }

    /// Rehydrates a bookmark from storage without re-validating the position.
    ///
    /// The lesson duration may have changed since creation; a stored bookmark
    /// stays addressable either way.
    #[must_use]
    pub fn from_persisted(
        id: BookmarkId,
        position_secs: f64,
        title: String,
        note: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            position_secs,
            title,
            note,
            created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> BookmarkId {
        self.id
    }

    /// Playback position the bookmark points at; the caller seeks the player
    /// here on a jump.
    #[must_use]
    pub fn position_secs(&self) -> f64 {
        self.position_secs
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn empty_title_is_rejected() {
        let err = Bookmark::new(
            BookmarkId::generate(),
            10.0,
            "   ",
            None,
            600.0,
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, BookmarkError::EmptyTitle));
    }

    #[test]
    fn position_past_duration_is_rejected() {
        let err = Bookmark::new(
            BookmarkId::generate(),
            601.0,
            "Key formula",
            None,
            600.0,
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, BookmarkError::PositionOutOfRange { .. }));
    }

    #[test]
    fn negative_position_is_rejected() {
        let err = Bookmark::new(
            BookmarkId::generate(),
            -1.0,
            "Key formula",
            None,
            600.0,
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, BookmarkError::PositionOutOfRange { .. }));
    }

    #[test]
    fn valid_bookmark_keeps_fields() {
        let id = BookmarkId::generate();
        let bookmark = Bookmark::new(
            id,
            42.5,
            "Key formula",
            Some("rewatch before quiz".into()),
            600.0,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(bookmark.id(), id);
        assert_eq!(bookmark.position_secs(), 42.5);
        assert_eq!(bookmark.title(), "Key formula");
        assert_eq!(bookmark.note(), Some("rewatch before quiz"));
        assert_eq!(bookmark.created_at(), fixed_now());
    }

    #[test]
    fn position_at_bounds_is_accepted() {
        assert!(Bookmark::new(BookmarkId::generate(), 0.0, "start", None, 600.0, fixed_now()).is_ok());
        assert!(
            Bookmark::new(BookmarkId::generate(), 600.0, "end", None, 600.0, fixed_now()).is_ok()
        );
    }
}
