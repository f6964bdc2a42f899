use progress_core::model::{
    Bookmark, BookmarkId, CourseId, LearnerId, LessonId, LessonProgress, ProgressStatus,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    Ok(LearnerId::new(i64_to_u64("learner_id", v)?))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn parse_status(s: &str) -> Result<ProgressStatus, StorageError> {
    match s {
        "not_started" => Ok(ProgressStatus::NotStarted),
        "in_progress" => Ok(ProgressStatus::InProgress),
        "completed" => Ok(ProgressStatus::Completed),
        _ => Err(StorageError::Serialization(format!("invalid status: {s}"))),
    }
}

pub(crate) fn map_lesson_row(row: &sqlx::sqlite::SqliteRow) -> Result<LessonProgress, StorageError> {
    let status_str: String = row.try_get("status").map_err(ser)?;
    let status = parse_status(status_str.as_str())?;

    let lesson_order_i64: i64 = row.try_get("lesson_order").map_err(ser)?;
    let lesson_order = u32::try_from(lesson_order_i64).map_err(|_| {
        StorageError::Serialization(format!("invalid lesson_order: {lesson_order_i64}"))
    })?;

    LessonProgress::from_persisted(
        learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?)?,
        row.try_get::<String, _>("lesson_name").map_err(ser)?,
        lesson_order,
        status,
        row.try_get("time_spent_secs").map_err(ser)?,
        row.try_get("last_position_secs").map_err(ser)?,
        row.try_get("observed_max_secs").map_err(ser)?,
        row.try_get("total_duration_secs").map_err(ser)?,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_bookmark_row(row: &sqlx::sqlite::SqliteRow) -> Result<Bookmark, StorageError> {
    let id_str: String = row.try_get("id").map_err(ser)?;
    let id: BookmarkId = id_str.parse().map_err(ser)?;

    Ok(Bookmark::from_persisted(
        id,
        row.try_get("position_secs").map_err(ser)?,
        row.try_get("title").map_err(ser)?,
        row.try_get("note").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    ))
}
