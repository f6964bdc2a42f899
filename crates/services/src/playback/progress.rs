use progress_core::model::ProgressStatus;

/// Aggregated view of a playback session's progress, useful for UI.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionProgress {
    pub status: ProgressStatus,
    pub percent_watched: u8,
    pub time_spent_secs: f64,
    pub last_position_secs: f64,
    pub is_complete: bool,
}
