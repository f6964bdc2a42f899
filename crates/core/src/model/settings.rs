use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("seek threshold must be > 0 seconds")]
    InvalidSeekThreshold,

    #[error("checkpoint interval must be > 0 seconds")]
    InvalidCheckpointInterval,

    #[error("completion threshold must be between 1 and 100 percent")]
    InvalidCompletionThreshold,

    #[error("resume threshold must be >= 0 seconds")]
    InvalidResumeThreshold,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Policy knobs for the tracking pipeline.
///
/// Controls the sample filter, checkpoint cadence, completion rule, and
/// auto-resume behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    seek_threshold_secs: f64,
    checkpoint_interval_secs: f64,
    completion_threshold_percent: u8,
    auto_resume: bool,
    resume_threshold_secs: f64,
}

impl TrackerSettings {
    /// Creates the default tracking policy:
    /// - 5 s seek threshold (matches the player polling cadence)
    /// - 30 s between time-based checkpoints
    /// - completion at 90% of content reached
    /// - auto-resume enabled, but not for the first 30 s of a lesson
    #[must_use]
    pub fn default_policy() -> Self {
        Self {
            seek_threshold_secs: crate::playback::SEEK_THRESHOLD_SECS,
            checkpoint_interval_secs: 30.0,
            completion_threshold_percent: 90,
            auto_resume: true,
            resume_threshold_secs: 30.0,
        }
    }

    /// Creates custom tracker settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any threshold is out of range.
    pub fn new(
        seek_threshold_secs: f64,
        checkpoint_interval_secs: f64,
        completion_threshold_percent: u8,
        auto_resume: bool,
        resume_threshold_secs: f64,
    ) -> Result<Self, SettingsError> {
        if !seek_threshold_secs.is_finite() || seek_threshold_secs <= 0.0 {
            return Err(SettingsError::InvalidSeekThreshold);
        }
        if !checkpoint_interval_secs.is_finite() || checkpoint_interval_secs <= 0.0 {
            return Err(SettingsError::InvalidCheckpointInterval);
        }
        if completion_threshold_percent == 0 || completion_threshold_percent > 100 {
            return Err(SettingsError::InvalidCompletionThreshold);
        }
        if !resume_threshold_secs.is_finite() || resume_threshold_secs < 0.0 {
            return Err(SettingsError::InvalidResumeThreshold);
        }

        Ok(Self {
            seek_threshold_secs,
            checkpoint_interval_secs,
            completion_threshold_percent,
            auto_resume,
            resume_threshold_secs,
        })
    }

    #[must_use]
    pub fn seek_threshold_secs(&self) -> f64 {
        self.seek_threshold_secs
    }

    /// Unsaved watch time that triggers a time-based checkpoint.
    #[must_use]
    pub fn checkpoint_interval_secs(&self) -> f64 {
        self.checkpoint_interval_secs
    }

    /// Percent of content reached that completes a lesson.
    #[must_use]
    pub fn completion_threshold_percent(&self) -> u8 {
        self.completion_threshold_percent
    }

    #[must_use]
    pub fn auto_resume(&self) -> bool {
        self.auto_resume
    }

    /// Below this saved position, resume restarts from the beginning instead
    /// of bouncing the player for a few seconds of progress.
    #[must_use]
    pub fn resume_threshold_secs(&self) -> f64 {
        self.resume_threshold_secs
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self::default_policy()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
