//! Playback sample filtering and authentic watch-time accumulation.
//!
//! The player reports its time cursor every couple of seconds while playing.
//! Naively summing cursor deltas would credit a learner who drags the scrubber
//! to the end with the full watch time, so consecutive samples are classified:
//! only small forward deltas (continuous playback at the expected polling
//! cadence) count toward watch time. Seeks and rewinds are ignored, not
//! penalized. The furthest cursor ever reached is tracked separately and feeds
//! the percent-watched figure, which reflects furthest-reached rather than
//! continuous engagement.

/// Largest cursor delta (seconds) still considered continuous playback.
///
/// Matches the expected polling cadence with headroom; anything at or above
/// this is a seek or scrub.
pub const SEEK_THRESHOLD_SECS: f64 = 5.0;

/// Classification of one cursor sample relative to the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleKind {
    /// First sample of a session (or after a seek); establishes continuity only.
    Initial,
    /// Continuous playback; `delta` seconds are credited as watch time.
    Authentic { delta: f64 },
    /// Cursor did not advance (paused tick or rewind); nothing credited.
    Stalled,
    /// Forward jump at or beyond the seek threshold; nothing credited.
    Jump { delta: f64 },
}

impl SampleKind {
    /// Watch-time seconds credited by this sample.
    #[must_use]
    pub fn credited_secs(&self) -> f64 {
        match self {
            SampleKind::Authentic { delta } => *delta,
            _ => 0.0,
        }
    }
}

/// Integrates filtered cursor samples into cumulative authentic watch time.
///
/// `observed_max_secs` is the high-water mark of the cursor and advances on
/// every sample, including discarded jumps: the learner did reach that point,
/// even if not by continuous playback.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchTimer {
    total_watch_secs: f64,
    observed_max_secs: f64,
    total_duration_secs: f64,
    last_cursor: Option<f64>,
}

impl WatchTimer {
    /// Creates a timer for a fresh lesson session.
    #[must_use]
    pub fn new(total_duration_secs: f64) -> Self {
        Self::resume(total_duration_secs, 0.0, 0.0)
    }

    /// Creates a timer carrying forward persisted totals from prior sessions.
    ///
    /// `total_duration_secs` comes from the player each session, so a
    /// re-encoded video yields a recomputed percentage rather than a stale one.
    #[must_use]
    pub fn resume(total_duration_secs: f64, total_watch_secs: f64, observed_max_secs: f64) -> Self {
        Self {
            total_watch_secs: total_watch_secs.max(0.0),
            observed_max_secs: observed_max_secs.max(0.0),
            total_duration_secs,
            last_cursor: None,
        }
    }

    /// Feeds one cursor sample and classifies it against the previous one.
    ///
    /// Authentic deltas accumulate into watch time; the observed maximum
    /// advances unconditionally. Non-finite or negative cursors are ignored.
    pub fn observe(&mut self, cursor_secs: f64) -> SampleKind {
        if !cursor_secs.is_finite() || cursor_secs < 0.0 {
            return SampleKind::Stalled;
        }

        self.observed_max_secs = self.observed_max_secs.max(cursor_secs);

        let Some(prev) = self.last_cursor else {
            self.last_cursor = Some(cursor_secs);
            return SampleKind::Initial;
        };
        self.last_cursor = Some(cursor_secs);

        let delta = cursor_secs - prev;
        if delta <= 0.0 {
            return SampleKind::Stalled;
        }
        if delta >= SEEK_THRESHOLD_SECS {
            return SampleKind::Jump { delta };
        }

        self.total_watch_secs += delta;
        SampleKind::Authentic { delta }
    }

    /// Records a cursor movement that must never earn watch time (an explicit
    /// seek command, or the `ended` event snapping to the duration).
    ///
    /// Continuity resets, so the next `observe` is treated as `Initial`.
    pub fn note_cursor(&mut self, cursor_secs: f64) {
        if cursor_secs.is_finite() && cursor_secs >= 0.0 {
            self.observed_max_secs = self.observed_max_secs.max(cursor_secs);
        }
        self.last_cursor = None;
    }

    /// Drops sample continuity without moving the cursor (pause, tab switch).
    pub fn suspend(&mut self) {
        self.last_cursor = None;
    }

    /// Percentage of content reached, clamped to 0..=100.
    ///
    /// A missing or zero duration yields 0 rather than a division error.
    #[must_use]
    pub fn percent_watched(&self) -> u8 {
        percent_watched(self.observed_max_secs, self.total_duration_secs)
    }

    #[must_use]
    pub fn total_watch_secs(&self) -> f64 {
        self.total_watch_secs
    }

    #[must_use]
    pub fn observed_max_secs(&self) -> f64 {
        self.observed_max_secs
    }

    #[must_use]
    pub fn total_duration_secs(&self) -> f64 {
        self.total_duration_secs
    }
}

/// Shared percent computation: `round(min(1, observed_max / duration) * 100)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percent_watched(observed_max_secs: f64, total_duration_secs: f64) -> u8 {
    if total_duration_secs <= 0.0 || !total_duration_secs.is_finite() {
        return 0;
    }
    let ratio = (observed_max_secs / total_duration_secs).clamp(0.0, 1.0);
    (ratio * 100.0).round() as u8
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
