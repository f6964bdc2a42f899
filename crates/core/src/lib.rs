#![forbid(unsafe_code)]

//! Domain core for learner progress tracking: playback sample filtering,
//! watch-time accumulation, the lesson status state machine, bookmarks, and
//! the pure course/learner aggregation math.

pub mod error;
pub mod model;
pub mod playback;
pub mod time;

pub use error::Error;
pub use time::Clock;
