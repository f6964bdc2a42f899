//! Playback session handling: the in-memory session object, the checkpoint
//! scheduler, and the UI-facing progress view.

mod progress;
mod session;
mod tracker;

pub use progress::SessionProgress;
pub use session::{LifecycleEvent, PlaybackSession};
pub use tracker::{
    CompletionEvent, FlushOutcome, LessonDescriptor, ProgressTrackerService, SampleOutcome,
    StartedSession,
};
