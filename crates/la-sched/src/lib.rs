/// Frame scheduling for lumascii.
///
/// Drives the conversion engine once per still image or once per displayed
/// video frame, never more than one conversion in flight per source.

pub mod error;
pub mod renderer;
pub mod scheduler;

pub use error::SchedulerError;
pub use renderer::Renderer;
pub use scheduler::{
    FrameTicket, Next, Scheduler, SchedulerStats, SourceId, SourceKind, State, Step,
};
