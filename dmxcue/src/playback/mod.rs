//! Timeline playback engine.
//!
//! - [`PlaybackScheduler`] tracks live processes and routes play/stop requests.
//! - [`PlaybackExecutor`] walks one timeline's frames against a device.
//! - [`FadeCoordinator`] runs the per-channel ramps of a fade frame.
//!
//! Cancellation flows down a token tree: the scheduler's root token, one child
//! per process and one grandchild per fade frame.

mod error;
pub mod executor;
pub mod fade;
mod messages;
pub mod registry;
pub mod scheduler;

pub use error::{PlaybackError, SchedulerError};
pub use executor::PlaybackExecutor;
pub use fade::{ChannelState, FadeCoordinator, FrameOutcome, SharedConnection};
pub use messages::{
    PlayRequest, PlaybackCommand, PlaybackOutcome, ProcessId, ProcessReport, ProcessState,
    StopAllRequest, StopRequest,
};
pub use registry::ProcessRegistry;
pub use scheduler::{PlaybackConfig, PlaybackScheduler, SchedulerHandle};
