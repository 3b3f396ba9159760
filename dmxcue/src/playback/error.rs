use thiserror::Error;

use crate::device::DeviceError;

/// Why a playback process failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// No device path on the timeline and no default configured.
    #[error("device configuration error: {0}")]
    Config(String),

    /// Opening or writing to the device failed.
    #[error("device connection error: {0}")]
    Connection(String),
}

impl From<DeviceError> for PlaybackError {
    fn from(err: DeviceError) -> Self {
        Self::Connection(err.to_string())
    }
}

/// Errors returned by the scheduler's submission surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("process {0} is already running")]
    DuplicateProcess(String),

    #[error("playback scheduler is shutting down")]
    ShuttingDown,

    #[error("playback scheduler is not running")]
    Closed,
}
