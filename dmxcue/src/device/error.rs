use thiserror::Error;

/// Errors raised while talking to a DMX interface.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open DMX device {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("channel {0} is outside the DMX512 range 1..=512")]
    InvalidChannel(u16),

    #[error("failed to write to DMX device: {0}")]
    Write(String),

    #[error("DMX device is closed")]
    Closed,
}

impl From<enttec_usbpro::FrameError> for DeviceError {
    fn from(err: enttec_usbpro::FrameError) -> Self {
        Self::Write(err.to_string())
    }
}
