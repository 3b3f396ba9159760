//! Timeline entity and frame value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Lowest addressable DMX512 channel.
pub const DMX_MIN_CHANNEL: u16 = 1;

/// Highest addressable DMX512 channel.
pub const DMX_MAX_CHANNEL: u16 = 512;

/// A target value for one DMX channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelValue {
    pub channel: u16,
    pub value: u8,
}

impl ChannelValue {
    pub fn new(channel: u16, value: u8) -> Self {
        Self { channel, value }
    }

    pub fn is_addressable(&self) -> bool {
        (DMX_MIN_CHANNEL..=DMX_MAX_CHANNEL).contains(&self.channel)
    }
}

/// One step of a timeline.
///
/// Serialized with an internal `type` tag so that stored and submitted
/// timelines read as `{"type": "fade", "channels": [...]}` or
/// `{"type": "sleep", "sleeptime": 10}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Set every listed channel and commit them with a single render.
    Scene { channels: Vec<ChannelValue> },
    /// Ramp every listed channel from its last known value to the target.
    Fade { channels: Vec<ChannelValue> },
    /// Pause for the given number of seconds.
    Sleep {
        #[serde(rename = "sleeptime")]
        sleep_seconds: u64,
    },
}

/// Discriminant of a [`Frame`], used for logging and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Scene,
    Fade,
    Sleep,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Fade => "fade",
            Self::Sleep => "sleep",
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Frame {
    pub fn scene(channels: impl Into<Vec<ChannelValue>>) -> Self {
        Self::Scene {
            channels: channels.into(),
        }
    }

    pub fn fade(channels: impl Into<Vec<ChannelValue>>) -> Self {
        Self::Fade {
            channels: channels.into(),
        }
    }

    pub fn sleep(sleep_seconds: u64) -> Self {
        Self::Sleep { sleep_seconds }
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Scene { .. } => FrameKind::Scene,
            Self::Fade { .. } => FrameKind::Fade,
            Self::Sleep { .. } => FrameKind::Sleep,
        }
    }

    /// Channel values carried by this frame (empty for sleeps).
    pub fn channels(&self) -> &[ChannelValue] {
        match self {
            Self::Scene { channels } | Self::Fade { channels } => channels,
            Self::Sleep { .. } => &[],
        }
    }
}

/// A named, ordered sequence of frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub id: String,
    pub enabled: bool,
    pub created: DateTime<Utc>,
    pub name: String,
    /// Device node to play on. Blank or missing means the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usb_device_path: Option<String>,
    pub frames: Vec<Frame>,
}

impl Timeline {
    /// Create a new, enabled timeline with a fresh id.
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            enabled: true,
            created: Utc::now(),
            name: name.into(),
            usb_device_path: None,
            frames,
        }
    }

    pub fn with_device_path(mut self, path: impl Into<String>) -> Self {
        self.usb_device_path = Some(path.into());
        self
    }

    /// The explicitly requested device path, if any.
    pub fn device_path(&self) -> Option<&str> {
        self.usb_device_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }
}

/// Validate a frame sequence before it is stored.
pub fn validate_frames(frames: &[Frame]) -> Result<()> {
    if frames.is_empty() {
        return Err(Error::validation("frames must contain at least one item"));
    }

    for (index, frame) in frames.iter().enumerate() {
        if let Some(bad) = frame.channels().iter().find(|cv| !cv.is_addressable()) {
            return Err(Error::validation(format!(
                "frame {} ({}) addresses channel {}, expected {}..={}",
                index,
                frame.kind(),
                bad.channel,
                DMX_MIN_CHANNEL,
                DMX_MAX_CHANNEL
            )));
        }
    }

    Ok(())
}
