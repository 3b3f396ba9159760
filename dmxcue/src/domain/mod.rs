//! Domain layer for dmxcue.
//!
//! Timelines, their frames and the channel values they drive.

pub mod timeline;

pub use timeline::{
    ChannelValue, DMX_MAX_CHANNEL, DMX_MIN_CHANNEL, Frame, FrameKind, Timeline, validate_frames,
};
