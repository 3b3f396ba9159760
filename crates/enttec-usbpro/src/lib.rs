//! Enttec DMX USB Pro framing.
//!
//! The widget speaks a simple delimited protocol over its virtual serial port:
//!
//! ```text
//! 0x7E | label | len (u16 LE) | data[len] | 0xE7
//! ```
//!
//! Sending a universe uses label 6 ("Output Only Send DMX"); the data begins
//! with the DMX start code followed by up to 512 slot values.

pub mod codec;
pub mod error;
pub mod packet;

pub use crate::{
    codec::UsbProCodec,
    error::FrameError,
    packet::{Label, Packet},
};
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

/// Start-of-message delimiter.
pub const START_OF_MESSAGE: u8 = 0x7E;

/// End-of-message delimiter.
pub const END_OF_MESSAGE: u8 = 0xE7;

/// Null start code for dimmer data.
pub const DMX_START_CODE: u8 = 0x00;

/// Number of slots in one DMX512 universe.
pub const DMX_UNIVERSE_SIZE: usize = 512;

/// Header bytes before the payload: delimiter, label and the two length bytes.
pub const HEADER_LEN: usize = 4;

/// Encode a "send DMX" packet for the given slot values.
pub fn encode_send_dmx(slots: &[u8]) -> Result<BytesMut, FrameError> {
    let mut codec = UsbProCodec;
    let mut dst = BytesMut::with_capacity(HEADER_LEN + slots.len() + 2);
    codec.encode(Packet::send_dmx(slots)?, &mut dst)?;
    Ok(dst)
}

/// Decode a single packet from the front of `src`.
///
/// Returns `Ok(None)` when more bytes are needed.
pub fn decode(src: &mut BytesMut) -> Result<Option<Packet>, FrameError> {
    let mut codec = UsbProCodec;
    codec.decode(src)
}
