use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    END_OF_MESSAGE, HEADER_LEN, START_OF_MESSAGE,
    error::FrameError,
    packet::{Label, MAX_PAYLOAD_LEN, Packet},
};

/// Framing codec for the widget's serial stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct UsbProCodec;

impl Encoder<Packet> for UsbProCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = item.data.len();
        if len > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge(len));
        }

        dst.reserve(HEADER_LEN + len + 1);
        dst.put_u8(START_OF_MESSAGE);
        dst.put_u8(item.label.into());
        dst.put_u16_le(len as u16);
        dst.put_slice(&item.data);
        dst.put_u8(END_OF_MESSAGE);
        Ok(())
    }
}

impl Decoder for UsbProCodec {
    type Item = Packet;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        if src[0] != START_OF_MESSAGE {
            return Err(FrameError::MissingStart(src[0]));
        }

        let len = u16::from_le_bytes([src[2], src[3]]) as usize;
        if len > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge(len));
        }
        let total = HEADER_LEN + len + 1;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        if src[total - 1] != END_OF_MESSAGE {
            return Err(FrameError::MissingEnd(src[total - 1]));
        }

        let label = Label::from(src[1]);
        src.advance(HEADER_LEN);
        let data = src.split_to(len).freeze();
        src.advance(1);

        Ok(Some(Packet::new(label, data)))
    }
}
