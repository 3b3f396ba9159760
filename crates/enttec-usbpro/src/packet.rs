use bytes::Bytes;

use crate::{DMX_START_CODE, DMX_UNIVERSE_SIZE, error::FrameError};

/// Largest payload the widget accepts in one message.
pub const MAX_PAYLOAD_LEN: usize = 600;

/// Message labels understood by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    GetParameters,
    SetParameters,
    ReceivedDmx,
    SendDmx,
    GetSerialNumber,
    Other(u8),
}

impl From<u8> for Label {
    fn from(value: u8) -> Self {
        match value {
            3 => Label::GetParameters,
            4 => Label::SetParameters,
            5 => Label::ReceivedDmx,
            6 => Label::SendDmx,
            10 => Label::GetSerialNumber,
            other => Label::Other(other),
        }
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        match label {
            Label::GetParameters => 3,
            Label::SetParameters => 4,
            Label::ReceivedDmx => 5,
            Label::SendDmx => 6,
            Label::GetSerialNumber => 10,
            Label::Other(other) => other,
        }
    }
}

/// One widget message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub label: Label,
    pub data: Bytes,
}

impl Packet {
    pub fn new(label: Label, data: impl Into<Bytes>) -> Self {
        Self {
            label,
            data: data.into(),
        }
    }

    /// Build a "send DMX" packet: start code followed by the slot values.
    pub fn send_dmx(slots: &[u8]) -> Result<Self, FrameError> {
        if slots.len() > DMX_UNIVERSE_SIZE {
            return Err(FrameError::TooManySlots(slots.len()));
        }
        let mut data = Vec::with_capacity(slots.len() + 1);
        data.push(DMX_START_CODE);
        data.extend_from_slice(slots);
        Ok(Self::new(Label::SendDmx, data))
    }

    /// Slot values of a DMX packet, without the start code.
    pub fn dmx_slots(&self) -> Option<&[u8]> {
        match self.label {
            Label::SendDmx | Label::ReceivedDmx => self.data.get(1..),
            _ => None,
        }
    }
}
