use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("universe holds at most 512 slots, got {0}")]
    TooManySlots(usize),
    #[error("expected start delimiter 0x7E, found {0:#04x}")]
    MissingStart(u8),
    #[error("expected end delimiter 0xE7, found {0:#04x}")]
    MissingEnd(u8),
    #[error("payload length {0} exceeds the widget limit")]
    PayloadTooLarge(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
