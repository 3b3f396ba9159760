use async_trait::async_trait;

use super::DeviceError;

/// An open connection to one DMX universe.
///
/// `set_channel` only touches the local buffer; nothing reaches the bus until
/// `render` is called.
#[async_trait]
pub trait DeviceConnection: Send {
    /// Buffer `value` for `channel` (1-based DMX address).
    fn set_channel(&mut self, channel: u16, value: u8) -> Result<(), DeviceError>;

    /// Commit the buffered universe to the bus.
    async fn render(&mut self) -> Result<(), DeviceError>;

    /// Release the underlying handle. Channel values stay as last rendered.
    async fn close(&mut self) -> Result<(), DeviceError>;
}

/// Opens device connections by path.
#[async_trait]
pub trait DeviceOpener: Send + Sync {
    async fn open(&self, path: &str) -> Result<Box<dyn DeviceConnection>, DeviceError>;
}
