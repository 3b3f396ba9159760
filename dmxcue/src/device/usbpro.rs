//! Enttec DMX USB Pro output over a serial device node.

use async_trait::async_trait;
use enttec_usbpro::{DMX_UNIVERSE_SIZE, Packet, UsbProCodec};
use futures::SinkExt;
use tokio::fs::{File, OpenOptions};
use tokio_util::codec::FramedWrite;
use tracing::{debug, trace};

use super::{DeviceConnection, DeviceError, DeviceOpener};
use crate::domain::{DMX_MAX_CHANNEL, DMX_MIN_CHANNEL};

/// Opens USB Pro compatible interfaces (e.g. `/dev/ttyUSB0`).
#[derive(Debug, Default, Clone, Copy)]
pub struct UsbProOpener;

#[async_trait]
impl DeviceOpener for UsbProOpener {
    async fn open(&self, path: &str) -> Result<Box<dyn DeviceConnection>, DeviceError> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .await
            .map_err(|source| DeviceError::Open {
                path: path.to_string(),
                source,
            })?;

        debug!(path = %path, "Opened DMX USB Pro device");
        Ok(Box::new(UsbProConnection::new(path, file)))
    }
}

/// A universe buffer bound to one open device node.
pub struct UsbProConnection {
    path: String,
    writer: Option<FramedWrite<File, UsbProCodec>>,
    universe: [u8; DMX_UNIVERSE_SIZE],
}

impl UsbProConnection {
    pub fn new(path: impl Into<String>, file: File) -> Self {
        Self {
            path: path.into(),
            writer: Some(FramedWrite::new(file, UsbProCodec)),
            universe: [0u8; DMX_UNIVERSE_SIZE],
        }
    }

    /// Current buffered value of a channel.
    pub fn channel(&self, channel: u16) -> Option<u8> {
        slot_index(channel).map(|index| self.universe[index])
    }
}

fn slot_index(channel: u16) -> Option<usize> {
    (DMX_MIN_CHANNEL..=DMX_MAX_CHANNEL)
        .contains(&channel)
        .then(|| channel as usize - 1)
}

#[async_trait]
impl DeviceConnection for UsbProConnection {
    fn set_channel(&mut self, channel: u16, value: u8) -> Result<(), DeviceError> {
        let index = slot_index(channel).ok_or(DeviceError::InvalidChannel(channel))?;
        self.universe[index] = value;
        Ok(())
    }

    async fn render(&mut self) -> Result<(), DeviceError> {
        let writer = self.writer.as_mut().ok_or(DeviceError::Closed)?;
        writer.send(Packet::send_dmx(&self.universe)?).await?;
        trace!(path = %self.path, "Rendered DMX universe");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        if let Some(mut writer) = self.writer.take() {
            writer.close().await?;
            debug!(path = %self.path, "Closed DMX USB Pro device");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[tokio::test]
    async fn test_render_writes_usbpro_packet() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let mut conn = UsbProOpener.open(&path).await.unwrap();
        conn.set_channel(1, 255).unwrap();
        conn.set_channel(512, 7).unwrap();
        conn.render().await.unwrap();
        conn.close().await.unwrap();

        let written = tokio::fs::read(&path).await.unwrap();
        let mut buf = BytesMut::from(&written[..]);
        let packet = enttec_usbpro::decode(&mut buf).unwrap().unwrap();
        let slots = packet.dmx_slots().unwrap();

        assert_eq!(slots.len(), DMX_UNIVERSE_SIZE);
        assert_eq!(slots[0], 255);
        assert_eq!(slots[511], 7);
        assert!(slots[1..511].iter().all(|v| *v == 0));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_channel_rejected() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut conn = UsbProOpener
            .open(tmp.path().to_str().unwrap())
            .await
            .unwrap();

        assert!(matches!(
            conn.set_channel(0, 1),
            Err(DeviceError::InvalidChannel(0))
        ));
        assert!(matches!(
            conn.set_channel(513, 1),
            Err(DeviceError::InvalidChannel(513))
        ));
    }

    #[tokio::test]
    async fn test_render_after_close_fails() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut conn = UsbProOpener
            .open(tmp.path().to_str().unwrap())
            .await
            .unwrap();

        conn.close().await.unwrap();
        assert!(matches!(conn.render().await, Err(DeviceError::Closed)));
        // Closing twice is harmless.
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_missing_device_fails() {
        let err = UsbProOpener
            .open("/nonexistent/dmxcue/ttyUSB9")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DeviceError::Open { .. }));
    }
}
