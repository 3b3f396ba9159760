//! In-memory DMX device.
//!
//! Records every operation so playback can be inspected without hardware.
//! Connections opened on the same path share one [`MemoryDevice`], the same
//! way two processes would share one physical bus.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use enttec_usbpro::DMX_UNIVERSE_SIZE;
use parking_lot::Mutex;

use super::{DeviceConnection, DeviceError, DeviceOpener};
use crate::domain::{DMX_MAX_CHANNEL, DMX_MIN_CHANNEL};

/// One recorded device operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOp {
    Set { channel: u16, value: u8 },
    Render,
    Close,
}

#[derive(Debug)]
struct DeviceState {
    ops: Vec<DeviceOp>,
    buffer: [u8; DMX_UNIVERSE_SIZE],
    rendered: [u8; DMX_UNIVERSE_SIZE],
    renders: usize,
    fail_render_after: Option<usize>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            ops: Vec::new(),
            buffer: [0u8; DMX_UNIVERSE_SIZE],
            rendered: [0u8; DMX_UNIVERSE_SIZE],
            renders: 0,
            fail_render_after: None,
        }
    }
}

/// Shared state of one in-memory universe.
#[derive(Debug, Clone, Default)]
pub struct MemoryDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// All operations recorded so far, in order.
    pub fn ops(&self) -> Vec<DeviceOp> {
        self.state.lock().ops.clone()
    }

    /// Values written to `channel`, in order.
    pub fn set_history(&self, channel: u16) -> Vec<u8> {
        self.state
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                DeviceOp::Set { channel: c, value } if *c == channel => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Value of `channel` as of the last render.
    pub fn rendered_value(&self, channel: u16) -> u8 {
        let index = (channel as usize).saturating_sub(1).min(DMX_UNIVERSE_SIZE - 1);
        self.state.lock().rendered[index]
    }

    pub fn render_count(&self) -> usize {
        self.state.lock().renders
    }

    pub fn close_count(&self) -> usize {
        self.state
            .lock()
            .ops
            .iter()
            .filter(|op| matches!(op, DeviceOp::Close))
            .count()
    }

    /// Make every render after the first `n` successful ones fail.
    pub fn fail_renders_after(&self, n: usize) {
        self.state.lock().fail_render_after = Some(n);
    }

    /// Poll until `predicate` holds or `timeout` elapses.
    pub async fn wait_for(&self, timeout: Duration, predicate: impl Fn(&Self) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if predicate(self) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

/// Opens [`MemoryConnection`]s, one shared [`MemoryDevice`] per path.
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    devices: Arc<Mutex<HashMap<String, MemoryDevice>>>,
    unavailable: Arc<Mutex<HashSet<String>>>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// The device behind `path`, created on first use.
    pub fn device(&self, path: &str) -> MemoryDevice {
        self.devices
            .lock()
            .entry(path.to_string())
            .or_default()
            .clone()
    }

    /// Make subsequent opens of `path` fail.
    pub fn make_unavailable(&self, path: &str) {
        self.unavailable.lock().insert(path.to_string());
    }

    /// Paths that have been opened at least once.
    pub fn opened_paths(&self) -> Vec<String> {
        self.devices.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl DeviceOpener for MemoryOpener {
    async fn open(&self, path: &str) -> Result<Box<dyn DeviceConnection>, DeviceError> {
        if self.unavailable.lock().contains(path) {
            return Err(DeviceError::Open {
                path: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "device unavailable"),
            });
        }
        Ok(Box::new(MemoryConnection {
            device: self.device(path),
            closed: false,
        }))
    }
}

/// A connection to a [`MemoryDevice`].
#[derive(Debug)]
pub struct MemoryConnection {
    device: MemoryDevice,
    closed: bool,
}

#[async_trait]
impl DeviceConnection for MemoryConnection {
    fn set_channel(&mut self, channel: u16, value: u8) -> Result<(), DeviceError> {
        if !(DMX_MIN_CHANNEL..=DMX_MAX_CHANNEL).contains(&channel) {
            return Err(DeviceError::InvalidChannel(channel));
        }
        let mut state = self.device.state.lock();
        state.buffer[channel as usize - 1] = value;
        state.ops.push(DeviceOp::Set { channel, value });
        Ok(())
    }

    async fn render(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        let mut state = self.device.state.lock();
        if state
            .fail_render_after
            .is_some_and(|limit| state.renders >= limit)
        {
            return Err(DeviceError::Write("simulated bus failure".to_string()));
        }
        let buffer = state.buffer;
        state.rendered = buffer;
        state.renders += 1;
        state.ops.push(DeviceOp::Render);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        if !self.closed {
            self.closed = true;
            self.device.state.lock().ops.push(DeviceOp::Close);
        }
        Ok(())
    }
}
