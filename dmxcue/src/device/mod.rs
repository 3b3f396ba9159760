//! DMX output devices.
//!
//! A [`DeviceOpener`] turns a device path into a [`DeviceConnection`] that
//! buffers channel values and commits them to the bus on `render`.
//!
//! - [`UsbProOpener`]: Enttec DMX USB Pro compatible serial interfaces
//! - [`MemoryOpener`]: in-memory recording device used by tests and dry runs

mod error;
mod memory;
mod traits;
mod usbpro;

pub use error::DeviceError;
pub use memory::{DeviceOp, MemoryConnection, MemoryDevice, MemoryOpener};
pub use traits::{DeviceConnection, DeviceOpener};
pub use usbpro::{UsbProConnection, UsbProOpener};
