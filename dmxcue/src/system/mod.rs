//! Host system queries.

pub mod usb;

pub use usb::{UsbDeviceInfo, list_serial_usb_devices};
