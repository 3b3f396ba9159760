//! System configuration model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One key/value system setting.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SystemConfigDbModel {
    pub key: String,
    pub value: String,
    pub updated_at: i64,
}

/// Known system setting keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    /// Device path used by timelines that do not name one.
    DefaultUsbDevice,
}

impl ConfigKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DefaultUsbDevice => "default_usb_device",
        }
    }
}
