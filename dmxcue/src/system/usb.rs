//! USB serial device discovery via `udevadm`.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tokio::process::Command;

use crate::{Error, Result};

const DEV_DIR: &str = "/dev";
const SERIAL_USB_PREFIX: &str = "ttyUSB";
const UDEVADM_TIMEOUT: Duration = Duration::from_secs(10);
const NOT_FOUND: &str = "Not found";

static PRODUCT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"ATTRS\{product\}=="(.*)""#).unwrap());
static MANUFACTURER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"ATTRS\{manufacturer\}=="(.*)""#).unwrap());

/// A serial USB device attached to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsbDeviceInfo {
    #[serde(rename = "device")]
    pub device_path: String,
    #[serde(rename = "product")]
    pub product_name: String,
    pub manufacturer: String,
}

impl UsbDeviceInfo {
    /// Build from `udevadm info -a` output. Missing attributes become "Not found".
    pub fn from_udevadm(device_path: impl Into<String>, output: &str) -> Self {
        Self {
            device_path: device_path.into(),
            product_name: first_capture(&PRODUCT_REGEX, output),
            manufacturer: first_capture(&MANUFACTURER_REGEX, output),
        }
    }
}

fn first_capture(regex: &Regex, text: &str) -> String {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| NOT_FOUND.to_string())
}

/// Serial USB device nodes (`/dev/ttyUSB*`), sorted.
async fn serial_usb_paths(dev_dir: &Path) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    let mut entries = match tokio::fs::read_dir(dev_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(SERIAL_USB_PREFIX) {
            paths.push(entry.path().to_string_lossy().into_owned());
        }
    }
    paths.sort();
    Ok(paths)
}

async fn udevadm_info(device_path: &str) -> Result<String> {
    let output = Command::new("udevadm")
        .args(["info", "-a", "--name", device_path])
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(UDEVADM_TIMEOUT, output)
        .await
        .map_err(|_| Error::Other(format!("udevadm timed out for {device_path}")))??;

    if !output.status.success() {
        return Err(Error::Other(format!(
            "udevadm failed for {}: {}",
            device_path,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// List attached serial USB devices with their product and manufacturer.
pub async fn list_serial_usb_devices() -> Result<Vec<UsbDeviceInfo>> {
    let mut devices = Vec::new();
    for path in serial_usb_paths(Path::new(DEV_DIR)).await? {
        let info = udevadm_info(&path).await.map_err(|e| {
            tracing::warn!(device = %path, error = %e, "Failed to query USB device");
            e
        })?;
        devices.push(UsbDeviceInfo::from_udevadm(path, &info));
    }
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
  looking at device '/devices/pci0000:00/0000:00:14.0/usb1/1-2/1-2:1.0/ttyUSB0/tty/ttyUSB0':
    KERNEL=="ttyUSB0"
    SUBSYSTEM=="tty"

  looking at parent device '/devices/pci0000:00/0000:00:14.0/usb1/1-2':
    ATTRS{manufacturer}=="FTDI"
    ATTRS{product}=="DMX USB PRO"
    ATTRS{serial}=="EN123456"
"#;

    #[test]
    fn test_parse_udevadm_output() {
        let info = UsbDeviceInfo::from_udevadm("/dev/ttyUSB0", SAMPLE);
        assert_eq!(info.device_path, "/dev/ttyUSB0");
        assert_eq!(info.product_name, "DMX USB PRO");
        assert_eq!(info.manufacturer, "FTDI");
    }

    #[test]
    fn test_missing_attributes() {
        let info = UsbDeviceInfo::from_udevadm("/dev/ttyUSB1", "KERNEL==\"ttyUSB1\"");
        assert_eq!(info.product_name, "Not found");
        assert_eq!(info.manufacturer, "Not found");
    }

    #[test]
    fn test_json_field_names() {
        let info = UsbDeviceInfo::from_udevadm("/dev/ttyUSB0", SAMPLE);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["device"], "/dev/ttyUSB0");
        assert_eq!(json["product"], "DMX USB PRO");
        assert_eq!(json["manufacturer"], "FTDI");
    }

    #[tokio::test]
    async fn test_serial_usb_paths_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["ttyUSB1", "ttyS0", "ttyUSB0", "null"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let paths = serial_usb_paths(dir.path()).await.unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| Path::new(p).file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ttyUSB0", "ttyUSB1"]);
    }

    #[tokio::test]
    async fn test_missing_dev_dir_is_empty() {
        let paths = serial_usb_paths(Path::new("/definitely/not/here")).await.unwrap();
        assert!(paths.is_empty());
    }
}
