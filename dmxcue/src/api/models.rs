//! API request and response models.

use serde::{Deserialize, Serialize};

use crate::domain::{Frame, Timeline};

/// Success envelope: `{ "message": ..., "data": ... }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

// ============================================================================
// Timelines
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTimelineRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub usb_device_path: Option<String>,
}

/// Update request. Blank name and empty frames keep the stored values;
/// `enabled` is always applied; the device path only when present.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTimelineRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub usb_device_path: Option<String>,
}

impl UpdateTimelineRequest {
    /// Merge this request into the stored timeline.
    pub fn apply_to(self, mut timeline: Timeline) -> Timeline {
        if !self.name.trim().is_empty() {
            timeline.name = self.name;
        }
        timeline.enabled = self.enabled;
        if !self.frames.is_empty() {
            timeline.frames = self.frames;
        }
        if let Some(path) = self.usb_device_path {
            timeline.usb_device_path = Some(path).filter(|p| !p.trim().is_empty());
        }
        timeline
    }
}

/// Response to a play request.
#[derive(Debug, Serialize)]
pub struct PlayResponse {
    pub process_id: String,
    pub timeline: Timeline,
}

// ============================================================================
// System
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDefaultUsbRequest {
    #[serde(rename = "devicepath", default)]
    pub device_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventListQuery {
    #[serde(default = "default_event_limit")]
    pub limit: u32,
}

fn default_event_limit() -> u32 {
    100
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateLogFilterRequest {
    pub filter: String,
}

#[derive(Debug, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct LoggingConfigResponse {
    pub filter: String,
    pub available_modules: Vec<ModuleInfo>,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub live_processes: usize,
    pub components: Vec<ComponentHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChannelValue;

    fn stored() -> Timeline {
        Timeline::new("stored", vec![Frame::sleep(1)]).with_device_path("/dev/ttyUSB0")
    }

    #[test]
    fn test_update_keeps_blank_fields() {
        let request: UpdateTimelineRequest =
            serde_json::from_str(r#"{"id": "x", "name": "  "}"#).unwrap();
        let updated = request.apply_to(stored());

        assert_eq!(updated.name, "stored");
        assert_eq!(updated.frames, vec![Frame::sleep(1)]);
        assert!(!updated.enabled);
        assert_eq!(updated.device_path(), Some("/dev/ttyUSB0"));
    }

    #[test]
    fn test_update_replaces_given_fields() {
        let request = UpdateTimelineRequest {
            id: "x".into(),
            enabled: true,
            name: "renamed".into(),
            frames: vec![Frame::scene(vec![ChannelValue::new(1, 2)])],
            usb_device_path: Some(String::new()),
        };
        let updated = request.apply_to(stored());

        assert_eq!(updated.name, "renamed");
        assert!(updated.enabled);
        assert_eq!(updated.frames.len(), 1);
        assert_eq!(updated.device_path(), None);
    }

    #[test]
    fn test_default_usb_request_field_name() {
        let request: UpdateDefaultUsbRequest =
            serde_json::from_str(r#"{"devicepath": "/dev/ttyUSB0"}"#).unwrap();
        assert_eq!(request.device_path, "/dev/ttyUSB0");
    }

    #[test]
    fn test_envelope_shape() {
        let json = serde_json::to_value(ApiResponse::new("2 timeline(s)", vec![1, 2])).unwrap();
        assert_eq!(json["message"], "2 timeline(s)");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }
}
