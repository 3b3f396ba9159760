//! Timeline database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::Result;
use crate::database::time::{datetime_to_ms, ms_to_datetime};
use crate::domain::{Frame, Timeline};

/// Timeline row. `frames` holds the JSON-encoded frame array.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TimelineDbModel {
    pub id: String,
    pub enabled: bool,
    pub created_at: i64,
    pub name: String,
    pub usb_device_path: Option<String>,
    pub frames: String,
}

impl TimelineDbModel {
    pub fn from_domain(timeline: &Timeline) -> Result<Self> {
        Ok(Self {
            id: timeline.id.clone(),
            enabled: timeline.enabled,
            created_at: datetime_to_ms(timeline.created),
            name: timeline.name.clone(),
            usb_device_path: timeline.usb_device_path.clone(),
            frames: serde_json::to_string(&timeline.frames)?,
        })
    }

    pub fn into_domain(self) -> Result<Timeline> {
        let frames: Vec<Frame> = serde_json::from_str(&self.frames)?;
        Ok(Timeline {
            id: self.id,
            enabled: self.enabled,
            created: ms_to_datetime(self.created_at),
            name: self.name,
            usb_device_path: self.usb_device_path,
            frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChannelValue;

    #[test]
    fn test_frames_stored_as_json_array() {
        let timeline = Timeline::new(
            "stored",
            vec![Frame::scene(vec![ChannelValue::new(1, 10)]), Frame::sleep(2)],
        );
        let model = TimelineDbModel::from_domain(&timeline).unwrap();

        let frames: serde_json::Value = serde_json::from_str(&model.frames).unwrap();
        assert_eq!(frames.as_array().unwrap().len(), 2);
        assert_eq!(frames[1]["sleeptime"], 2);
    }

    #[test]
    fn test_corrupt_frames_surface_as_error() {
        let model = TimelineDbModel {
            id: "x".to_string(),
            enabled: true,
            created_at: 0,
            name: "broken".to_string(),
            usb_device_path: None,
            frames: "not json".to_string(),
        };
        assert!(model.into_domain().is_err());
    }
}
