//! Timeline store.
//!
//! Holds timeline definitions and the configured default device path.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use crate::database::models::{ConfigKey, TimelineDbModel};
use crate::database::time::now_ms;
use crate::domain::{Frame, Timeline, validate_frames};
use crate::{Error, Result};

/// CRUD for timelines plus the default device setting.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Timeline>;
    async fn list(&self) -> Result<Vec<Timeline>>;
    /// Create an enabled timeline. Fails with a validation error if `frames` is empty.
    async fn create(
        &self,
        name: &str,
        frames: Vec<Frame>,
        usb_device_path: Option<String>,
    ) -> Result<Timeline>;
    async fn update(&self, timeline: Timeline) -> Result<Timeline>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// The default device path. Fails with a configuration error when unset.
    async fn get_default_device_path(&self) -> Result<String>;
    async fn set_default_device_path(&self, path: &str) -> Result<()>;
}

/// SQLx implementation of [`TimelineStore`].
pub struct SqlxTimelineStore {
    pool: SqlitePool,
}

impl SqlxTimelineStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TimelineStore for SqlxTimelineStore {
    async fn get(&self, id: &str) -> Result<Timeline> {
        sqlx::query_as::<_, TimelineDbModel>("SELECT * FROM timelines WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Timeline", id))?
            .into_domain()
    }

    async fn list(&self) -> Result<Vec<Timeline>> {
        let rows = sqlx::query_as::<_, TimelineDbModel>(
            "SELECT * FROM timelines ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TimelineDbModel::into_domain).collect()
    }

    async fn create(
        &self,
        name: &str,
        frames: Vec<Frame>,
        usb_device_path: Option<String>,
    ) -> Result<Timeline> {
        validate_frames(&frames)?;

        let mut timeline = Timeline::new(name, frames);
        timeline.usb_device_path = usb_device_path;
        let model = TimelineDbModel::from_domain(&timeline)?;

        sqlx::query(
            r#"
            INSERT INTO timelines (id, enabled, created_at, name, usb_device_path, frames)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&model.id)
        .bind(model.enabled)
        .bind(model.created_at)
        .bind(&model.name)
        .bind(&model.usb_device_path)
        .bind(&model.frames)
        .execute(&self.pool)
        .await?;

        debug!(timeline_id = %timeline.id, name = %timeline.name, "Timeline created");
        Ok(timeline)
    }

    async fn update(&self, timeline: Timeline) -> Result<Timeline> {
        validate_frames(&timeline.frames)?;
        let model = TimelineDbModel::from_domain(&timeline)?;

        let result = sqlx::query(
            r#"
            UPDATE timelines SET
                enabled = ?,
                name = ?,
                usb_device_path = ?,
                frames = ?
            WHERE id = ?
            "#,
        )
        .bind(model.enabled)
        .bind(&model.name)
        .bind(&model.usb_device_path)
        .bind(&model.frames)
        .bind(&model.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Timeline", &timeline.id));
        }

        // Re-read so the caller sees the stored creation time.
        self.get(&timeline.id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM timelines WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Timeline", id));
        }
        Ok(())
    }

    async fn get_default_device_path(&self) -> Result<String> {
        let value: Option<(String,)> =
            sqlx::query_as("SELECT value FROM system_config WHERE key = ?")
                .bind(ConfigKey::DefaultUsbDevice.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match value {
            Some((path,)) if !path.trim().is_empty() => Ok(path),
            _ => Err(Error::config("no default USB device has been configured")),
        }
    }

    async fn set_default_device_path(&self, path: &str) -> Result<()> {
        let path = path.trim();
        if path.is_empty() {
            return Err(Error::validation(
                "the device path is required, e.g. /dev/ttyUSB0",
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO system_config (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(ConfigKey::DefaultUsbDevice.as_str())
        .bind(path)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_memory_pool;
    use crate::domain::ChannelValue;

    async fn store() -> SqlxTimelineStore {
        SqlxTimelineStore::new(init_memory_pool().await.unwrap())
    }

    fn sample_frames() -> Vec<Frame> {
        vec![
            Frame::scene(vec![
                ChannelValue::new(2, 255),
                ChannelValue::new(3, 140),
                ChannelValue::new(4, 25),
            ]),
            Frame::fade(vec![ChannelValue::new(1, 255), ChannelValue::new(8, 255)]),
            Frame::sleep(10),
        ]
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let store = store().await;

        let created = store
            .create("unittest_timeline1", sample_frames(), None)
            .await
            .unwrap();
        let fetched = store.get(&created.id).await.unwrap();

        assert_eq!(fetched.name, "unittest_timeline1");
        assert_eq!(fetched.frames, sample_frames());
        assert!(fetched.enabled);
        assert!(fetched.created.timestamp_millis() > 0);
        assert_eq!(fetched.created.timestamp_millis(), created.created.timestamp_millis());
    }

    #[tokio::test]
    async fn test_create_without_frames_is_rejected() {
        let store = store().await;
        let err = store.create("empty", vec![], None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let store = store().await;
        let first = store.create("one", sample_frames(), None).await.unwrap();
        let second = store.create("two", sample_frames(), None).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        let ids: Vec<&str> = all.iter().map(|t| t.id.as_str()).collect();
        assert!(ids.contains(&first.id.as_str()));
        assert!(ids.contains(&second.id.as_str()));
    }

    #[tokio::test]
    async fn test_update_existing_and_missing() {
        let store = store().await;
        let mut timeline = store.create("before", sample_frames(), None).await.unwrap();

        timeline.name = "after".to_string();
        timeline.enabled = false;
        timeline.frames = vec![Frame::sleep(1)];
        timeline.usb_device_path = Some("/dev/ttyUSB3".to_string());
        let updated = store.update(timeline.clone()).await.unwrap();

        assert_eq!(updated.name, "after");
        assert!(!updated.enabled);
        assert_eq!(updated.frames, vec![Frame::sleep(1)]);
        assert_eq!(updated.device_path(), Some("/dev/ttyUSB3"));

        let mut missing = timeline;
        missing.id = "does-not-exist".to_string();
        assert!(store.update(missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store().await;
        let timeline = store.create("doomed", sample_frames(), None).await.unwrap();

        store.delete(&timeline.id).await.unwrap();
        assert!(store.get(&timeline.id).await.unwrap_err().is_not_found());
        assert!(store.delete(&timeline.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_default_device_path() {
        let store = store().await;

        let err = store.get_default_device_path().await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        store.set_default_device_path("/dev/ttyUSB0").await.unwrap();
        assert_eq!(store.get_default_device_path().await.unwrap(), "/dev/ttyUSB0");

        store.set_default_device_path(" /dev/ttyUSB1 ").await.unwrap();
        assert_eq!(store.get_default_device_path().await.unwrap(), "/dev/ttyUSB1");

        assert!(store.set_default_device_path("  ").await.is_err());
    }
}
