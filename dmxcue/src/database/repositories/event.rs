//! Event log repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::EventDbModel;
use crate::events::EventRecord;
use crate::{Error, Result};

/// Persistence for the audit event log.
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert(&self, record: &EventRecord) -> Result<()>;
    /// Unexpired events, newest first.
    async fn list(&self, now_ms: i64, limit: u32) -> Result<Vec<EventRecord>>;
    async fn get(&self, id: &str) -> Result<EventRecord>;
    /// Delete events whose expiry is at or before `now_ms`. Returns the number removed.
    async fn purge_expired(&self, now_ms: i64) -> Result<u64>;
}

/// SQLx implementation of [`EventRepository`].
pub struct SqlxEventRepository {
    pool: SqlitePool,
}

impl SqlxEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for SqlxEventRepository {
    async fn insert(&self, record: &EventRecord) -> Result<()> {
        let model = EventDbModel::from_record(record);
        sqlx::query(
            r#"
            INSERT INTO events (id, created_at, expires_at, kind, detail, origin_ip)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&model.id)
        .bind(model.created_at)
        .bind(model.expires_at)
        .bind(&model.kind)
        .bind(&model.detail)
        .bind(&model.origin_ip)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, now_ms: i64, limit: u32) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query_as::<_, EventDbModel>(
            r#"
            SELECT * FROM events
            WHERE expires_at > ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(now_ms)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EventDbModel::into_record).collect())
    }

    async fn get(&self, id: &str) -> Result<EventRecord> {
        sqlx::query_as::<_, EventDbModel>("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(EventDbModel::into_record)
            .ok_or_else(|| Error::not_found("Event", id))
    }

    async fn purge_expired(&self, now_ms: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM events WHERE expires_at <= ?")
            .bind(now_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::database::init_memory_pool;
    use crate::database::time::now_ms;
    use crate::events::EventKind;

    async fn repo() -> SqlxEventRepository {
        SqlxEventRepository::new(init_memory_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_insert_get_and_list() {
        let repo = repo().await;
        let first = EventRecord::new(
            EventKind::TimelineCreated,
            "Timeline abc created",
            "127.0.0.1",
            Duration::from_secs(60),
        );
        let second = EventRecord::new(
            EventKind::ConfigUpdated,
            "Default USB set to /dev/ttyUSB0",
            "10.0.0.2",
            Duration::from_secs(60),
        );
        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();

        let fetched = repo.get(&first.id).await.unwrap();
        assert_eq!(fetched.kind, "timeline_created");
        assert_eq!(fetched.origin_ip, "127.0.0.1");

        let listed = repo.list(now_ms(), 100).await.unwrap();
        assert_eq!(listed.len(), 2);

        assert!(repo.get("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let repo = repo().await;
        let short = EventRecord::new(
            EventKind::TimelineStarted,
            "short lived",
            "",
            Duration::from_millis(1),
        );
        let long = EventRecord::new(
            EventKind::TimelineStopped,
            "long lived",
            "",
            Duration::from_secs(3600),
        );
        repo.insert(&short).await.unwrap();
        repo.insert(&long).await.unwrap();

        let later = now_ms() + 10_000;
        assert_eq!(repo.list(later, 100).await.unwrap().len(), 1);
        assert_eq!(repo.purge_expired(later).await.unwrap(), 1);
        assert!(repo.get(&short.id).await.unwrap_err().is_not_found());
        assert!(repo.get(&long.id).await.is_ok());
    }
}
