//! Database maintenance.
//!
//! Periodically purges expired rows from the event log.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::database::repositories::EventRepository;
use crate::database::time::now_ms;

/// Configuration for the maintenance scheduler.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Interval between purge runs (default: 1 hour).
    pub purge_interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            purge_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Event log maintenance scheduler.
pub struct MaintenanceScheduler {
    events: Arc<dyn EventRepository>,
    config: MaintenanceConfig,
}

impl MaintenanceScheduler {
    pub fn new(events: Arc<dyn EventRepository>, config: MaintenanceConfig) -> Self {
        Self { events, config }
    }

    /// Start the scheduler. It runs until `cancel` fires.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop(cancel).await;
        })
    }

    async fn run_loop(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.purge_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Maintenance scheduler stopped");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_maintenance().await {
                        tracing::error!("Maintenance error: {}", e);
                    }
                }
            }
        }
    }

    /// Run one purge pass. Returns the number of events removed.
    pub async fn run_maintenance(&self) -> Result<u64, crate::Error> {
        let deleted = self.events.purge_expired(now_ms()).await?;
        if deleted > 0 {
            tracing::info!("Purged {} expired events", deleted);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_memory_pool;
    use crate::database::repositories::SqlxEventRepository;
    use crate::events::{EventKind, EventRecord};

    #[test]
    fn test_default_config() {
        let config = MaintenanceConfig::default();
        assert_eq!(config.purge_interval, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_run_maintenance_purges_expired() {
        let pool = init_memory_pool().await.unwrap();
        let repo = Arc::new(SqlxEventRepository::new(pool));

        let expired = EventRecord::new(EventKind::TimelineStarted, "x", "", Duration::ZERO);
        repo.insert(&expired).await.unwrap();

        let scheduler = MaintenanceScheduler::new(repo.clone(), MaintenanceConfig::default());
        assert_eq!(scheduler.run_maintenance().await.unwrap(), 1);
        assert_eq!(scheduler.run_maintenance().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_start_stops_on_cancel() {
        let pool = init_memory_pool().await.unwrap();
        let repo = Arc::new(SqlxEventRepository::new(pool));
        let scheduler = Arc::new(MaintenanceScheduler::new(
            repo,
            MaintenanceConfig {
                purge_interval: Duration::from_millis(5),
            },
        ));

        let cancel = CancellationToken::new();
        let handle = scheduler.start(cancel.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
