//! Service container for dependency injection.
//!
//! The ServiceContainer holds references to all application services
//! and manages their lifecycle.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::api::server::{ApiServer, ApiServerConfig, AppState};
use crate::config::AppConfig;
use crate::database::repositories::{SqlxEventRepository, SqlxTimelineStore};
use crate::database::{DbPool, MaintenanceConfig, MaintenanceScheduler};
use crate::device::{DeviceOpener, UsbProOpener};
use crate::events::{DbEventSink, EventKind, EventSink};
use crate::logging::LoggingConfig;
use crate::playback::{PlaybackScheduler, SchedulerHandle};

/// Service container holding all application services.
pub struct ServiceContainer {
    /// Database connection pool.
    pub pool: DbPool,
    /// Timeline and system setting storage.
    pub timelines: Arc<SqlxTimelineStore>,
    /// Persisted event log.
    pub event_log: Arc<SqlxEventRepository>,
    /// Event sink shared by the API and the scheduler.
    pub events: Arc<DbEventSink>,
    /// Playback scheduler.
    pub scheduler: Arc<PlaybackScheduler>,
    scheduler_handle: SchedulerHandle,
    scheduler_task: Mutex<Option<JoinHandle<()>>>,
    maintenance: Arc<MaintenanceScheduler>,
    logging_config: Option<Arc<LoggingConfig>>,
    /// Cancellation token for graceful shutdown.
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Create a container that drives USB Pro devices.
    pub fn new(pool: DbPool, config: &AppConfig) -> Self {
        Self::with_opener(pool, config, Arc::new(UsbProOpener))
    }

    /// Create a container with a custom device opener.
    ///
    /// Starts the playback command loop, so it must be called from within a
    /// tokio runtime.
    pub fn with_opener(pool: DbPool, config: &AppConfig, opener: Arc<dyn DeviceOpener>) -> Self {
        info!("Initializing service container");

        let timelines = Arc::new(SqlxTimelineStore::new(pool.clone()));
        let event_log = Arc::new(SqlxEventRepository::new(pool.clone()));
        let events = Arc::new(DbEventSink::new(event_log.clone(), config.event_retention));

        let cancellation_token = CancellationToken::new();
        let scheduler = Arc::new(PlaybackScheduler::new(
            timelines.clone(),
            opener,
            events.clone(),
            config.playback.clone(),
            cancellation_token.child_token(),
        ));
        let (scheduler_handle, scheduler_task) = scheduler.clone().spawn();

        let maintenance = Arc::new(MaintenanceScheduler::new(
            event_log.clone(),
            MaintenanceConfig::default(),
        ));

        info!("Service container initialized");

        Self {
            pool,
            timelines,
            event_log,
            events,
            scheduler,
            scheduler_handle,
            scheduler_task: Mutex::new(Some(scheduler_task)),
            maintenance,
            logging_config: None,
            cancellation_token,
        }
    }

    pub fn with_logging_config(mut self, logging_config: Arc<LoggingConfig>) -> Self {
        self.logging_config = Some(logging_config);
        self
    }

    /// Start background tasks and record the startup event.
    pub fn initialize(&self) {
        self.maintenance
            .clone()
            .start(self.cancellation_token.child_token());

        if let Some(logging_config) = &self.logging_config {
            logging_config.start_retention_cleanup(self.cancellation_token.child_token());
        }

        self.events
            .record(EventKind::SystemStartup, "dmxcue started", "");
        info!("Services started");
    }

    /// Handle used to submit play and stop requests.
    pub fn scheduler_handle(&self) -> SchedulerHandle {
        self.scheduler_handle.clone()
    }

    /// Shared state for the HTTP API.
    pub fn app_state(&self) -> AppState {
        let state = AppState::new(
            self.timelines.clone(),
            self.event_log.clone(),
            self.events.clone(),
            self.scheduler_handle.clone(),
        )
        .with_pool(self.pool.clone());

        match &self.logging_config {
            Some(logging_config) => state.with_logging_config(logging_config.clone()),
            None => state,
        }
    }

    /// Build the API server; it stops when the container shuts down.
    pub fn api_server(&self, config: ApiServerConfig) -> ApiServer {
        ApiServer::new(
            config,
            self.app_state(),
            self.cancellation_token.child_token(),
        )
    }

    /// Stop playback, background tasks and the API server.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down services");

        self.events
            .record(EventKind::SystemShutdown, "dmxcue stopping", "");

        self.scheduler.shutdown().await;

        // Signal all background tasks to stop
        self.cancellation_token.cancel();

        let scheduler_task = self.scheduler_task.lock().take();
        if let Some(task) = scheduler_task
            && let Err(e) = task.await
        {
            warn!(error = %e, "Playback command loop ended abnormally");
        }

        // Give pending event inserts a moment to land before closing the pool.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        info!("Closing database pool...");
        self.pool.close().await;

        info!("Services shut down");
        Ok(())
    }

    /// Get the cancellation token for external use.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Check if shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_memory_pool;
    use crate::database::repositories::{EventRepository, TimelineStore};
    use crate::database::time::now_ms;
    use crate::device::MemoryOpener;
    use crate::domain::{ChannelValue, Frame};
    use crate::playback::PlayRequest;
    use std::time::Duration;

    async fn container(opener: MemoryOpener) -> ServiceContainer {
        let pool = init_memory_pool().await.unwrap();
        ServiceContainer::with_opener(pool, &AppConfig::default(), Arc::new(opener))
    }

    #[tokio::test]
    async fn test_startup_and_shutdown_are_recorded() {
        let container = container(MemoryOpener::new()).await;
        let event_log = container.event_log.clone();

        container.initialize();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let events = event_log.list(now_ms(), 10).await.unwrap();
        assert!(events.iter().any(|e| e.kind == "system_startup"));

        container.shutdown().await.unwrap();
        assert!(container.is_shutting_down());
    }

    #[tokio::test]
    async fn test_play_through_container() {
        let opener = MemoryOpener::new();
        let container = container(opener.clone()).await;

        let timeline = container
            .timelines
            .create(
                "test",
                vec![Frame::scene([ChannelValue::new(1, 200)])],
                Some("/dev/ttyUSB0".to_string()),
            )
            .await
            .unwrap();

        let mut reports = container.scheduler.subscribe_reports();
        container
            .scheduler_handle()
            .play(PlayRequest::new("p1", timeline))
            .unwrap();

        let report = tokio::time::timeout(Duration::from_secs(2), reports.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.process_id, "p1");
        assert_eq!(opener.device("/dev/ttyUSB0").rendered_value(1), 200);

        container.shutdown().await.unwrap();
    }
}
