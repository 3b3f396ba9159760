//! Playback scheduler.
//!
//! Owns the registry of live processes and the root cancellation token. Each
//! accepted play request runs as its own task under a child token; stop
//! requests remove the registry entry and then cancel it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::database::repositories::TimelineStore;
use crate::device::DeviceOpener;
use crate::events::{EventKind, EventSink};

use super::executor::PlaybackExecutor;
use super::registry::ProcessRegistry;
use super::{
    PlayRequest, PlaybackCommand, PlaybackOutcome, ProcessId, ProcessReport, SchedulerError,
    StopAllRequest, StopRequest,
};

/// Default interval between fade steps.
pub const DEFAULT_FADE_STEP_INTERVAL: Duration = Duration::from_millis(1);

/// Default time to wait for executors on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Playback tuning.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub fade_step_interval: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fade_step_interval: DEFAULT_FADE_STEP_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Tracks and controls in-flight playback processes.
pub struct PlaybackScheduler {
    store: Arc<dyn TimelineStore>,
    opener: Arc<dyn DeviceOpener>,
    events: Arc<dyn EventSink>,
    registry: Arc<ProcessRegistry>,
    config: PlaybackConfig,
    root: CancellationToken,
    tasks: Mutex<JoinSet<()>>,
    reports: broadcast::Sender<ProcessReport>,
}

impl PlaybackScheduler {
    pub fn new(
        store: Arc<dyn TimelineStore>,
        opener: Arc<dyn DeviceOpener>,
        events: Arc<dyn EventSink>,
        config: PlaybackConfig,
        root: CancellationToken,
    ) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            store,
            opener,
            events,
            registry: Arc::new(ProcessRegistry::new()),
            config,
            root,
            tasks: Mutex::new(JoinSet::new()),
            reports,
        }
    }

    /// Subscribe to completion reports.
    pub fn subscribe_reports(&self) -> broadcast::Receiver<ProcessReport> {
        self.reports.subscribe()
    }

    /// Ids of live processes, sorted.
    pub fn live_processes(&self) -> Vec<ProcessId> {
        self.registry.ids()
    }

    pub fn is_running(&self, process_id: &str) -> bool {
        self.registry.contains(process_id)
    }

    /// Start playing a timeline. Returns once the process is registered.
    pub fn submit(&self, request: PlayRequest) -> Result<(), SchedulerError> {
        if self.root.is_cancelled() {
            return Err(SchedulerError::ShuttingDown);
        }

        let PlayRequest {
            process_id,
            timeline,
            origin_ip,
        } = request;

        let token = self.root.child_token();
        let generation = self.registry.insert(&process_id, token.clone())?;

        self.events.record(
            EventKind::TimelineStarted,
            &format!(
                "Timeline {} ({}) started as process {}",
                timeline.name, timeline.id, process_id
            ),
            &origin_ip,
        );
        info!(
            process_id = %process_id,
            timeline_id = %timeline.id,
            "Timeline playback started"
        );

        let timeline_id = timeline.id.clone();
        let executor = PlaybackExecutor::new(
            process_id.clone(),
            timeline,
            self.store.clone(),
            self.opener.clone(),
            self.config.fade_step_interval,
            token,
        );
        let registry = self.registry.clone();
        let events = self.events.clone();
        let reports = self.reports.clone();

        let mut tasks = self.tasks.lock();
        // Reap finished tasks so the set does not grow without bound.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let outcome = executor.run().await;
            registry.remove_generation(&process_id, generation);

            match &outcome {
                PlaybackOutcome::Completed => {
                    info!(process_id = %process_id, "Timeline playback completed");
                }
                PlaybackOutcome::Cancelled => {
                    info!(process_id = %process_id, "Timeline playback cancelled");
                }
                PlaybackOutcome::Failed(e) => {
                    warn!(process_id = %process_id, error = %e, "Timeline playback failed");
                    events.record(
                        EventKind::TimelineError,
                        &format!("Process {process_id} of timeline {timeline_id} failed: {e}"),
                        &origin_ip,
                    );
                }
            }

            // No subscribers is fine.
            let _ = reports.send(ProcessReport {
                process_id,
                timeline_id,
                outcome,
            });
        });

        Ok(())
    }

    /// Stop one process. Unknown ids are ignored. Returns whether a process was stopped.
    pub fn stop(&self, process_id: &str, origin_ip: &str) -> bool {
        let Some(token) = self.registry.remove(process_id) else {
            debug!(process_id, "Stop requested for unknown process");
            return false;
        };

        token.cancel();
        info!(process_id, "Timeline playback stop requested");
        self.events.record(
            EventKind::TimelineStopped,
            &format!("Process {process_id} stopped"),
            origin_ip,
        );
        true
    }

    /// Stop every live process. Returns how many were stopped.
    pub fn stop_all(&self, origin_ip: &str) -> usize {
        let drained = self.registry.drain();
        for (_, token) in &drained {
            token.cancel();
        }
        info!(count = drained.len(), "All timelines stop requested");

        self.events.record(
            EventKind::AllTimelinesStopped,
            &format!("{} running processes stopped", drained.len()),
            origin_ip,
        );
        drained.len()
    }

    /// Serve commands until `rx` closes or the scheduler shuts down.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<PlaybackCommand>) {
        loop {
            let command = tokio::select! {
                biased;
                _ = self.root.cancelled() => break,
                command = rx.recv() => command,
            };
            let Some(command) = command else {
                break;
            };
            self.handle_command(command);
        }
        debug!("Playback command loop stopped");
    }

    fn handle_command(&self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::Play(request) => {
                let process_id = request.process_id.clone();
                let origin_ip = request.origin_ip.clone();
                if let Err(e) = self.submit(request) {
                    warn!(process_id = %process_id, error = %e, "Play request rejected");
                    self.events.record(
                        EventKind::TimelineError,
                        &format!("Play request {process_id} rejected: {e}"),
                        &origin_ip,
                    );
                }
            }
            PlaybackCommand::Stop(StopRequest {
                process_id,
                origin_ip,
            }) => {
                self.stop(&process_id, &origin_ip);
            }
            PlaybackCommand::StopAll(StopAllRequest { origin_ip }) => {
                self.stop_all(&origin_ip);
            }
        }
    }

    /// Start the command loop and return a handle for submitting to it.
    pub fn spawn(self: Arc<Self>) -> (SchedulerHandle, tokio::task::JoinHandle<()>) {
        let (sender, rx) = mpsc::unbounded_channel();
        let handle = SchedulerHandle {
            sender,
            registry: self.registry.clone(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    /// Cancel every process and wait for executors to close their devices.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let drained = self.registry.drain();
        if !drained.is_empty() {
            info!(count = drained.len(), "Stopping running timelines for shutdown");
        }

        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let wait = async {
            while tasks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(self.config.shutdown_timeout, wait)
            .await
            .is_err()
        {
            warn!(
                timeout = ?self.config.shutdown_timeout,
                "Timed out waiting for playback tasks, aborting"
            );
            tasks.abort_all();
        }
    }
}

/// Cloneable front for the scheduler's command loop.
///
/// Sends never wait for playback; the queue is unbounded.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::UnboundedSender<PlaybackCommand>,
    registry: Arc<ProcessRegistry>,
}

impl SchedulerHandle {
    pub fn play(&self, request: PlayRequest) -> Result<(), SchedulerError> {
        self.send(PlaybackCommand::Play(request))
    }

    pub fn stop(
        &self,
        process_id: impl Into<ProcessId>,
        origin_ip: impl Into<String>,
    ) -> Result<(), SchedulerError> {
        self.send(PlaybackCommand::Stop(StopRequest {
            process_id: process_id.into(),
            origin_ip: origin_ip.into(),
        }))
    }

    pub fn stop_all(&self, origin_ip: impl Into<String>) -> Result<(), SchedulerError> {
        self.send(PlaybackCommand::StopAll(StopAllRequest {
            origin_ip: origin_ip.into(),
        }))
    }

    /// Ids of live processes, sorted.
    pub fn live_processes(&self) -> Vec<ProcessId> {
        self.registry.ids()
    }

    fn send(&self, command: PlaybackCommand) -> Result<(), SchedulerError> {
        self.sender
            .send(command)
            .map_err(|_| SchedulerError::Closed)
    }
}
