//! Per-process playback state machine.
//!
//! Resolves a device path, opens a connection and walks the timeline's frames
//! in order. Cancellation is checked at every frame boundary, during sleeps
//! and on every fade step. The connection is closed on every exit path.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::database::repositories::TimelineStore;
use crate::device::DeviceOpener;
use crate::domain::{ChannelValue, Frame, Timeline};

use super::fade::{ChannelState, FadeCoordinator, FrameOutcome, SharedConnection};
use super::{PlaybackError, PlaybackOutcome, ProcessId, ProcessState};

/// Plays one timeline once.
pub struct PlaybackExecutor {
    process_id: ProcessId,
    timeline: Timeline,
    store: Arc<dyn TimelineStore>,
    opener: Arc<dyn DeviceOpener>,
    fades: FadeCoordinator,
    cancel: CancellationToken,
    state: ProcessState,
}

impl PlaybackExecutor {
    pub fn new(
        process_id: impl Into<ProcessId>,
        timeline: Timeline,
        store: Arc<dyn TimelineStore>,
        opener: Arc<dyn DeviceOpener>,
        fade_step_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            process_id: process_id.into(),
            timeline,
            store,
            opener,
            fades: FadeCoordinator::new(fade_step_interval),
            cancel,
            state: ProcessState::ResolvingDevice,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    fn transition(&mut self, next: ProcessState) {
        debug!(
            process_id = %self.process_id,
            from = %self.state,
            to = %next,
            "Playback state change"
        );
        self.state = next;
    }

    fn finish(&mut self, outcome: PlaybackOutcome) -> PlaybackOutcome {
        self.transition(outcome.state());
        outcome
    }

    /// Run to a terminal state.
    pub async fn run(mut self) -> PlaybackOutcome {
        self.transition(ProcessState::ResolvingDevice);
        let resolved = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            resolved = self.resolve_device() => Some(resolved),
        };
        let path = match resolved {
            None => return self.finish(PlaybackOutcome::Cancelled),
            Some(Ok(path)) => path,
            Some(Err(e)) => return self.finish(PlaybackOutcome::Failed(e)),
        };

        self.transition(ProcessState::Connecting);
        let conn = match self.opener.open(&path).await {
            Ok(conn) => conn,
            Err(e) => return self.finish(PlaybackOutcome::Failed(e.into())),
        };
        let device: SharedConnection = Arc::new(Mutex::new(conn));

        self.transition(ProcessState::Running);
        info!(
            process_id = %self.process_id,
            timeline_id = %self.timeline.id,
            device = %path,
            frames = self.timeline.frames.len(),
            "Playing timeline"
        );
        let result = self.run_frames(&device).await;

        if let Err(e) = device.lock().await.close().await {
            warn!(process_id = %self.process_id, error = %e, "Failed to close DMX device");
        }

        let outcome = match result {
            Ok(FrameOutcome::Finished) => PlaybackOutcome::Completed,
            Ok(FrameOutcome::Cancelled) => PlaybackOutcome::Cancelled,
            Err(e) => PlaybackOutcome::Failed(e),
        };
        self.finish(outcome)
    }

    async fn resolve_device(&self) -> Result<String, PlaybackError> {
        if let Some(path) = self.timeline.device_path() {
            return Ok(path.to_string());
        }
        self.store
            .get_default_device_path()
            .await
            .map_err(|e| PlaybackError::Config(e.to_string()))
    }

    async fn run_frames(&self, device: &SharedConnection) -> Result<FrameOutcome, PlaybackError> {
        let mut channels = ChannelState::new();

        for (index, frame) in self.timeline.frames.iter().enumerate() {
            if self.cancel.is_cancelled() {
                debug!(process_id = %self.process_id, index, "Cancelled before frame");
                return Ok(FrameOutcome::Cancelled);
            }

            debug!(process_id = %self.process_id, index, kind = %frame.kind(), "Frame");
            let outcome = match frame {
                Frame::Scene { channels: values } => {
                    self.scene(values, &mut channels, device).await?
                }
                Frame::Fade { channels: values } => {
                    self.fades
                        .run(values, &mut channels, device, &self.cancel)
                        .await?
                }
                Frame::Sleep { sleep_seconds } => {
                    self.sleep(Duration::from_secs(*sleep_seconds)).await
                }
            };

            if outcome == FrameOutcome::Cancelled {
                return Ok(outcome);
            }
        }

        Ok(FrameOutcome::Finished)
    }

    /// Set every channel, then render once.
    async fn scene(
        &self,
        values: &[ChannelValue],
        channels: &mut ChannelState,
        device: &SharedConnection,
    ) -> Result<FrameOutcome, PlaybackError> {
        let mut conn = device.lock().await;
        for cv in values {
            conn.set_channel(cv.channel, cv.value)?;
            channels.set(cv.channel, cv.value);
        }
        conn.render().await?;
        Ok(FrameOutcome::Finished)
    }

    async fn sleep(&self, duration: Duration) -> FrameOutcome {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => FrameOutcome::Cancelled,
            _ = tokio::time::sleep(duration) => FrameOutcome::Finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::database::init_memory_pool;
    use crate::database::repositories::SqlxTimelineStore;
    use crate::device::{DeviceOp, MemoryOpener};

    const STEP: Duration = Duration::from_millis(1);

    async fn store() -> Arc<dyn TimelineStore> {
        Arc::new(SqlxTimelineStore::new(init_memory_pool().await.unwrap()))
    }

    fn executor(
        timeline: Timeline,
        store: Arc<dyn TimelineStore>,
        opener: &MemoryOpener,
        cancel: &CancellationToken,
    ) -> PlaybackExecutor {
        PlaybackExecutor::new(
            "p1",
            timeline,
            store,
            Arc::new(opener.clone()),
            STEP,
            cancel.clone(),
        )
    }

    #[tokio::test]
    async fn test_scene_sets_all_then_renders_once() {
        let opener = MemoryOpener::new();
        let timeline = Timeline::new(
            "scene",
            vec![Frame::scene(vec![
                ChannelValue::new(2, 255),
                ChannelValue::new(3, 140),
                ChannelValue::new(4, 25),
            ])],
        )
        .with_device_path("/dev/ttyUSB0");

        let outcome = executor(timeline, store().await, &opener, &CancellationToken::new())
            .run()
            .await;

        assert_eq!(outcome, PlaybackOutcome::Completed);
        let mem = opener.device("/dev/ttyUSB0");
        assert_eq!(
            mem.ops(),
            vec![
                DeviceOp::Set { channel: 2, value: 255 },
                DeviceOp::Set { channel: 3, value: 140 },
                DeviceOp::Set { channel: 4, value: 25 },
                DeviceOp::Render,
                DeviceOp::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_frames_run_in_order_and_fade_starts_from_scene() {
        let opener = MemoryOpener::new();
        let timeline = Timeline::new(
            "ordered",
            vec![
                Frame::scene(vec![ChannelValue::new(1, 250)]),
                Frame::fade(vec![ChannelValue::new(1, 253)]),
                Frame::scene(vec![ChannelValue::new(1, 7)]),
            ],
        )
        .with_device_path("/dev/ttyUSB0");

        let outcome = executor(timeline, store().await, &opener, &CancellationToken::new())
            .run()
            .await;

        assert_eq!(outcome, PlaybackOutcome::Completed);
        let mem = opener.device("/dev/ttyUSB0");
        assert_eq!(mem.set_history(1), vec![250, 251, 252, 253, 7]);
        assert_eq!(mem.rendered_value(1), 7);
        assert_eq!(mem.close_count(), 1);
    }

    #[tokio::test]
    async fn test_default_device_is_used_when_path_blank() {
        let opener = MemoryOpener::new();
        let store = store().await;
        store.set_default_device_path("/dev/ttyUSB7").await.unwrap();
        let timeline = Timeline::new("t", vec![Frame::scene(vec![ChannelValue::new(1, 1)])])
            .with_device_path("   ");

        let outcome = executor(timeline, store, &opener, &CancellationToken::new())
            .run()
            .await;

        assert_eq!(outcome, PlaybackOutcome::Completed);
        assert_eq!(opener.opened_paths(), vec!["/dev/ttyUSB7".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_default_fails_before_any_frame() {
        let opener = MemoryOpener::new();
        let timeline = Timeline::new("t", vec![Frame::scene(vec![ChannelValue::new(1, 1)])]);

        let outcome = executor(timeline, store().await, &opener, &CancellationToken::new())
            .run()
            .await;

        assert!(matches!(
            outcome,
            PlaybackOutcome::Failed(PlaybackError::Config(_))
        ));
        assert!(opener.opened_paths().is_empty());
    }

    #[tokio::test]
    async fn test_open_failure_is_connection_error() {
        let opener = MemoryOpener::new();
        opener.make_unavailable("/dev/ttyUSB9");
        let timeline = Timeline::new("t", vec![Frame::scene(vec![ChannelValue::new(1, 1)])])
            .with_device_path("/dev/ttyUSB9");

        let outcome = executor(timeline, store().await, &opener, &CancellationToken::new())
            .run()
            .await;

        assert!(matches!(
            outcome,
            PlaybackOutcome::Failed(PlaybackError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_render_failure_stops_remaining_frames() {
        let opener = MemoryOpener::new();
        opener.device("/dev/ttyUSB0").fail_renders_after(1);
        let timeline = Timeline::new(
            "t",
            vec![
                Frame::scene(vec![ChannelValue::new(1, 1)]),
                Frame::scene(vec![ChannelValue::new(1, 2)]),
                Frame::scene(vec![ChannelValue::new(1, 3)]),
            ],
        )
        .with_device_path("/dev/ttyUSB0");

        let outcome = executor(timeline, store().await, &opener, &CancellationToken::new())
            .run()
            .await;

        assert!(matches!(
            outcome,
            PlaybackOutcome::Failed(PlaybackError::Connection(_))
        ));
        let mem = opener.device("/dev/ttyUSB0");
        assert_eq!(mem.set_history(1), vec![1, 2]);
        assert_eq!(mem.close_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let opener = MemoryOpener::new();
        let cancel = CancellationToken::new();
        let timeline = Timeline::new(
            "t",
            vec![
                Frame::scene(vec![ChannelValue::new(1, 100)]),
                Frame::sleep(60),
                Frame::scene(vec![ChannelValue::new(1, 0)]),
            ],
        )
        .with_device_path("/dev/ttyUSB0");

        let exec = executor(timeline, store().await, &opener, &cancel);
        let started = Instant::now();
        let task = tokio::spawn(exec.run());

        let mem = opener.device("/dev/ttyUSB0");
        assert!(mem.wait_for(Duration::from_secs(2), |d| d.render_count() == 1).await);
        cancel.cancel();

        let outcome = task.await.unwrap();
        assert_eq!(outcome, PlaybackOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
        // The frame after the sleep never ran; values stay as last rendered.
        assert_eq!(mem.set_history(1), vec![100]);
        assert_eq!(mem.rendered_value(1), 100);
        assert_eq!(mem.close_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let opener = MemoryOpener::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let timeline = Timeline::new("t", vec![Frame::scene(vec![ChannelValue::new(1, 1)])])
            .with_device_path("/dev/ttyUSB0");

        let outcome = executor(timeline, store().await, &opener, &cancel)
            .run()
            .await;

        assert_eq!(outcome, PlaybackOutcome::Cancelled);
        assert!(opener.device("/dev/ttyUSB0").set_history(1).is_empty());
    }
}
