//! Fade frames.
//!
//! One ramp task per channel, stepping one value per interval and rendering
//! after every step. The frame finishes once every ramp has finished or seen
//! cancellation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::device::DeviceConnection;
use crate::domain::ChannelValue;

use super::PlaybackError;

/// A device connection shared between the executor and its ramp tasks.
pub type SharedConnection = Arc<Mutex<Box<dyn DeviceConnection>>>;

/// Last value written to each channel during one run.
///
/// Fades record their target here when scheduled, so a later frame sees the
/// target even if the ramp has not reached it yet.
#[derive(Debug, Default, Clone)]
pub struct ChannelState {
    values: HashMap<u16, u8>,
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known value, 0 if never set in this run.
    pub fn get(&self, channel: u16) -> u8 {
        self.values.get(&channel).copied().unwrap_or(0)
    }

    pub fn set(&mut self, channel: u16, value: u8) {
        self.values.insert(channel, value);
    }
}

/// How a frame ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Finished,
    Cancelled,
}

/// Runs fade frames.
#[derive(Debug, Clone)]
pub struct FadeCoordinator {
    step_interval: Duration,
}

impl FadeCoordinator {
    pub fn new(step_interval: Duration) -> Self {
        Self { step_interval }
    }

    /// Fade every channel in `channels` from its current state to its target.
    pub async fn run(
        &self,
        channels: &[ChannelValue],
        state: &mut ChannelState,
        device: &SharedConnection,
        cancel: &CancellationToken,
    ) -> Result<FrameOutcome, PlaybackError> {
        let frame_token = cancel.child_token();
        let mut ramps = JoinSet::new();

        for cv in channels {
            let initial = state.get(cv.channel);
            state.set(cv.channel, cv.value);
            if initial == cv.value {
                continue;
            }

            ramps.spawn(ramp(
                cv.channel,
                initial,
                cv.value,
                device.clone(),
                frame_token.clone(),
                self.step_interval,
            ));
        }

        let mut failure = None;
        while let Some(joined) = ramps.join_next().await {
            let result = joined.unwrap_or_else(|e| {
                Err(PlaybackError::Connection(format!("fade ramp aborted: {e}")))
            });
            if let Err(e) = result {
                // First failure stops the sibling ramps.
                frame_token.cancel();
                if failure.is_none() {
                    warn!(error = %e, "Fade ramp failed");
                    failure = Some(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None if cancel.is_cancelled() => Ok(FrameOutcome::Cancelled),
            None => Ok(FrameOutcome::Finished),
        }
    }
}

async fn ramp(
    channel: u16,
    initial: u8,
    target: u8,
    device: SharedConnection,
    cancel: CancellationToken,
    step_interval: Duration,
) -> Result<FrameOutcome, PlaybackError> {
    let mut value = initial;

    while value != target {
        if cancel.is_cancelled() {
            debug!(channel, value, "Fade ramp cancelled");
            return Ok(FrameOutcome::Cancelled);
        }

        value = if target > value { value + 1 } else { value - 1 };
        {
            let mut conn = device.lock().await;
            conn.set_channel(channel, value)?;
            conn.render().await?;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(channel, value, "Fade ramp cancelled");
                return Ok(FrameOutcome::Cancelled);
            }
            _ = tokio::time::sleep(step_interval) => {}
        }
    }

    Ok(FrameOutcome::Finished)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::device::{DeviceError, DeviceOp, DeviceOpener, MemoryOpener};

    const STEP: Duration = Duration::from_millis(1);

    async fn memory_connection(opener: &MemoryOpener) -> SharedConnection {
        Arc::new(Mutex::new(opener.open("/dev/mem0").await.unwrap()))
    }

    /// Cancels a token once `channel` has been set to `value`.
    struct CancelAt {
        inner: Box<dyn DeviceConnection>,
        value: u8,
        token: CancellationToken,
    }

    #[async_trait]
    impl DeviceConnection for CancelAt {
        fn set_channel(&mut self, channel: u16, value: u8) -> Result<(), DeviceError> {
            self.inner.set_channel(channel, value)?;
            if value == self.value {
                self.token.cancel();
            }
            Ok(())
        }

        async fn render(&mut self) -> Result<(), DeviceError> {
            self.inner.render().await
        }

        async fn close(&mut self) -> Result<(), DeviceError> {
            self.inner.close().await
        }
    }

    async fn cancel_at(
        opener: &MemoryOpener,
        value: u8,
        token: &CancellationToken,
    ) -> SharedConnection {
        let conn: Box<dyn DeviceConnection> = Box::new(CancelAt {
            inner: opener.open("/dev/mem0").await.unwrap(),
            value,
            token: token.clone(),
        });
        Arc::new(Mutex::new(conn))
    }

    #[tokio::test]
    async fn test_full_ramp_up() {
        let opener = MemoryOpener::new();
        let device = memory_connection(&opener).await;
        let mut state = ChannelState::new();

        let outcome = FadeCoordinator::new(STEP)
            .run(
                &[ChannelValue::new(1, 255)],
                &mut state,
                &device,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, FrameOutcome::Finished);
        let mem = opener.device("/dev/mem0");
        let history = mem.set_history(1);
        assert_eq!(history, (1..=255).collect::<Vec<u8>>());
        assert_eq!(mem.render_count(), 255);
        assert_eq!(mem.rendered_value(1), 255);

        // Every set is followed by its render.
        let ops = mem.ops();
        for pair in ops.chunks(2) {
            assert!(matches!(pair[0], DeviceOp::Set { channel: 1, .. }));
            assert_eq!(pair[1], DeviceOp::Render);
        }
    }

    #[tokio::test]
    async fn test_ramp_down_from_previous_state() {
        let opener = MemoryOpener::new();
        let device = memory_connection(&opener).await;
        let mut state = ChannelState::new();
        state.set(3, 10);

        FadeCoordinator::new(STEP)
            .run(
                &[ChannelValue::new(3, 5)],
                &mut state,
                &device,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(opener.device("/dev/mem0").set_history(3), vec![9, 8, 7, 6, 5]);
    }

    #[tokio::test]
    async fn test_equal_values_take_no_steps() {
        let opener = MemoryOpener::new();
        let device = memory_connection(&opener).await;
        let mut state = ChannelState::new();
        state.set(1, 40);

        let outcome = FadeCoordinator::new(STEP)
            .run(
                &[ChannelValue::new(1, 40), ChannelValue::new(2, 0)],
                &mut state,
                &device,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, FrameOutcome::Finished);
        let mem = opener.device("/dev/mem0");
        assert!(mem.ops().is_empty());
        assert_eq!(mem.render_count(), 0);
    }

    #[tokio::test]
    async fn test_target_recorded_before_ramp_finishes() {
        let opener = MemoryOpener::new();
        let process = CancellationToken::new();
        let device = cancel_at(&opener, 20, &process).await;
        let mut state = ChannelState::new();

        let outcome = FadeCoordinator::new(STEP)
            .run(&[ChannelValue::new(5, 200)], &mut state, &device, &process)
            .await
            .unwrap();

        assert_eq!(outcome, FrameOutcome::Cancelled);
        // The device stopped at 20, but the state already holds the target.
        assert_eq!(opener.device("/dev/mem0").rendered_value(5), 20);
        assert_eq!(state.get(5), 200);
    }

    #[tokio::test]
    async fn test_cancel_at_step_k_leaves_value_k() {
        let opener = MemoryOpener::new();
        let process = CancellationToken::new();
        let device = cancel_at(&opener, 42, &process).await;
        let mut state = ChannelState::new();

        let outcome = FadeCoordinator::new(STEP)
            .run(&[ChannelValue::new(1, 255)], &mut state, &device, &process)
            .await
            .unwrap();

        assert_eq!(outcome, FrameOutcome::Cancelled);
        let mem = opener.device("/dev/mem0");
        assert_eq!(mem.set_history(1), (1..=42).collect::<Vec<u8>>());
        assert_eq!(mem.rendered_value(1), 42);
    }

    #[tokio::test]
    async fn test_channels_ramp_concurrently() {
        let opener = MemoryOpener::new();
        let device = memory_connection(&opener).await;
        let mut state = ChannelState::new();

        FadeCoordinator::new(STEP)
            .run(
                &[ChannelValue::new(1, 30), ChannelValue::new(2, 30)],
                &mut state,
                &device,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let mem = opener.device("/dev/mem0");
        assert_eq!(mem.set_history(1).len(), 30);
        assert_eq!(mem.set_history(2).len(), 30);

        // Sets for the two channels interleave instead of running back to back.
        let sets: Vec<u16> = mem
            .ops()
            .into_iter()
            .filter_map(|op| match op {
                DeviceOp::Set { channel, .. } => Some(channel),
                _ => None,
            })
            .collect();
        let first_two = sets.iter().position(|c| *c == 2).unwrap();
        assert!(first_two < 30);
    }

    #[tokio::test]
    async fn test_render_failure_fails_frame() {
        let opener = MemoryOpener::new();
        let device = memory_connection(&opener).await;
        opener.device("/dev/mem0").fail_renders_after(3);
        let mut state = ChannelState::new();

        let err = FadeCoordinator::new(STEP)
            .run(
                &[ChannelValue::new(1, 100), ChannelValue::new(2, 100)],
                &mut state,
                &device,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PlaybackError::Connection(_)));
        assert_eq!(opener.device("/dev/mem0").render_count(), 3);
    }
}
