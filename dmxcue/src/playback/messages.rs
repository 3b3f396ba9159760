//! Requests accepted by the scheduler and the reports it publishes.

use std::fmt;

use crate::domain::Timeline;

use super::PlaybackError;

/// Identifier of one playback run. Unique per play request.
pub type ProcessId = String;

/// Start playing a timeline under a fresh process id.
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub process_id: ProcessId,
    pub timeline: Timeline,
    /// Address of the requester, recorded on the audit events.
    pub origin_ip: String,
}

impl PlayRequest {
    pub fn new(process_id: impl Into<ProcessId>, timeline: Timeline) -> Self {
        Self {
            process_id: process_id.into(),
            timeline,
            origin_ip: String::new(),
        }
    }

    pub fn with_origin(mut self, origin_ip: impl Into<String>) -> Self {
        self.origin_ip = origin_ip.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct StopRequest {
    pub process_id: ProcessId,
    pub origin_ip: String,
}

#[derive(Debug, Clone, Default)]
pub struct StopAllRequest {
    pub origin_ip: String,
}

/// Commands served by [`super::PlaybackScheduler::run`].
#[derive(Debug, Clone)]
pub enum PlaybackCommand {
    Play(PlayRequest),
    Stop(StopRequest),
    StopAll(StopAllRequest),
}

/// Executor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    ResolvingDevice,
    Connecting,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolvingDevice => "resolving_device",
            Self::Connecting => "connecting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a playback process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Cancelled,
    Failed(PlaybackError),
}

impl PlaybackOutcome {
    pub fn state(&self) -> ProcessState {
        match self {
            Self::Completed => ProcessState::Completed,
            Self::Cancelled => ProcessState::Cancelled,
            Self::Failed(_) => ProcessState::Failed,
        }
    }
}

/// Published once per finished process.
#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub process_id: ProcessId,
    pub timeline_id: String,
    pub outcome: PlaybackOutcome,
}
