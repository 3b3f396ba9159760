//! Audit event log.
//!
//! Lifecycle events (timeline CRUD, playback start/stop/error, config changes,
//! system start/stop) are appended through an [`EventSink`]. Appending never
//! fails and never blocks the caller: the database sink hands the insert to the
//! runtime and logs failures.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::database::repositories::EventRepository;

/// Default event retention (30 days).
pub const DEFAULT_EVENT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default channel capacity for the live event stream.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Kinds of audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TimelineCreated,
    TimelineUpdated,
    TimelineDeleted,
    TimelineStarted,
    TimelineStopped,
    AllTimelinesStopped,
    TimelineError,
    ConfigUpdated,
    SystemStartup,
    SystemShutdown,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        Self::TimelineCreated,
        Self::TimelineUpdated,
        Self::TimelineDeleted,
        Self::TimelineStarted,
        Self::TimelineStopped,
        Self::AllTimelinesStopped,
        Self::TimelineError,
        Self::ConfigUpdated,
        Self::SystemStartup,
        Self::SystemShutdown,
    ];

    /// Stable name stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimelineCreated => "timeline_created",
            Self::TimelineUpdated => "timeline_updated",
            Self::TimelineDeleted => "timeline_deleted",
            Self::TimelineStarted => "timeline_started",
            Self::TimelineStopped => "timeline_stopped",
            Self::AllTimelinesStopped => "all_timelines_stopped",
            Self::TimelineError => "timeline_error",
            Self::ConfigUpdated => "config_updated",
            Self::SystemStartup => "system_startup",
            Self::SystemShutdown => "system_shutdown",
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TimelineCreated => "Timeline created",
            Self::TimelineUpdated => "Timeline updated",
            Self::TimelineDeleted => "Timeline deleted",
            Self::TimelineStarted => "Timeline started",
            Self::TimelineStopped => "Timeline stopped",
            Self::AllTimelinesStopped => "All Timelines stopped",
            Self::TimelineError => "Timeline error",
            Self::ConfigUpdated => "Config updated",
            Self::SystemStartup => "System startup",
            Self::SystemShutdown => "System Shutdown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A stored audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub id: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub kind: String,
    pub detail: String,
    pub origin_ip: String,
}

impl EventRecord {
    pub fn new(kind: EventKind, detail: &str, origin_ip: &str, retention: Duration) -> Self {
        let created = Utc::now();
        let expires = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|d| created.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created,
            expires,
            kind: kind.as_str().to_string(),
            detail: detail.to_string(),
            origin_ip: origin_ip.to_string(),
        }
    }

    /// Parsed kind, if the stored name is known.
    pub fn event_kind(&self) -> Option<EventKind> {
        EventKind::parse(&self.kind)
    }
}

/// Append-only audit log.
pub trait EventSink: Send + Sync {
    /// Append an event. Must not block and must not fail.
    fn append(&self, kind: EventKind, detail: &str, origin_ip: &str, retention: Duration);

    /// Retention applied by [`EventSink::record`].
    fn default_retention(&self) -> Duration {
        DEFAULT_EVENT_RETENTION
    }

    /// Append an event with the default retention.
    fn record(&self, kind: EventKind, detail: &str, origin_ip: &str) {
        self.append(kind, detail, origin_ip, self.default_retention());
    }
}

/// Event sink backed by an [`EventRepository`].
///
/// Inserts run on the tokio runtime; every event is also published on a
/// broadcast channel for live subscribers.
pub struct DbEventSink {
    repo: Arc<dyn EventRepository>,
    sender: broadcast::Sender<EventRecord>,
    retention: Duration,
}

impl DbEventSink {
    pub fn new(repo: Arc<dyn EventRepository>, retention: Duration) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
        Self {
            repo,
            sender,
            retention,
        }
    }

    /// Subscribe to appended events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }
}

impl EventSink for DbEventSink {
    fn append(&self, kind: EventKind, detail: &str, origin_ip: &str, retention: Duration) {
        let record = EventRecord::new(kind, detail, origin_ip, retention);
        tracing::debug!(kind = kind.as_str(), origin_ip, "{}: {}", kind.label(), detail);

        // No receivers is fine.
        let _ = self.sender.send(record.clone());

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(kind = kind.as_str(), "No runtime available, event dropped");
            return;
        };

        let repo = self.repo.clone();
        handle.spawn(async move {
            if let Err(e) = repo.insert(&record).await {
                tracing::warn!(kind = %record.kind, error = %e, "Failed to persist event");
            }
        });
    }

    fn default_retention(&self) -> Duration {
        self.retention
    }
}

/// In-memory event sink.
#[derive(Default, Clone)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<EventRecord>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().clone()
    }

    /// Kinds of all appended events, oldest first.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events
            .lock()
            .iter()
            .filter_map(EventRecord::event_kind)
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    /// Poll until `predicate` holds, giving up after two seconds.
    pub async fn wait_until(&self, predicate: impl Fn(&Self) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !predicate(self) {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        true
    }
}

impl EventSink for MemoryEventSink {
    fn append(&self, kind: EventKind, detail: &str, origin_ip: &str, retention: Duration) {
        let record = EventRecord::new(kind, detail, origin_ip, retention);
        self.events.lock().push(record);
    }
}
