//! Repository layer.
//!
//! Async traits describing each store, with sqlx-backed implementations.

pub mod event;
pub mod timeline;

pub use event::{EventRepository, SqlxEventRepository};
pub use timeline::{SqlxTimelineStore, TimelineStore};
