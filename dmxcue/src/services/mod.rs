//! Service layer module.
//!
//! Wires repositories, the event log and the playback scheduler together and
//! manages their lifecycle.

pub mod container;

pub use container::ServiceContainer;
