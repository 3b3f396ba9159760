//! Database models.
//!
//! Row-shaped structs mapped with `sqlx::FromRow`, plus conversions to and
//! from the domain types.

pub mod config;
pub mod event;
pub mod timeline;

pub use config::{ConfigKey, SystemConfigDbModel};
pub use event::EventDbModel;
pub use timeline::TimelineDbModel;
