//! dmxcue library crate.
//!
//! Timeline playback for DMX512 lighting over USB serial interfaces, with an
//! HTTP API, SQLite persistence and an audit event log.

pub mod api;
pub mod config;
pub mod database;
pub mod device;
pub mod domain;
pub mod error;
pub mod events;
pub mod logging;
pub mod playback;
pub mod services;
pub mod system;

pub use error::{Error, Result};
