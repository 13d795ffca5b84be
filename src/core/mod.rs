//! Core functionality for the activity monitor.
//!
//! This module contains:
//! - The active user record and its stored form
//! - Window resolution for mapping timestamps onto buckets
//! - The monitor recording beacons and answering active-user queries

pub mod monitor;
pub mod user;
pub mod window;

// Re-export commonly used types
pub use monitor::{ActivityMonitor, MonitorError};
pub use user::{ActiveUser, JsonSerializer, SerializationError, Serializer};
pub use window::{ticks, Window, WindowResolver};
