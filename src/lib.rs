//! Activity Monitor - which users were recently active on a key.
//!
//! Users send *beacons* ("user performed an action on this key at this
//! time"), and the monitor answers "who was active in the trailing window?"
//! with a two-bucket sliding window over a time-ordered, expiring store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Activity Monitor                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  beacon ──▶ WindowResolver ──▶ [upsert, expire] ─┐          │
//! │                                                  ▼          │
//! │                                          TimeSeriesStore    │
//! │                                                  ▲          │
//! │  get_all ─▶ WindowResolver ──▶ [range, range] ───┘          │
//! │     │                                                       │
//! │     └──▶ dedup by (id, name) ──▶ HashSet<ActiveUser>        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use activity_monitor::{ActiveUser, ActivityMonitor, Config, MemoryStore};
//! use chrono::Utc;
//!
//! let monitor = ActivityMonitor::from_config(MemoryStore::new(), &Config::default())
//!     .expect("default config is valid");
//!
//! let now = Utc::now();
//! monitor.beacon("posts/1", now, 1, "John").expect("beacon");
//!
//! let users = monitor.get_all("posts/1", now).expect("query");
//! assert!(users.contains(&ActiveUser::new(1, "John")));
//! ```

pub mod config;
pub mod core;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use self::core::{
    ActiveUser, ActivityMonitor, JsonSerializer, MonitorError, Serializer, Window, WindowResolver,
};
pub use store::{Batch, MemoryStore, StoreError, TimeSeriesStore};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
