//! Recording beacons and answering "who is active" queries.
//!
//! Each beacon lands in the bucket of the window containing its timestamp.
//! A query for time `t` looks at the trailing interval `[t - width, t]`,
//! which spans at most two buckets: the one containing `t - width`
//! (filtered by score) and the one containing `t` (read whole). Buckets
//! live for two widths after their last write, long enough to serve as the
//! previous bucket of any query that can still reach them.

use super::user::{ActiveUser, JsonSerializer, SerializationError, Serializer};
use super::window::{ticks, WindowResolver};
use crate::config::{Config, ConfigError};
use crate::store::{Batch, Reply, StoreError, TimeSeriesStore};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::time::Duration;

/// Errors returned by [`ActivityMonitor`] calls.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("activity key must not be empty")]
    EmptyKey,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("batch failed: {0}")]
    BatchFailed(String),
    #[error("query time {0} is too close to the earliest representable time")]
    TimeOutOfRange(DateTime<Utc>),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

impl From<StoreError> for MonitorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => MonitorError::StoreUnavailable(msg),
            StoreError::BatchFailed(msg) | StoreError::InvalidOp(msg) => {
                MonitorError::BatchFailed(msg)
            }
        }
    }
}

/// Tracks which users were recently active on each activity key.
///
/// The monitor holds no mutable state of its own; all state lives in the
/// injected store, and every call is a single atomic batch against it.
#[derive(Debug)]
pub struct ActivityMonitor<S, Z = JsonSerializer> {
    store: S,
    serializer: Z,
    resolver: WindowResolver,
}

impl<S: TimeSeriesStore> ActivityMonitor<S> {
    /// Create a monitor storing users as JSON.
    pub fn new(store: S, resolver: WindowResolver) -> Self {
        Self::with_serializer(store, resolver, JsonSerializer)
    }

    /// Create a monitor from configuration.
    pub fn from_config(store: S, config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(store, config.resolver()?))
    }
}

impl<S: TimeSeriesStore, Z: Serializer> ActivityMonitor<S, Z> {
    pub fn with_serializer(store: S, resolver: WindowResolver, serializer: Z) -> Self {
        Self {
            store,
            serializer,
            resolver,
        }
    }

    pub fn resolver(&self) -> &WindowResolver {
        &self.resolver
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Time-to-live given to a bucket on every write.
    pub fn bucket_ttl(&self) -> Duration {
        Duration::from_secs(2 * u64::from(self.resolver.width_secs()))
    }

    /// Record that a user was active on `key` at `time`.
    ///
    /// The user is upserted into the current window's bucket with the
    /// timestamp's ticks as score, and the bucket's expiry is refreshed, in
    /// one batch.
    pub fn beacon<Tz: TimeZone>(
        &self,
        key: &str,
        time: DateTime<Tz>,
        user_id: i32,
        user_name: &str,
    ) -> Result<(), MonitorError> {
        if key.is_empty() {
            return Err(MonitorError::EmptyKey);
        }

        let time = time.with_timezone(&Utc);
        let window = self.resolver.resolve(key, time);
        let member = self
            .serializer
            .serialize(&ActiveUser::new(user_id, user_name))?;

        // Upsert first: if the store cannot apply both atomically, a bucket
        // without expiry is the failure we can live with.
        let batch = Batch::new()
            .upsert_scored(window.store_key(), &member, ticks(time))
            .set_expiry(window.store_key(), self.bucket_ttl());

        let replies = self.store.execute_batch(batch)?;
        if replies.len() != 2 {
            return Err(MonitorError::BatchFailed(format!(
                "beacon expected 2 replies, got {}",
                replies.len()
            )));
        }

        tracing::debug!(
            "Beacon from user {} ({}) on {} into {}",
            user_id,
            user_name,
            key,
            window.store_key()
        );
        Ok(())
    }

    /// Every distinct user active on `key` in the trailing window ending at
    /// `time`.
    ///
    /// Members that cannot be deserialized are skipped.
    pub fn get_all<Tz: TimeZone>(
        &self,
        key: &str,
        time: DateTime<Tz>,
    ) -> Result<HashSet<ActiveUser>, MonitorError> {
        let time = time.with_timezone(&Utc);
        let slide_start = time
            .checked_sub_signed(self.resolver.width())
            .ok_or(MonitorError::TimeOutOfRange(time))?;

        let previous = self.resolver.resolve(key, slide_start);
        let current = self.resolver.resolve(key, time);

        let batch = Batch::new()
            .range_by_score(previous.store_key(), ticks(slide_start))
            .range_all(current.store_key());

        let replies = self.store.execute_batch(batch)?;
        let Ok([previous_reply, current_reply]) = <[Reply; 2]>::try_from(replies) else {
            return Err(MonitorError::BatchFailed(
                "query expected 2 replies".to_string(),
            ));
        };

        let mut users = HashSet::new();
        self.collect(&mut users, previous_reply)?;
        self.collect(&mut users, current_reply)?;

        tracing::debug!(
            "{} active users on {} between {} and {}",
            users.len(),
            key,
            slide_start,
            time
        );
        Ok(users)
    }

    fn collect(&self, users: &mut HashSet<ActiveUser>, reply: Reply) -> Result<(), MonitorError> {
        for entry in reply.into_range()? {
            // The score is the beacon time; only membership matters here.
            match self.serializer.deserialize(&entry.member) {
                Ok(user) => {
                    users.insert(user);
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable member {:?}: {}", entry.member, e);
                }
            }
        }
        Ok(())
    }
}
