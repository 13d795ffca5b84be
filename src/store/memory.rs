//! In-process scored-bucket store.
//!
//! Buckets map each member to its latest score, so re-inserting an identical
//! member updates it instead of adding a second entry. A bucket with an
//! expiry disappears once the store clock reaches it; expired buckets are
//! invisible to every operation and are dropped lazily on access or eagerly
//! through [`MemoryStore::purge_expired`].

use super::batch::{Batch, Reply, ScoredMember, StoreOp};
use super::clock::{Clock, SystemClock};
use super::{StoreError, TimeSeriesStore};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Bucket {
    members: HashMap<String, i64>,
    expires_at: Option<DateTime<Utc>>,
}

impl Bucket {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn sorted(&self, min: Option<i64>) -> Vec<ScoredMember> {
        let mut members: Vec<ScoredMember> = self
            .members
            .iter()
            .filter(|(_, score)| min.map_or(true, |min| **score >= min))
            .map(|(member, &score)| ScoredMember::new(member.clone(), score))
            .collect();
        members.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.member.cmp(&b.member)));
        members
    }
}

/// A batch operation that passed validation and can no longer fail.
enum Prepared {
    Upsert {
        key: String,
        member: String,
        score: i64,
    },
    Expire {
        key: String,
        at: DateTime<Utc>,
    },
    Range {
        key: String,
        min: Option<i64>,
    },
}

impl Prepared {
    fn key(&self) -> &str {
        match self {
            Prepared::Upsert { key, .. }
            | Prepared::Expire { key, .. }
            | Prepared::Range { key, .. } => key,
        }
    }
}

/// Scored buckets held in memory behind a single lock.
#[derive(Debug)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, Bucket>>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store measuring expiry against wall-clock time.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store measuring expiry against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            clock,
            available: AtomicBool::new(true),
        }
    }

    /// Take the store on- or offline. While offline every batch fails with
    /// [`StoreError::Unavailable`] and nothing is applied.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock()
            .map(|buckets| buckets.values().filter(|b| !b.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live bucket exists under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.lock()
            .map(|buckets| buckets.get(key).is_some_and(|b| !b.is_expired(now)))
            .unwrap_or(false)
    }

    /// Remaining time-to-live of a live bucket, or `None` if the bucket is
    /// missing or has no expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let buckets = self.lock().ok()?;
        let bucket = buckets.get(key).filter(|b| !b.is_expired(now))?;
        (bucket.expires_at? - now).to_std().ok()
    }

    /// Drop every expired bucket. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let Ok(mut buckets) = self.lock() else {
            return 0;
        };
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_expired(now));
        let removed = before - buckets.len();
        if removed > 0 {
            tracing::debug!(removed, "Purged expired buckets");
        }
        removed
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Bucket>>, StoreError> {
        self.buckets
            .lock()
            .map_err(|_| StoreError::BatchFailed("bucket lock poisoned".to_string()))
    }

    fn prepare(op: StoreOp, now: DateTime<Utc>) -> Result<Prepared, StoreError> {
        if op.key().is_empty() {
            return Err(StoreError::InvalidOp("empty bucket key".to_string()));
        }

        Ok(match op {
            StoreOp::UpsertScored { key, member, score } => Prepared::Upsert { key, member, score },
            StoreOp::SetExpiry { key, ttl } => {
                if ttl.is_zero() {
                    return Err(StoreError::InvalidOp(format!("zero ttl for {key}")));
                }
                let at = TimeDelta::from_std(ttl)
                    .ok()
                    .and_then(|ttl| now.checked_add_signed(ttl))
                    .ok_or_else(|| StoreError::InvalidOp(format!("ttl out of range for {key}")))?;
                Prepared::Expire { key, at }
            }
            StoreOp::RangeByScore { key, min } => Prepared::Range {
                key,
                min: Some(min),
            },
            StoreOp::RangeAll { key } => Prepared::Range { key, min: None },
        })
    }

    fn apply(buckets: &mut HashMap<String, Bucket>, op: Prepared, now: DateTime<Utc>) -> Reply {
        // An expired bucket behaves as if it never existed.
        if buckets.get(op.key()).is_some_and(|b| b.is_expired(now)) {
            buckets.remove(op.key());
        }

        match op {
            Prepared::Upsert { key, member, score } => {
                let bucket = buckets.entry(key).or_default();
                Reply::Upserted(bucket.members.insert(member, score).is_none())
            }
            Prepared::Expire { key, at } => match buckets.get_mut(&key) {
                Some(bucket) => {
                    bucket.expires_at = Some(at);
                    Reply::ExpirySet(true)
                }
                None => Reply::ExpirySet(false),
            },
            Prepared::Range { key, min } => Reply::Range(
                buckets
                    .get(&key)
                    .map(|bucket| bucket.sorted(min))
                    .unwrap_or_default(),
            ),
        }
    }
}

impl TimeSeriesStore for MemoryStore {
    fn execute_batch(&self, batch: Batch) -> Result<Vec<Reply>, StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }

        let now = self.clock.now();
        let prepared = batch
            .into_ops()
            .into_iter()
            .map(|op| Self::prepare(op, now))
            .collect::<Result<Vec<_>, _>>()?;

        let mut buckets = self.lock()?;
        Ok(prepared
            .into_iter()
            .map(|op| Self::apply(&mut buckets, op, now))
            .collect())
    }
}
