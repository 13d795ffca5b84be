//! Time-ordered, expiring key-value storage.
//!
//! The monitor talks to its store only through [`TimeSeriesStore`]: every
//! read and write goes out as a [`Batch`] that the store applies atomically.
//! [`MemoryStore`] is an in-process implementation with sorted-set
//! semantics (members unique per bucket, updated in place) and per-bucket
//! time-to-live.

pub mod batch;
pub mod clock;
pub mod memory;

// Re-export commonly used types
pub use batch::{Batch, Reply, ScoredMember, StoreOp};
pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryStore;

use std::sync::Arc;
use std::time::Duration;

/// Store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The batch was rejected or only partially answered.
    #[error("batch failed: {0}")]
    BatchFailed(String),
    /// An operation in the batch was malformed; nothing was applied.
    #[error("invalid operation: {0}")]
    InvalidOp(String),
}

/// A store of scored buckets with expiry and atomic batches.
pub trait TimeSeriesStore: Send + Sync {
    /// Execute every operation of `batch` as one atomic unit.
    ///
    /// Replies come back in the order the operations were submitted.
    fn execute_batch(&self, batch: Batch) -> Result<Vec<Reply>, StoreError>;

    /// Insert or update `member` with `score`. Returns `true` on insert.
    fn upsert_scored(&self, key: &str, member: &str, score: i64) -> Result<bool, StoreError> {
        single(self.execute_batch(Batch::new().upsert_scored(key, member, score))?)?
            .into_upserted()
    }

    /// Set a relative time-to-live. Returns `false` if the bucket is missing.
    fn set_expiry(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        single(self.execute_batch(Batch::new().set_expiry(key, ttl))?)?.into_expiry_set()
    }

    fn range_by_score(&self, key: &str, min: i64) -> Result<Vec<ScoredMember>, StoreError> {
        single(self.execute_batch(Batch::new().range_by_score(key, min))?)?.into_range()
    }

    fn range_all(&self, key: &str) -> Result<Vec<ScoredMember>, StoreError> {
        single(self.execute_batch(Batch::new().range_all(key))?)?.into_range()
    }
}

fn single(replies: Vec<Reply>) -> Result<Reply, StoreError> {
    replies
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::BatchFailed("empty reply".to_string()))
}

impl<T: TimeSeriesStore + ?Sized> TimeSeriesStore for &T {
    fn execute_batch(&self, batch: Batch) -> Result<Vec<Reply>, StoreError> {
        (**self).execute_batch(batch)
    }
}

impl<T: TimeSeriesStore + ?Sized> TimeSeriesStore for Arc<T> {
    fn execute_batch(&self, batch: Batch) -> Result<Vec<Reply>, StoreError> {
        (**self).execute_batch(batch)
    }
}

impl<T: TimeSeriesStore + ?Sized> TimeSeriesStore for Box<T> {
    fn execute_batch(&self, batch: Batch) -> Result<Vec<Reply>, StoreError> {
        (**self).execute_batch(batch)
    }
}
