//! Atomic multi-operation batches and their replies.

use super::StoreError;
use std::time::Duration;

/// A single operation against a scored bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Insert `member` with `score`, or overwrite the score of an identical member.
    UpsertScored {
        key: String,
        member: String,
        score: i64,
    },
    /// Set or refresh the bucket's time-to-live.
    SetExpiry { key: String, ttl: Duration },
    /// Members with a score greater than or equal to `min`.
    RangeByScore { key: String, min: i64 },
    /// Every member of the bucket.
    RangeAll { key: String },
}

impl StoreOp {
    /// Key of the bucket this operation addresses.
    pub fn key(&self) -> &str {
        match self {
            StoreOp::UpsertScored { key, .. }
            | StoreOp::SetExpiry { key, .. }
            | StoreOp::RangeByScore { key, .. }
            | StoreOp::RangeAll { key } => key,
        }
    }
}

/// An ordered list of operations submitted together.
///
/// A store executes a batch in one round-trip: either every operation is
/// applied, in order, or none is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<StoreOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_scored(mut self, key: &str, member: &str, score: i64) -> Self {
        self.ops.push(StoreOp::UpsertScored {
            key: key.to_string(),
            member: member.to_string(),
            score,
        });
        self
    }

    pub fn set_expiry(mut self, key: &str, ttl: Duration) -> Self {
        self.ops.push(StoreOp::SetExpiry {
            key: key.to_string(),
            ttl,
        });
        self
    }

    pub fn range_by_score(mut self, key: &str, min: i64) -> Self {
        self.ops.push(StoreOp::RangeByScore {
            key: key.to_string(),
            min,
        });
        self
    }

    pub fn range_all(mut self, key: &str) -> Self {
        self.ops.push(StoreOp::RangeAll {
            key: key.to_string(),
        });
        self
    }

    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<StoreOp> {
        self.ops
    }
}

/// A bucket member together with its score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMember {
    pub member: String,
    pub score: i64,
}

impl ScoredMember {
    pub fn new(member: impl Into<String>, score: i64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}

/// Result of one operation in a batch, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `true` when the member was newly inserted rather than updated.
    Upserted(bool),
    /// `false` when the bucket did not exist.
    ExpirySet(bool),
    /// Members ordered by ascending score, ties broken by member.
    Range(Vec<ScoredMember>),
}

impl Reply {
    pub fn into_upserted(self) -> Result<bool, StoreError> {
        match self {
            Reply::Upserted(inserted) => Ok(inserted),
            other => Err(other.mismatch("upsert")),
        }
    }

    pub fn into_expiry_set(self) -> Result<bool, StoreError> {
        match self {
            Reply::ExpirySet(set) => Ok(set),
            other => Err(other.mismatch("expiry")),
        }
    }

    pub fn into_range(self) -> Result<Vec<ScoredMember>, StoreError> {
        match self {
            Reply::Range(members) => Ok(members),
            other => Err(other.mismatch("range")),
        }
    }

    fn mismatch(&self, expected: &str) -> StoreError {
        StoreError::BatchFailed(format!("expected {expected} reply, got {self:?}"))
    }
}
