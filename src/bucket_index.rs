use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::data::{BucketKey, SourcePlatform};
use crate::errors::ScoringError;
use crate::types::{LabelId, MinerId, TimeBucketId};

/// Live aggregate for one bucket, mutated only under its own lock.
#[derive(Debug, Default)]
struct BucketAggregate {
    total_bytes: u64,
    per_miner: HashMap<MinerId, u64>,
}

impl BucketAggregate {
    fn apply(&mut self, miner_id: &str, size_bytes: u64) -> Result<(), ScoringError> {
        // Compute both new totals before mutating so an overflow leaves no partial update.
        let total = self
            .total_bytes
            .checked_add(size_bytes)
            .ok_or_else(|| ScoringError::ResourceExhaustion("bucket byte total overflow".into()))?;
        match self.per_miner.get_mut(miner_id) {
            Some(bytes) => {
                *bytes = bytes.checked_add(size_bytes).ok_or_else(|| {
                    ScoringError::ResourceExhaustion("miner byte total overflow".into())
                })?;
            }
            None => {
                self.per_miner
                    .try_reserve(1)
                    .map_err(|err| ScoringError::ResourceExhaustion(err.to_string()))?;
                self.per_miner.insert(miner_id.to_string(), size_bytes);
            }
        }
        self.total_bytes = total;
        Ok(())
    }

    fn view(&self) -> BucketView {
        BucketView {
            total_bytes: self.total_bytes,
            per_miner: self
                .per_miner
                .iter()
                .map(|(miner, bytes)| (miner.clone(), *bytes))
                .collect(),
        }
    }
}

/// Concurrent per-bucket byte aggregation.
///
/// Each bucket sits behind its own mutex so unrelated buckets update in parallel.
/// Writers hold the shared side of `gate` for the duration of one bucket update;
/// `snapshot` takes the exclusive side, which waits only for in-flight updates and
/// yields a cut where every contribution is either fully present or absent.
#[derive(Debug, Default)]
pub struct BucketIndex {
    buckets: DashMap<BucketKey, Arc<Mutex<BucketAggregate>>>,
    gate: RwLock<()>,
    applied: AtomicU64,
}

impl BucketIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `size_bytes` from `miner_id` to the addressed bucket, creating it if needed.
    pub fn record_contribution(
        &self,
        miner_id: &str,
        source: SourcePlatform,
        label_id: LabelId,
        time_bucket_id: TimeBucketId,
        size_bytes: u64,
    ) -> Result<(), ScoringError> {
        if size_bytes == 0 {
            return Err(ScoringError::invalid("content size must be positive"));
        }
        let key = BucketKey::new(source, label_id, time_bucket_id);

        let _gate = self.gate.read();
        let bucket = self.bucket_for(key);
        bucket.lock().apply(miner_id, size_bytes)?;
        self.applied.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Return a consistent, read-only copy of every bucket.
    pub fn snapshot(&self) -> BucketSnapshot {
        let _gate = self.gate.write();
        let buckets = self
            .buckets
            .iter()
            .map(|entry| (*entry.key(), entry.value().lock().view()))
            .collect();
        BucketSnapshot {
            version: self.applied.load(Ordering::Relaxed),
            taken_at: Utc::now(),
            buckets,
        }
    }

    /// Number of buckets created so far.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of contributions applied so far.
    pub fn contributions(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    fn bucket_for(&self, key: BucketKey) -> Arc<Mutex<BucketAggregate>> {
        if let Some(existing) = self.buckets.get(&key) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.buckets
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(BucketAggregate::default())))
                .value(),
        )
    }
}

/// Read-only state of one bucket inside a snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BucketView {
    total_bytes: u64,
    per_miner: BTreeMap<MinerId, u64>,
}

impl BucketView {
    /// Build a view from explicit parts without validation.
    ///
    /// Used to replay externally persisted aggregates; the scorer re-checks the
    /// total invariant before scoring.
    pub fn from_parts(total_bytes: u64, per_miner: BTreeMap<MinerId, u64>) -> Self {
        Self {
            total_bytes,
            per_miner,
        }
    }

    /// Build a view whose total is the sum of `per_miner`.
    pub fn from_miners<I, M>(per_miner: I) -> Self
    where
        I: IntoIterator<Item = (M, u64)>,
        M: Into<MinerId>,
    {
        let mut miners: BTreeMap<MinerId, u64> = BTreeMap::new();
        for (miner, bytes) in per_miner {
            let entry = miners.entry(miner.into()).or_default();
            *entry = entry.saturating_add(bytes);
        }
        let total_bytes = miners
            .values()
            .fold(0u64, |total, bytes| total.saturating_add(*bytes));
        Self::from_parts(total_bytes, miners)
    }

    /// Total bytes in the bucket.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Per-miner byte totals in ascending miner order.
    pub fn per_miner(&self) -> &BTreeMap<MinerId, u64> {
        &self.per_miner
    }

    /// Bytes contributed by `miner_id`, if any.
    pub fn bytes_for(&self, miner_id: &str) -> Option<u64> {
        self.per_miner.get(miner_id).copied()
    }

    /// Number of distinct miners that contributed.
    pub fn contributors(&self) -> usize {
        self.per_miner.len()
    }

    /// Returns `true` when the total equals the sum of per-miner bytes.
    pub fn is_consistent(&self) -> bool {
        let sum: u128 = self.per_miner.values().map(|bytes| u128::from(*bytes)).sum();
        sum == u128::from(self.total_bytes)
    }
}

/// Point-in-time copy of a `BucketIndex`.
#[derive(Clone, Debug)]
pub struct BucketSnapshot {
    version: u64,
    taken_at: DateTime<Utc>,
    buckets: BTreeMap<BucketKey, BucketView>,
}

impl BucketSnapshot {
    /// Assemble a snapshot from explicit bucket views.
    pub fn from_buckets<I>(version: u64, buckets: I) -> Self
    where
        I: IntoIterator<Item = (BucketKey, BucketView)>,
    {
        Self {
            version,
            taken_at: Utc::now(),
            buckets: buckets.into_iter().collect(),
        }
    }

    /// Number of contributions reflected in this snapshot.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Wall-clock time the snapshot was taken.
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// View of one bucket, if present.
    pub fn bucket(&self, key: &BucketKey) -> Option<&BucketView> {
        self.buckets.get(key)
    }

    /// Buckets in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &BucketView)> {
        self.buckets.iter()
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns `true` when no bucket exists.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sum of every bucket total.
    pub fn total_bytes(&self) -> u128 {
        self.buckets
            .values()
            .map(|view| u128::from(view.total_bytes))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contributions_accumulate_per_miner() {
        let index = BucketIndex::new();
        index
            .record_contribution("m1", SourcePlatform::Reddit, 0, 7, 100)
            .unwrap();
        index
            .record_contribution("m1", SourcePlatform::Reddit, 0, 7, 50)
            .unwrap();
        index
            .record_contribution("m2", SourcePlatform::Reddit, 0, 7, 25)
            .unwrap();
        index
            .record_contribution("m2", SourcePlatform::X, 0, 7, 10)
            .unwrap();

        let snapshot = index.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.version(), 4);
        let view = snapshot
            .bucket(&BucketKey::new(SourcePlatform::Reddit, 0, 7))
            .unwrap();
        assert_eq!(view.total_bytes(), 175);
        assert_eq!(view.bytes_for("m1"), Some(150));
        assert_eq!(view.bytes_for("m2"), Some(25));
        assert!(view.is_consistent());
        assert_eq!(snapshot.total_bytes(), 185);
    }

    #[test]
    fn zero_byte_contributions_are_rejected() {
        let index = BucketIndex::new();
        let err = index
            .record_contribution("m1", SourcePlatform::Reddit, 0, 0, 0)
            .unwrap_err();
        assert!(matches!(err, ScoringError::InvalidSubmission { .. }));
        assert_eq!(index.bucket_count(), 0);
    }

    #[test]
    fn overflow_leaves_bucket_untouched() {
        let index = BucketIndex::new();
        index
            .record_contribution("m1", SourcePlatform::YouTube, 1, 1, u64::MAX - 1)
            .unwrap();
        let err = index
            .record_contribution("m2", SourcePlatform::YouTube, 1, 1, 2)
            .unwrap_err();
        assert!(matches!(err, ScoringError::ResourceExhaustion(_)));

        let snapshot = index.snapshot();
        let view = snapshot
            .bucket(&BucketKey::new(SourcePlatform::YouTube, 1, 1))
            .unwrap();
        assert_eq!(view.contributors(), 1);
        assert_eq!(view.total_bytes(), u64::MAX - 1);
        assert_eq!(snapshot.version(), 1);
    }

    #[test]
    fn snapshots_do_not_observe_later_writes() {
        let index = BucketIndex::new();
        index
            .record_contribution("m1", SourcePlatform::Reddit, 3, 3, 10)
            .unwrap();
        let before = index.snapshot();
        index
            .record_contribution("m1", SourcePlatform::Reddit, 3, 3, 10)
            .unwrap();
        let key = BucketKey::new(SourcePlatform::Reddit, 3, 3);
        assert_eq!(before.bucket(&key).unwrap().total_bytes(), 10);
        assert_eq!(index.snapshot().bucket(&key).unwrap().total_bytes(), 20);
    }

    #[test]
    fn from_miners_merges_duplicate_entries() {
        let view = BucketView::from_miners([("a", 5), ("b", 3), ("a", 2)]);
        assert_eq!(view.total_bytes(), 10);
        assert_eq!(view.bytes_for("a"), Some(7));
        assert!(view.is_consistent());
        assert!(!BucketView::from_parts(11, view.per_miner().clone()).is_consistent());
    }
}
