//! Aggregate, label-free statistics over bucket snapshots.
//!
//! Nothing here carries label or time bucket information, so results may be exported
//! without passing through redaction.

use std::collections::{BTreeMap, BTreeSet};

use crate::bucket_index::BucketSnapshot;
use crate::data::SourcePlatform;

/// Byte skew across source platforms.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceSkew {
    /// Bytes across every bucket.
    pub total_bytes: u128,
    /// Platforms with at least one byte.
    pub sources: usize,
    /// Bytes held by the smallest platform.
    pub min_bytes: u128,
    /// Bytes held by the largest platform.
    pub max_bytes: u128,
    /// Largest platform share in `0.0..=1.0`.
    pub max_share: f64,
    /// Smallest platform share in `0.0..=1.0`.
    pub min_share: f64,
    /// `max_bytes / min_bytes`.
    pub ratio: f64,
    /// Per-platform breakdown in platform order.
    pub per_source: Vec<SourceShare>,
}

/// Per-source share of aggregated bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceShare {
    /// Platform.
    pub source: SourcePlatform,
    /// Bytes aggregated for `source`.
    pub bytes: u128,
    /// Fraction of all bytes.
    pub share: f64,
}

/// Contributor coverage across buckets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BucketCoverage {
    /// Buckets in the snapshot.
    pub buckets: usize,
    /// Distinct miners across all buckets.
    pub miners: usize,
    /// Average distinct contributors per bucket.
    pub mean_contributors: f64,
    /// Buckets owned by one miner.
    pub single_contributor_buckets: usize,
}

/// Compute byte skew per source platform; `None` for an empty snapshot.
pub fn source_skew(snapshot: &BucketSnapshot) -> Option<SourceSkew> {
    let mut bytes_by_source: BTreeMap<SourcePlatform, u128> = BTreeMap::new();
    for (key, view) in snapshot.iter() {
        *bytes_by_source.entry(key.source).or_default() += u128::from(view.total_bytes());
    }
    if bytes_by_source.is_empty() {
        return None;
    }
    let total_bytes: u128 = bytes_by_source.values().sum();
    let sources = bytes_by_source.len();
    let min_bytes = bytes_by_source.values().copied().min().unwrap_or_default();
    let max_bytes = bytes_by_source.values().copied().max().unwrap_or_default();
    let share_of = |bytes: u128| {
        if total_bytes == 0 {
            0.0
        } else {
            bytes as f64 / total_bytes as f64
        }
    };
    let ratio = if min_bytes == 0 {
        f64::INFINITY
    } else {
        max_bytes as f64 / min_bytes as f64
    };
    let mut per_source: Vec<SourceShare> = bytes_by_source
        .iter()
        .map(|(source, bytes)| SourceShare {
            source: *source,
            bytes: *bytes,
            share: share_of(*bytes),
        })
        .collect();
    per_source.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.source.cmp(&b.source)));
    Some(SourceSkew {
        total_bytes,
        sources,
        min_bytes,
        max_bytes,
        max_share: share_of(max_bytes),
        min_share: share_of(min_bytes),
        ratio,
        per_source,
    })
}

/// Count buckets, distinct miners, and contributor density.
pub fn bucket_coverage(snapshot: &BucketSnapshot) -> BucketCoverage {
    let mut miners = BTreeSet::new();
    let mut contributor_slots = 0usize;
    let mut single_contributor_buckets = 0usize;
    for (_, view) in snapshot.iter() {
        contributor_slots += view.contributors();
        if view.contributors() == 1 {
            single_contributor_buckets += 1;
        }
        miners.extend(view.per_miner().keys().map(String::as_str));
    }
    let buckets = snapshot.len();
    BucketCoverage {
        buckets,
        miners: miners.len(),
        mean_contributors: if buckets == 0 {
            0.0
        } else {
            contributor_slots as f64 / buckets as f64
        },
        single_contributor_buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket_index::BucketView;
    use crate::data::BucketKey;

    fn snapshot() -> BucketSnapshot {
        BucketSnapshot::from_buckets(
            3,
            vec![
                (
                    BucketKey::new(SourcePlatform::Reddit, 0, 1),
                    BucketView::from_miners([("a", 40), ("b", 20)]),
                ),
                (
                    BucketKey::new(SourcePlatform::Reddit, 1, 1),
                    BucketView::from_miners([("a", 20)]),
                ),
                (
                    BucketKey::new(SourcePlatform::X, 0, 1),
                    BucketView::from_miners([("c", 40)]),
                ),
            ],
        )
    }

    #[test]
    fn source_skew_reports_imbalance() {
        let skew = source_skew(&snapshot()).expect("skew");
        assert_eq!(skew.total_bytes, 120);
        assert_eq!(skew.sources, 2);
        assert_eq!(skew.max_bytes, 80);
        assert_eq!(skew.min_bytes, 40);
        assert!((skew.ratio - 2.0).abs() < 1e-6);
        assert_eq!(skew.per_source[0].source, SourcePlatform::Reddit);
        assert!((skew.per_source[0].share - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn source_skew_is_none_for_empty_snapshots() {
        let empty = BucketSnapshot::from_buckets(0, Vec::new());
        assert_eq!(source_skew(&empty), None);
        assert_eq!(bucket_coverage(&empty), BucketCoverage::default());
    }

    #[test]
    fn coverage_counts_distinct_miners() {
        let coverage = bucket_coverage(&snapshot());
        assert_eq!(coverage.buckets, 3);
        assert_eq!(coverage.miners, 3);
        assert_eq!(coverage.single_contributor_buckets, 2);
        assert!((coverage.mean_contributors - 4.0 / 3.0).abs() < 1e-9);
    }
}
