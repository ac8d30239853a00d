//! Quadratic share scoring over bucket snapshots.
//!
//! A miner holding `b` of a bucket's `T` bytes earns `b² / T` scorable bytes from that
//! bucket. The dominant contributor in a bucket captures more than its linear share,
//! and bytes added on top of an already large bucket are worth little.
//!
//! Splitting one contribution across several identities in the same bucket is not
//! collapsed here: each identity is scored independently.

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::bucket_index::BucketSnapshot;
use crate::errors::ScoringError;
use crate::types::MinerId;

/// Scorable bytes earned by a miner holding `bytes` of a bucket totalling `total_bytes`.
///
/// Evaluated as `b * (b / T)` so a sole contributor (`b == T`) gets exactly `b` back.
pub fn scorable_bytes(bytes: u64, total_bytes: u64) -> f64 {
    let bytes = bytes as f64;
    bytes * (bytes / total_bytes as f64)
}

/// Total scorable bytes per miner for one snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MinerScores {
    scores: BTreeMap<MinerId, f64>,
}

impl MinerScores {
    /// Score for `miner_id`, if it contributed to any bucket.
    pub fn get(&self, miner_id: &str) -> Option<f64> {
        self.scores.get(miner_id).copied()
    }

    /// Scores in ascending miner order.
    pub fn iter(&self) -> btree_map::Iter<'_, MinerId, f64> {
        self.scores.iter()
    }

    /// Number of scored miners.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns `true` when no miner was scored.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Sum of every miner's score.
    pub fn total(&self) -> f64 {
        self.scores.values().sum()
    }

    /// Scores ordered by descending score, ties broken by ascending miner id.
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .scores
            .iter()
            .map(|(miner, score)| (miner.as_str(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    /// Consume into the underlying ordered map.
    pub fn into_inner(self) -> BTreeMap<MinerId, f64> {
        self.scores
    }
}

impl<'a> IntoIterator for &'a MinerScores {
    type Item = (&'a MinerId, &'a f64);
    type IntoIter = btree_map::Iter<'a, MinerId, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.scores.iter()
    }
}

/// Compute every miner's total scorable bytes from `snapshot`.
///
/// Buckets are visited in ascending key order and miners in ascending id order, so
/// repeated calls on the same snapshot produce bit-identical results. A bucket with a
/// zero total or a total that disagrees with its per-miner sum means the index was
/// corrupted upstream and aborts scoring.
pub fn score(snapshot: &BucketSnapshot) -> Result<MinerScores, ScoringError> {
    let mut scores: BTreeMap<MinerId, f64> = BTreeMap::new();
    for (key, view) in snapshot.iter() {
        let total = view.total_bytes();
        if total == 0 {
            return Err(ScoringError::InvariantViolation(format!(
                "{} bucket with zero total bytes",
                key.source
            )));
        }
        if !view.is_consistent() {
            return Err(ScoringError::InvariantViolation(format!(
                "{} bucket total does not match its per-miner sum",
                key.source
            )));
        }
        for (miner, bytes) in view.per_miner() {
            *scores.entry(miner.clone()).or_insert(0.0) += scorable_bytes(*bytes, total);
        }
    }
    Ok(MinerScores { scores })
}
