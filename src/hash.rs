use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::constants::redaction::PSEUDONYM_SEED_OFFSET;

fn hash_pair<A: Hash + ?Sized, B: Hash + ?Sized>(first: &A, second: &B) -> u64 {
    let mut hasher = DefaultHasher::new();
    first.hash(&mut hasher);
    second.hash(&mut hasher);
    hasher.finish()
}

/// Pseudonym digest of `miner_id` under `seed` during `epoch`.
///
/// Deterministic for a given build; a new epoch yields unrelated digests.
pub fn pseudonym_digest(seed: u64, epoch: u64, miner_id: &str) -> u64 {
    let epoch_seed = hash_pair(&(seed ^ PSEUDONYM_SEED_OFFSET), &epoch);
    hash_pair(&epoch_seed, miner_id)
}
