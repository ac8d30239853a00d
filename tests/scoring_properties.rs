use bucket_scoring::{BucketIndex, BucketKey, BucketSnapshot, BucketView, SourcePlatform, score};

const EPSILON: f64 = 1e-2;

fn single_bucket(miners: &[(&str, u64)]) -> BucketSnapshot {
    BucketSnapshot::from_buckets(
        1,
        vec![(
            BucketKey::new(SourcePlatform::Reddit, 0, 481_200),
            BucketView::from_miners(miners.iter().map(|(m, b)| (*m, *b))),
        )],
    )
}

#[test]
fn single_miner_bucket_scores_exact_bytes() {
    for bytes in [1u64, 7, 10_000, 987_654_321, u64::MAX / 3] {
        let scores = score(&single_bucket(&[("solo", bytes)])).unwrap();
        assert_eq!(scores.get("solo"), Some(bytes as f64));
    }
}

#[test]
fn worked_example_matches_hand_computed_shares() {
    // Three named miners plus a 6000-byte filler bring the bucket to 30000 bytes.
    let snapshot = single_bucket(&[
        ("a", 10_000),
        ("b", 9_000),
        ("c", 5_000),
        ("filler", 6_000),
    ]);
    let scores = score(&snapshot).unwrap();
    assert!((scores.get("a").unwrap() - 3_333.33).abs() < EPSILON);
    assert!((scores.get("b").unwrap() - 2_700.0).abs() < EPSILON);
    assert!((scores.get("c").unwrap() - 833.33).abs() < EPSILON);
    assert!((scores.get("filler").unwrap() - 1_200.0).abs() < EPSILON);
}

#[test]
fn three_miner_bucket_uses_its_own_total() {
    let scores = score(&single_bucket(&[("a", 10_000), ("b", 9_000), ("c", 5_000)])).unwrap();
    let total = 24_000.0;
    assert!((scores.get("a").unwrap() - 10_000.0 * 10_000.0 / total).abs() < 1e-6);
    assert!((scores.get("b").unwrap() - 9_000.0 * 9_000.0 / total).abs() < 1e-6);
    assert!((scores.get("c").unwrap() - 5_000.0 * 5_000.0 / total).abs() < 1e-6);
}

#[test]
fn split_identities_reproduce_the_documented_distortion() {
    // Six identities at 10000 bytes each join a bucket already holding 30000 bytes.
    let mut miners: Vec<(String, u64)> = (0..6).map(|i| (format!("sybil-{i}"), 10_000)).collect();
    miners.push(("others".to_string(), 30_000));
    let snapshot = BucketSnapshot::from_buckets(
        1,
        vec![(
            BucketKey::new(SourcePlatform::Reddit, 0, 481_200),
            BucketView::from_miners(miners),
        )],
    );
    assert_eq!(snapshot.total_bytes(), 90_000);

    let scores = score(&snapshot).unwrap();
    let operator_total: f64 = (0..6)
        .map(|i| scores.get(&format!("sybil-{i}")).unwrap())
        .inspect(|value| assert!((value - 1_111.11).abs() < EPSILON))
        .sum();
    assert!((operator_total - 6_666.67).abs() < EPSILON);
    // The honest bulk contributor is diluted by the inflated total.
    assert!((scores.get("others").unwrap() - 10_000.0).abs() < EPSILON);
}

#[test]
fn scoring_the_same_snapshot_twice_is_bit_identical() {
    let index = BucketIndex::new();
    for i in 0..500u64 {
        let miner = format!("m{}", i % 17);
        let source = SourcePlatform::ALL[(i % 3) as usize];
        index
            .record_contribution(&miner, source, (i % 5) as u32, (i % 4) as u32, 1 + i * 37 % 1_001)
            .unwrap();
    }
    let snapshot = index.snapshot();
    let first = score(&snapshot).unwrap();
    let second = score(&snapshot).unwrap();
    assert_eq!(first.len(), second.len());
    for ((miner_a, a), (miner_b, b)) in first.iter().zip(second.iter()) {
        assert_eq!(miner_a, miner_b);
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn late_contributions_to_a_large_bucket_earn_little() {
    let before = score(&single_bucket(&[("incumbent", 100_000), ("late", 1_000)])).unwrap();
    let fresh = score(&single_bucket(&[("late", 1_000)])).unwrap();
    assert!(before.get("late").unwrap() < 10.0);
    assert_eq!(fresh.get("late"), Some(1_000.0));
}
