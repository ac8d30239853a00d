use std::sync::Arc;
use std::thread;

use tempfile::tempdir;

use bucket_scoring::{
    FileLabelStore, IngestionConfig, IngestionManager, LabelInterner, LabelStore, Outcome,
    SourcePlatform, SubmissionRecord,
};

#[test]
fn ids_survive_a_restart_in_insertion_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("labels.bin");

    let original: Vec<(String, u32)> = {
        let store = Arc::new(FileLabelStore::open(&path).unwrap());
        let interner = LabelInterner::open(store, 1_024).unwrap();
        ["#zeta", "r/alpha", "#mid", "r/alpha"]
            .iter()
            .map(|label| (label.to_string(), interner.get_or_insert(label).unwrap()))
            .collect()
    };
    assert_eq!(original[1].1, original[3].1);

    let store = Arc::new(FileLabelStore::open(&path).unwrap());
    let reopened = LabelInterner::open(store, 1_024).unwrap();
    assert_eq!(reopened.size(), 3);
    for (label, id) in &original {
        assert_eq!(&*reopened.get_by_id(*id).unwrap(), label.as_str());
        assert_eq!(reopened.get_or_insert(label).unwrap(), *id);
    }
    assert_eq!(reopened.get_or_insert("#new").unwrap(), 3);
}

#[test]
fn concurrent_inserts_persist_in_id_order() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FileLabelStore::open(dir.path()).unwrap());
    let interner = Arc::new(LabelInterner::open(store.clone(), 1_024).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let interner = Arc::clone(&interner);
            thread::spawn(move || {
                for i in 0..25 {
                    interner.get_or_insert(&format!("label-{}", (t * 13 + i) % 40)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let persisted = store.load_labels().unwrap();
    assert_eq!(persisted.len(), interner.size());
    for (id, label) in persisted.iter().enumerate() {
        assert_eq!(&*interner.get_by_id(id as u32).unwrap(), label.as_str());
    }
}

#[test]
fn persisted_ids_keep_submissions_by_id_valid_after_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("labels.bin");
    let label_id = {
        let store = Arc::new(FileLabelStore::open(&path).unwrap());
        let labels = Arc::new(LabelInterner::open(store, 1_024).unwrap());
        labels.get_or_insert("#persisted").unwrap()
    };

    let store = Arc::new(FileLabelStore::open(&path).unwrap());
    let labels = Arc::new(LabelInterner::open(store, 1_024).unwrap());
    let manager = IngestionManager::with_components(
        labels,
        Arc::new(bucket_scoring::BucketIndex::new()),
        IngestionConfig::default(),
    )
    .unwrap();
    let record = SubmissionRecord::new("uid-9", SourcePlatform::YouTube, label_id, 12, 64);
    assert_eq!(manager.submit(&record).unwrap(), Outcome::Accepted);
}

#[test]
fn reopening_with_a_smaller_limit_is_a_configuration_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("labels.bin");
    {
        let store = Arc::new(FileLabelStore::open(&path).unwrap());
        let interner = LabelInterner::open(store, 8).unwrap();
        interner.get_or_insert("a").unwrap();
        interner.get_or_insert("b").unwrap();
    }
    let store = Arc::new(FileLabelStore::open(&path).unwrap());
    assert!(matches!(
        LabelInterner::open(store, 1),
        Err(bucket_scoring::ScoringError::Configuration(_))
    ));
}
