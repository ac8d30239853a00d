//! Append-only label interner with a lock-free hit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::constants::labels::DEFAULT_MAX_LABELS;
use crate::errors::ScoringError;
use crate::label_store::LabelStore;
use crate::types::LabelId;

/// Process-scoped label interner shared by every ingestion worker.
///
/// `labels` is an append-only sequence indexed by id and `ids` maps text back to its
/// id; both are readable without locks. Only the insertion of a new label takes
/// `insert_lock`, re-checks `ids` under it, and appends in O(1) amortized time.
///
/// A new label is pushed to `labels` before it is published in `ids`, and `len` is
/// bumped last, so any id a reader can observe already resolves to its text.
pub struct LabelInterner {
    labels: boxcar::Vec<Arc<str>>,
    ids: papaya::HashMap<Arc<str>, LabelId>,
    len: AtomicUsize,
    insert_lock: Mutex<()>,
    store: Option<Arc<dyn LabelStore>>,
    max_labels: usize,
}

impl std::fmt::Debug for LabelInterner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelInterner")
            .field("size", &self.size())
            .field("max_labels", &self.max_labels)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl Default for LabelInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelInterner {
    /// Create an empty, non-persistent interner.
    pub fn new() -> Self {
        Self::with_capacity_limit(DEFAULT_MAX_LABELS)
    }

    /// Create an empty, non-persistent interner holding at most `max_labels` labels.
    pub fn with_capacity_limit(max_labels: usize) -> Self {
        Self::empty(None, max_labels)
    }

    fn empty(store: Option<Arc<dyn LabelStore>>, max_labels: usize) -> Self {
        Self {
            labels: boxcar::Vec::new(),
            ids: papaya::HashMap::new(),
            len: AtomicUsize::new(0),
            insert_lock: Mutex::new(()),
            store,
            max_labels,
        }
    }

    /// Reload the label table from `store` in insertion order and persist new labels to it.
    pub fn open(store: Arc<dyn LabelStore>, max_labels: usize) -> Result<Self, ScoringError> {
        let persisted = store.load_labels()?;
        if persisted.len() > max_labels {
            return Err(ScoringError::Configuration(format!(
                "label store holds {} labels, above the limit of {max_labels}",
                persisted.len()
            )));
        }
        let interner = Self::empty(Some(store), max_labels);
        {
            let ids = interner.ids.pin();
            for (position, text) in persisted.into_iter().enumerate() {
                let id = LabelId::try_from(position).map_err(|_| {
                    ScoringError::ResourceExhaustion("label id space exhausted".into())
                })?;
                let text: Arc<str> = Arc::from(text);
                if ids.insert(Arc::clone(&text), id).is_some() {
                    return Err(ScoringError::LabelStore(format!(
                        "label store holds a duplicate entry at id {id}"
                    )));
                }
                interner.labels.push(text);
            }
            interner.len.store(interner.labels.count(), Ordering::Release);
        }
        debug!(labels = interner.size(), "label table reloaded");
        Ok(interner)
    }

    /// Return the id for `text`, assigning the next id if it was never seen.
    pub fn get_or_insert(&self, text: &str) -> Result<LabelId, ScoringError> {
        if let Some(id) = self.ids.pin().get(text).copied() {
            return Ok(id);
        }

        let _guard = self.insert_lock.lock();
        let ids = self.ids.pin();
        // Another writer may have inserted `text` between the fast path and the lock.
        if let Some(id) = ids.get(text).copied() {
            return Ok(id);
        }
        let len = self.len.load(Ordering::Acquire);
        if len >= self.max_labels {
            return Err(ScoringError::ResourceExhaustion(format!(
                "label limit of {} reached",
                self.max_labels
            )));
        }
        let id = LabelId::try_from(len)
            .map_err(|_| ScoringError::ResourceExhaustion("label id space exhausted".into()))?;
        if let Some(store) = &self.store {
            store.append_label(id, text)?;
        }
        let text: Arc<str> = Arc::from(text);
        let slot = self.labels.push(Arc::clone(&text));
        if slot != len {
            return Err(ScoringError::InvariantViolation(format!(
                "label slot {slot} does not match assigned id {id}"
            )));
        }
        ids.insert(text, id);
        self.len.store(len + 1, Ordering::Release);
        Ok(id)
    }

    /// Return the label text assigned to `id`.
    pub fn get_by_id(&self, id: LabelId) -> Result<Arc<str>, ScoringError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.labels.get(index))
            .cloned()
            .ok_or_else(|| ScoringError::LookupOutOfRange {
                id,
                size: self.size(),
            })
    }

    /// Returns `true` when `text` has been interned.
    pub fn contains(&self, text: &str) -> bool {
        self.ids.pin().contains_key(text)
    }

    /// Returns `true` when `id` has been assigned.
    pub fn contains_id(&self, id: LabelId) -> bool {
        usize::try_from(id).is_ok_and(|index| index < self.size())
    }

    /// Number of distinct labels interned so far.
    pub fn size(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Returns `true` when no label has been interned.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Configured cap on distinct labels.
    pub fn max_labels(&self) -> usize {
        self.max_labels
    }

    /// Ordered copy of the label table; index `i` holds label id `i`.
    pub fn labels(&self) -> Vec<Arc<str>> {
        let len = self.size();
        (0..len)
            .filter_map(|index| self.labels.get(index).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label_store::InMemoryLabelStore;

    #[test]
    fn ids_are_dense_and_stable() {
        let interner = LabelInterner::new();
        assert_eq!(interner.get_or_insert("r/bitcoin").unwrap(), 0);
        assert_eq!(interner.get_or_insert("#ai").unwrap(), 1);
        assert_eq!(interner.get_or_insert("r/bitcoin").unwrap(), 0);
        assert_eq!(interner.size(), 2);
        assert_eq!(&*interner.get_by_id(1).unwrap(), "#ai");
        assert!(interner.contains("#ai"));
        assert!(!interner.contains("#missing"));
    }

    #[test]
    fn unknown_ids_are_out_of_range() {
        let interner = LabelInterner::new();
        interner.get_or_insert("only").unwrap();
        let err = interner.get_by_id(1).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::LookupOutOfRange { id: 1, size: 1 }
        ));
        assert!(!interner.contains_id(1));
        assert!(interner.contains_id(0));
    }

    #[test]
    fn label_limit_reports_exhaustion_without_allocating() {
        let interner = LabelInterner::with_capacity_limit(1);
        interner.get_or_insert("first").unwrap();
        assert!(matches!(
            interner.get_or_insert("second"),
            Err(ScoringError::ResourceExhaustion(_))
        ));
        assert_eq!(interner.get_or_insert("first").unwrap(), 0);
        assert_eq!(interner.size(), 1);
    }

    #[test]
    fn new_labels_are_written_through_to_the_store() {
        let store = Arc::new(InMemoryLabelStore::new());
        let interner = LabelInterner::open(store.clone(), 16).unwrap();
        interner.get_or_insert("a").unwrap();
        interner.get_or_insert("b").unwrap();
        interner.get_or_insert("a").unwrap();
        assert_eq!(store.load_labels().unwrap(), vec!["a", "b"]);

        let reopened = LabelInterner::open(store, 16).unwrap();
        assert_eq!(reopened.get_or_insert("b").unwrap(), 1);
        assert_eq!(reopened.get_or_insert("c").unwrap(), 2);
    }

    #[test]
    fn open_rejects_duplicate_persisted_labels() {
        let store = Arc::new(InMemoryLabelStore::new());
        store.append_label(0, "dup").unwrap();
        store.append_label(1, "dup").unwrap();
        assert!(matches!(
            LabelInterner::open(store, 16),
            Err(ScoringError::LabelStore(_))
        ));
    }
}
