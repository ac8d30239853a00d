use simd_r_drive::storage_engine::DataStore;
use simd_r_drive::storage_engine::traits::{DataStoreReader, DataStoreWriter};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::constants::label_store::{
    BITCODE_PREFIX, DEFAULT_STORE_FILENAME, LABEL_PREFIX, LABEL_RECORD_VERSION, META_KEY,
    STORE_VERSION,
};
use crate::errors::ScoringError;
use crate::types::{LabelId, LabelText};

pub use crate::constants::label_store::DEFAULT_STORE_DIR;

/// Persistence backend for the interned label table.
///
/// Implementations must return labels in the exact order they were appended; the
/// position of each label is its id.
pub trait LabelStore: Send + Sync {
    /// Load every persisted label in insertion order.
    fn load_labels(&self) -> Result<Vec<LabelText>, ScoringError>;
    /// Persist `text` as label `id`. `id` must equal the number of labels already stored.
    fn append_label(&self, id: LabelId, text: &str) -> Result<(), ScoringError>;
}

/// In-memory label store, mainly for tests and ephemeral validators.
#[derive(Debug, Default)]
pub struct InMemoryLabelStore {
    labels: RwLock<Vec<LabelText>>,
}

impl InMemoryLabelStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of labels appended so far.
    pub fn len(&self) -> usize {
        self.labels.read().len()
    }

    /// Returns `true` when no label has been appended.
    pub fn is_empty(&self) -> bool {
        self.labels.read().is_empty()
    }
}

impl LabelStore for InMemoryLabelStore {
    fn load_labels(&self) -> Result<Vec<LabelText>, ScoringError> {
        Ok(self.labels.read().clone())
    }

    fn append_label(&self, id: LabelId, text: &str) -> Result<(), ScoringError> {
        let mut labels = self.labels.write();
        check_append_order(id, labels.len())?;
        labels.push(text.to_string());
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, bitcode::Encode, bitcode::Decode)]
/// Versioned header stored in file-backed label stores.
struct StoreMeta {
    version: u8,
    count: u64,
}

#[derive(Clone, Debug, bitcode::Encode, bitcode::Decode)]
/// One persisted label entry.
struct PersistedLabel {
    id: u32,
    text: String,
}

/// File-backed label store for persistent validators.
///
/// Each label is written under its own key before the header count is bumped, so a
/// crash between the two writes leaves the previously published table intact.
pub struct FileLabelStore {
    store: DataStore,
    path: PathBuf,
    count: Mutex<u64>,
}

impl fmt::Debug for FileLabelStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLabelStore")
            .field("path", &self.path)
            .field("count", &*self.count.lock())
            .finish()
    }
}

impl FileLabelStore {
    /// Open (or create) a file-backed label store at `path`.
    ///
    /// A directory path gets the default store filename appended.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, ScoringError> {
        let path = coerce_store_path(path.into());
        ensure_parent_dir(&path)?;
        let store = DataStore::open(path.as_path()).map_err(map_store_err)?;
        let count = match read_bytes(&store, META_KEY)? {
            Some(bytes) => {
                let meta = decode_store_meta(&bytes)?;
                if meta.version != STORE_VERSION {
                    return Err(ScoringError::LabelStore(format!(
                        "label store version mismatch (expected {}, found {})",
                        STORE_VERSION, meta.version
                    )));
                }
                meta.count
            }
            None => {
                write_meta(&store, 0)?;
                0
            }
        };
        Ok(Self {
            store,
            path,
            count: Mutex::new(count),
        })
    }

    /// Default label store file path under the crate's default store directory.
    pub fn default_path() -> PathBuf {
        Self::default_path_in_dir(DEFAULT_STORE_DIR)
    }

    /// Default label store file path inside a custom directory.
    pub fn default_path_in_dir<P: AsRef<Path>>(dir: P) -> PathBuf {
        dir.as_ref().join(DEFAULT_STORE_FILENAME)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LabelStore for FileLabelStore {
    fn load_labels(&self) -> Result<Vec<LabelText>, ScoringError> {
        let count = *self.count.lock();
        let capacity = usize::try_from(count)
            .map_err(|_| ScoringError::LabelStore("label count exceeds address space".into()))?;
        let mut labels = Vec::new();
        labels
            .try_reserve_exact(capacity)
            .map_err(|err| ScoringError::ResourceExhaustion(err.to_string()))?;
        for raw_id in 0..count {
            let id = LabelId::try_from(raw_id)
                .map_err(|_| ScoringError::LabelStore("label id exceeds id space".into()))?;
            let bytes = read_bytes(&self.store, &label_key(id))?.ok_or_else(|| {
                ScoringError::LabelStore(format!("label entry {id} missing from store"))
            })?;
            let entry = decode_label(&bytes)?;
            if entry.id != id {
                return Err(ScoringError::LabelStore(format!(
                    "label entry {id} carries mismatched id {}",
                    entry.id
                )));
            }
            labels.push(entry.text);
        }
        Ok(labels)
    }

    fn append_label(&self, id: LabelId, text: &str) -> Result<(), ScoringError> {
        let mut count = self.count.lock();
        let expected = usize::try_from(*count)
            .map_err(|_| ScoringError::LabelStore("label count exceeds address space".into()))?;
        check_append_order(id, expected)?;
        let payload = encode_label(&PersistedLabel {
            id,
            text: text.to_string(),
        });
        write_bytes(&self.store, &label_key(id), &payload)?;
        write_meta(&self.store, *count + 1)?;
        *count += 1;
        Ok(())
    }
}

fn check_append_order(id: LabelId, stored: usize) -> Result<(), ScoringError> {
    if usize::try_from(id).ok() != Some(stored) {
        return Err(ScoringError::LabelStore(format!(
            "out-of-order label append (expected id {stored}, got {id})"
        )));
    }
    Ok(())
}

fn label_key(id: LabelId) -> Vec<u8> {
    let mut key = Vec::with_capacity(LABEL_PREFIX.len() + 4);
    key.extend_from_slice(LABEL_PREFIX);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn write_meta(store: &DataStore, count: u64) -> Result<(), ScoringError> {
    let meta = StoreMeta {
        version: STORE_VERSION,
        count,
    };
    write_bytes(store, META_KEY, &encode_bitcode_payload(&bitcode::encode(&meta)))
}

fn decode_store_meta(bytes: &[u8]) -> Result<StoreMeta, ScoringError> {
    let raw = decode_bitcode_payload(bytes)?;
    bitcode::decode(&raw).map_err(|err| {
        ScoringError::LabelStore(format!("failed to decode label store metadata: {err}"))
    })
}

fn encode_label(label: &PersistedLabel) -> Vec<u8> {
    let payload = encode_bitcode_payload(&bitcode::encode(label));
    let mut buf = Vec::with_capacity(1 + payload.len());
    buf.push(LABEL_RECORD_VERSION);
    buf.extend_from_slice(&payload);
    buf
}

fn decode_label(bytes: &[u8]) -> Result<PersistedLabel, ScoringError> {
    if bytes.first().copied() != Some(LABEL_RECORD_VERSION) {
        return Err(ScoringError::LabelStore(
            "label record version mismatch".into(),
        ));
    }
    let raw = decode_bitcode_payload(&bytes[1..])?;
    bitcode::decode(&raw)
        .map_err(|err| ScoringError::LabelStore(format!("corrupt label record: {err}")))
}

fn read_bytes(store: &DataStore, key: &[u8]) -> Result<Option<Vec<u8>>, ScoringError> {
    store
        .read(key)
        .map_err(map_store_err)?
        .map(|entry| Ok(entry.as_ref().to_vec()))
        .transpose()
}

fn write_bytes(store: &DataStore, key: &[u8], payload: &[u8]) -> Result<(), ScoringError> {
    store.write(key, payload).map_err(map_store_err)?;
    Ok(())
}

fn encode_bitcode_payload(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + bytes.len());
    out.push(BITCODE_PREFIX);
    out.extend_from_slice(bytes);
    out
}

fn decode_bitcode_payload(bytes: &[u8]) -> Result<Vec<u8>, ScoringError> {
    if bytes.first().copied() != Some(BITCODE_PREFIX) {
        return Err(ScoringError::LabelStore(
            "bitcode payload missing expected prefix".into(),
        ));
    }
    Ok(bytes[1..].to_vec())
}

fn coerce_store_path(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        return path.join(DEFAULT_STORE_FILENAME);
    }
    path
}

fn ensure_parent_dir(path: &Path) -> Result<(), ScoringError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn map_store_err(err: io::Error) -> ScoringError {
    ScoringError::LabelStore(err.to_string())
}
