/// Constants used by label interning and validation.
pub mod labels {
    /// Default cap on distinct labels held by one interner.
    pub const DEFAULT_MAX_LABELS: usize = 1 << 20;
    /// Default maximum label length in bytes accepted at ingestion.
    pub const DEFAULT_MAX_LABEL_LEN: usize = 140;
}

/// Constants used by time bucket derivation.
pub mod time_buckets {
    /// Width of one time bucket in seconds.
    pub const SECONDS_PER_BUCKET: i64 = 60 * 60;
}

/// Constants used by the file-backed label store.
pub mod label_store {
    /// Current on-disk label store version.
    pub const STORE_VERSION: u8 = 1;
    /// Prefix byte for every bitcode payload written by this crate.
    pub const BITCODE_PREFIX: u8 = b'B';
    /// Record version for persisted label entries.
    pub const LABEL_RECORD_VERSION: u8 = 1;
    /// Key holding the versioned store header (version + label count).
    pub const META_KEY: &[u8] = b"__labels_meta__";
    /// Key prefix for persisted label entries (followed by the big-endian id).
    pub const LABEL_PREFIX: &[u8] = b"label:";
    /// Default directory for persisted label tables.
    pub const DEFAULT_STORE_DIR: &str = ".scoring_store";
    /// Default filename for persisted label tables.
    pub const DEFAULT_STORE_FILENAME: &str = "labels.bin";
}

/// Constants used by the redaction boundary.
pub mod redaction {
    /// Prefix applied to pseudonymous miner handles.
    pub const PSEUDONYM_PREFIX: &str = "anon-";
    /// Offset mixed into pseudonym seeds so handles differ from other stable hashes.
    pub const PSEUDONYM_SEED_OFFSET: u64 = 0x5C0E_ED1D;
}
