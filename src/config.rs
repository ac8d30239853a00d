use crate::constants::labels::{DEFAULT_MAX_LABEL_LEN, DEFAULT_MAX_LABELS};
use crate::errors::ScoringError;
use crate::redaction::RedactionPolicy;

/// Top-level ingestion configuration.
#[derive(Clone, Debug)]
pub struct IngestionConfig {
    /// Max number of distinct labels the interner may hold.
    pub max_labels: usize,
    /// Max label length in bytes; longer labels are rejected at the boundary.
    pub max_label_len: usize,
    /// Report a repeated `(bucket, uri)` pair as a duplicate instead of counting it again.
    ///
    /// Records without a URI are never treated as duplicates.
    pub reject_duplicate_uris: bool,
    /// Redaction applied to every logged submission, bucket, and score event.
    pub redaction: RedactionPolicy,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_labels: DEFAULT_MAX_LABELS,
            max_label_len: DEFAULT_MAX_LABEL_LEN,
            reject_duplicate_uris: true,
            redaction: RedactionPolicy::default(),
        }
    }
}

impl IngestionConfig {
    /// Validate limits, returning the config unchanged when usable.
    pub fn validated(self) -> Result<Self, ScoringError> {
        if self.max_labels == 0 {
            return Err(ScoringError::Configuration(
                "max_labels must be greater than zero".to_string(),
            ));
        }
        if self.max_label_len == 0 {
            return Err(ScoringError::Configuration(
                "max_label_len must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}
