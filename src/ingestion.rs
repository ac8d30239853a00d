use crate::bucket_index::{BucketIndex, BucketSnapshot};
use crate::config::IngestionConfig;
use crate::data::{BucketKey, LabelRef, SubmissionRecord};
use crate::errors::{RejectReason, ScoringError};
use crate::interner::LabelInterner;
use crate::metrics::bucket_coverage;
use crate::redaction::{AuditEvent, ObservableRecord, Outcome};
use crate::scoring::{MinerScores, score};
use crate::types::{ContentUri, LabelId};
use dashmap::DashSet;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tally of one batch ingestion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records recorded into the index.
    pub accepted: usize,
    /// Records skipped as repeats of an already recorded URI.
    pub duplicates: usize,
    /// Records rejected with an error.
    pub rejected: usize,
    /// Bytes recorded by accepted records.
    pub accepted_bytes: u64,
}

/// Snapshot plus the scores computed from it.
#[derive(Clone, Debug)]
pub struct ScoringRound {
    /// Cut the scores were computed from.
    pub snapshot: BucketSnapshot,
    /// Per-miner scores for `snapshot`.
    pub scores: MinerScores,
}

/// Boundary between upstream validators and the scoring core.
///
/// Resolves labels through the shared interner, drops repeated URIs, records
/// contributions, and logs only redacted records.
pub struct IngestionManager {
    labels: Arc<LabelInterner>,
    index: Arc<BucketIndex>,
    seen_uris: DashSet<(BucketKey, ContentUri)>,
    config: IngestionConfig,
}

impl IngestionManager {
    /// Create a manager with a fresh, non-persistent interner and an empty index.
    pub fn new(config: IngestionConfig) -> Result<Self, ScoringError> {
        let labels = Arc::new(LabelInterner::with_capacity_limit(config.max_labels));
        Self::with_components(labels, Arc::new(BucketIndex::new()), config)
    }

    /// Create a manager over existing shared components.
    ///
    /// `config.max_labels` is replaced by the limit `labels` was built with, since the
    /// interner enforces it.
    pub fn with_components(
        labels: Arc<LabelInterner>,
        index: Arc<BucketIndex>,
        mut config: IngestionConfig,
    ) -> Result<Self, ScoringError> {
        config.max_labels = labels.max_labels();
        Ok(Self {
            labels,
            index,
            seen_uris: DashSet::new(),
            config: config.validated()?,
        })
    }

    /// Shared label interner.
    pub fn labels(&self) -> &Arc<LabelInterner> {
        &self.labels
    }

    /// Shared bucket index.
    pub fn index(&self) -> &Arc<BucketIndex> {
        &self.index
    }

    /// Validated configuration in effect.
    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Validate and record one submission.
    ///
    /// A URI is reserved before its contribution is recorded and released if recording
    /// fails. A concurrent copy of the same `(bucket, uri)` arriving inside that window
    /// is reported as a duplicate even when the first copy ends up rejected; the caller
    /// may resubmit it once the rejection is seen.
    pub fn submit(&self, record: &SubmissionRecord) -> Result<Outcome, ScoringError> {
        match self.apply(record) {
            Ok(outcome) => {
                debug!(
                    record = %self.observe(record, outcome, None),
                    "submission processed"
                );
                Ok(outcome)
            }
            Err(err) => {
                warn!(
                    record = %self.observe(record, Outcome::Rejected, Some(err.rejection_reason())),
                    error = %err,
                    "submission rejected"
                );
                Err(err)
            }
        }
    }

    /// Submit `records` in parallel on the rayon pool.
    pub fn submit_batch(&self, records: &[SubmissionRecord]) -> IngestReport {
        let results: Vec<(u64, Result<Outcome, ScoringError>)> = records
            .par_iter()
            .map(|record| (record.content_size_bytes, self.submit(record)))
            .collect();
        let mut report = IngestReport::default();
        for (bytes, result) in results {
            match result {
                Ok(Outcome::Accepted) => {
                    report.accepted += 1;
                    report.accepted_bytes = report.accepted_bytes.saturating_add(bytes);
                }
                Ok(Outcome::Duplicate) => report.duplicates += 1,
                Ok(Outcome::Rejected) | Err(_) => report.rejected += 1,
            }
        }
        debug!(
            accepted = report.accepted,
            duplicates = report.duplicates,
            rejected = report.rejected,
            accepted_bytes = report.accepted_bytes,
            "batch ingested"
        );
        report
    }

    /// Snapshot the index and score it.
    pub fn score_round(&self) -> Result<ScoringRound, ScoringError> {
        let snapshot = self.index.snapshot();
        for (key, view) in snapshot.iter() {
            debug!(
                record = %self.config.redaction.redact(&AuditEvent::Bucket { key, view }),
                "bucket state"
            );
        }
        let scores = score(&snapshot)?;
        for (miner_id, value) in &scores {
            info!(
                record = %self.config.redaction.redact(&AuditEvent::Score {
                    miner_id,
                    score: *value,
                }),
                "miner scored"
            );
        }
        let coverage = bucket_coverage(&snapshot);
        info!(
            version = snapshot.version(),
            buckets = coverage.buckets,
            miners = coverage.miners,
            single_contributor_buckets = coverage.single_contributor_buckets,
            "scoring round complete"
        );
        Ok(ScoringRound { snapshot, scores })
    }

    fn apply(&self, record: &SubmissionRecord) -> Result<Outcome, ScoringError> {
        if record.content_size_bytes == 0 {
            return Err(ScoringError::invalid("content size must be positive"));
        }
        let label_id = self.resolve_label(&record.label)?;
        let key = BucketKey::new(record.source, label_id, record.time_bucket_id);

        let dedup_key = match (&record.uri, self.config.reject_duplicate_uris) {
            (Some(uri), true) => Some((key, uri.clone())),
            _ => None,
        };
        if let Some(dedup_key) = &dedup_key {
            if !self.seen_uris.insert(dedup_key.clone()) {
                return Ok(Outcome::Duplicate);
            }
        }

        if let Err(err) = self.index.record_contribution(
            &record.miner_id,
            record.source,
            label_id,
            record.time_bucket_id,
            record.content_size_bytes,
        ) {
            if let Some(dedup_key) = dedup_key {
                self.seen_uris.remove(&dedup_key);
            }
            return Err(err);
        }
        Ok(Outcome::Accepted)
    }

    fn resolve_label(&self, label: &LabelRef) -> Result<LabelId, ScoringError> {
        match label {
            LabelRef::Id(id) => {
                if self.labels.contains_id(*id) {
                    Ok(*id)
                } else {
                    Err(ScoringError::invalid("unknown label reference"))
                }
            }
            LabelRef::Text(text) => {
                if text.is_empty() {
                    return Err(ScoringError::invalid("label text is empty"));
                }
                if text.len() > self.config.max_label_len {
                    return Err(ScoringError::invalid(format!(
                        "label text exceeds {} bytes",
                        self.config.max_label_len
                    )));
                }
                self.labels.get_or_insert(text)
            }
        }
    }

    fn observe(
        &self,
        record: &SubmissionRecord,
        outcome: Outcome,
        reason: Option<RejectReason>,
    ) -> ObservableRecord {
        self.config.redaction.redact(&AuditEvent::Submission {
            record,
            outcome,
            reason,
        })
    }
}
