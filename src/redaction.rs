//! Redaction boundary for everything that reaches logs, metrics, or other shared sinks.
//!
//! Label text, content URIs, and time bucket ids together identify which bucket paid
//! well. None of them survive `redact`; only the platform, byte counts, a miner handle,
//! and coarse outcome fields do.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bucket_index::BucketView;
use crate::constants::redaction::PSEUDONYM_PREFIX;
use crate::data::{BucketKey, SourcePlatform, SubmissionRecord};
use crate::errors::RejectReason;
use crate::hash::pseudonym_digest;
use crate::types::MinerHandle;

/// Coarse outcome of one submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Recorded into the index.
    Accepted,
    /// Failed validation or recording.
    Rejected,
    /// Repeat of an already recorded URI in the same bucket.
    Duplicate,
}

/// How miner identities appear in redacted records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MinerIdentity {
    /// Emit the miner id as-is.
    #[default]
    Plain,
    /// Emit a seeded hash of the miner id; changing `epoch` rotates every handle.
    Pseudonymous {
        /// Secret mixed into every handle.
        seed: u64,
        /// Rotation epoch.
        epoch: u64,
    },
}

/// Policy applied at every observability boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RedactionPolicy {
    /// How miner ids are rendered.
    pub identity: MinerIdentity,
}

/// Internal event about to cross an observability boundary.
#[derive(Clone, Copy, Debug)]
pub enum AuditEvent<'a> {
    /// A submission and what happened to it.
    Submission {
        /// Submitted record.
        record: &'a SubmissionRecord,
        /// What happened to it.
        outcome: Outcome,
        /// Coarse cause for rejections.
        reason: Option<RejectReason>,
    },
    /// Aggregate state of one bucket.
    Bucket {
        /// Bucket address; never emitted.
        key: &'a BucketKey,
        /// Bucket aggregate.
        view: &'a BucketView,
    },
    /// One miner's score for a scoring round.
    Score {
        /// Scored miner.
        miner_id: &'a str,
        /// Total scorable bytes.
        score: f64,
    },
}

/// Kind tag for redacted records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// One submission outcome.
    Submission,
    /// One bucket aggregate.
    Bucket,
    /// One miner score.
    Score,
}

/// Redacted record safe for external sinks.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObservableRecord {
    /// Kind of event this record describes.
    pub event: EventKind,
    /// Source platform, the only bucket coordinate kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourcePlatform>,
    /// Submission size, or bucket total for bucket events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_size_bytes: Option<u64>,
    /// Miner handle under the active policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miner: Option<MinerHandle>,
    /// Submission outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    /// Coarse rejection reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    /// Distinct contributors in a bucket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributors: Option<usize>,
    /// Miner score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ObservableRecord {
    fn empty(event: EventKind) -> Self {
        Self {
            event,
            source: None,
            content_size_bytes: None,
            miner: None,
            outcome: None,
            reason: None,
            contributors: None,
            score: None,
        }
    }
}

impl fmt::Display for ObservableRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("{\"event\":\"unserializable\"}"),
        }
    }
}

impl RedactionPolicy {
    /// Policy that keeps miner ids verbatim.
    pub const fn plain() -> Self {
        Self {
            identity: MinerIdentity::Plain,
        }
    }

    /// Policy that replaces miner ids with seeded pseudonyms for epoch 0.
    pub const fn pseudonymous(seed: u64) -> Self {
        Self {
            identity: MinerIdentity::Pseudonymous { seed, epoch: 0 },
        }
    }

    /// Same policy with pseudonyms rotated to `epoch`; plain policies are unchanged.
    pub fn rotated(self, epoch: u64) -> Self {
        match self.identity {
            MinerIdentity::Plain => self,
            MinerIdentity::Pseudonymous { seed, .. } => Self {
                identity: MinerIdentity::Pseudonymous { seed, epoch },
            },
        }
    }

    /// Handle emitted in place of `miner_id`.
    pub fn miner_handle(&self, miner_id: &str) -> MinerHandle {
        match self.identity {
            MinerIdentity::Plain => miner_id.to_string(),
            MinerIdentity::Pseudonymous { seed, epoch } => {
                format!(
                    "{PSEUDONYM_PREFIX}{:016x}",
                    pseudonym_digest(seed, epoch, miner_id)
                )
            }
        }
    }

    /// Strip bucket-identifying fields from `event`.
    pub fn redact(&self, event: &AuditEvent<'_>) -> ObservableRecord {
        match *event {
            AuditEvent::Submission {
                record,
                outcome,
                reason,
            } => ObservableRecord {
                source: Some(record.source),
                content_size_bytes: Some(record.content_size_bytes),
                miner: Some(self.miner_handle(&record.miner_id)),
                outcome: Some(outcome),
                reason,
                ..ObservableRecord::empty(EventKind::Submission)
            },
            AuditEvent::Bucket { key, view } => ObservableRecord {
                source: Some(key.source),
                content_size_bytes: Some(view.total_bytes()),
                contributors: Some(view.contributors()),
                ..ObservableRecord::empty(EventKind::Bucket)
            },
            AuditEvent::Score { miner_id, score } => ObservableRecord {
                miner: Some(self.miner_handle(miner_id)),
                score: Some(score),
                ..ObservableRecord::empty(EventKind::Score)
            },
        }
    }
}

/// Redact `event` under the default (plain identity) policy.
pub fn redact(event: &AuditEvent<'_>) -> ObservableRecord {
    RedactionPolicy::default().redact(event)
}
