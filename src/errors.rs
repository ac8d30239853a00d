use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::types::LabelId;

/// Error type for submission validation, interning, aggregation, and persistence failures.
///
/// Messages never carry label text, content URIs, or time bucket ids so errors can be
/// logged without leaking which bucket a submission targeted.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Record failed boundary validation.
    #[error("invalid submission: {reason}")]
    InvalidSubmission {
        /// Bucket-free description of the failure.
        reason: String,
    },
    /// Label id was never assigned.
    #[error("label id {id} is out of range (interned labels: {size})")]
    LookupOutOfRange {
        /// Requested id.
        id: LabelId,
        /// Labels interned at lookup time.
        size: usize,
    },
    /// A counter, id space, or allocation limit was hit.
    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),
    /// Aggregated state is internally inconsistent.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
    /// Label persistence failed or returned corrupt data.
    #[error("label store failure: {0}")]
    LabelStore(String),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Coarse rejection reason safe to expose through redacted records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The record failed boundary validation.
    Invalid,
    /// The record referenced an unknown label id.
    UnknownLabel,
    /// The interner or index could not grow.
    Exhausted,
    /// An internal invariant or persistence failure.
    Internal,
}

impl ScoringError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidSubmission {
            reason: reason.into(),
        }
    }

    /// Map this error onto the coarse reason reported by redacted records.
    pub fn rejection_reason(&self) -> RejectReason {
        match self {
            Self::InvalidSubmission { .. } | Self::Configuration(_) => RejectReason::Invalid,
            Self::LookupOutOfRange { .. } => RejectReason::UnknownLabel,
            Self::ResourceExhaustion(_) => RejectReason::Exhausted,
            Self::InvariantViolation(_) | Self::LabelStore(_) | Self::Io(_) => {
                RejectReason::Internal
            }
        }
    }
}
