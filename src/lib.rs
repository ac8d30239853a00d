#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Per-bucket byte aggregation and consistent snapshots.
pub mod bucket_index;
/// Ingestion configuration types.
pub mod config;
/// Centralized constants used across interning, persistence, and redaction.
pub mod constants;
/// Submission records, platforms, bucket keys, and time bucket helpers.
pub mod data;
/// Reusable CLI runners shared by the demo binaries.
pub mod example_apps;
mod hash;
/// Validation boundary between upstream validators and the scoring core.
pub mod ingestion;
/// Concurrent append-only label interner.
pub mod interner;
/// Label table persistence backends.
pub mod label_store;
/// Aggregate, label-free snapshot metrics.
pub mod metrics;
/// Redaction of records bound for logs and metrics.
pub mod redaction;
/// Quadratic share scoring.
pub mod scoring;
/// Shared type aliases.
pub mod types;

mod errors;

pub use bucket_index::{BucketIndex, BucketSnapshot, BucketView};
pub use config::IngestionConfig;
pub use data::{BucketKey, LabelRef, SourcePlatform, SubmissionRecord};
pub use errors::{RejectReason, ScoringError};
pub use ingestion::{IngestReport, IngestionManager, ScoringRound};
pub use interner::LabelInterner;
pub use label_store::{FileLabelStore, InMemoryLabelStore, LabelStore};
pub use redaction::{AuditEvent, MinerIdentity, ObservableRecord, Outcome, RedactionPolicy, redact};
pub use scoring::{MinerScores, score, scorable_bytes};
pub use types::{ContentUri, LabelId, LabelText, MinerHandle, MinerId, TimeBucketId};
