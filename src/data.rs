use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::time_buckets::SECONDS_PER_BUCKET;
use crate::errors::ScoringError;

pub use crate::types::{ContentUri, LabelId, LabelText, MinerId, TimeBucketId};

/// Platform the submitted content was scraped from.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub enum SourcePlatform {
    /// Reddit posts and comments.
    Reddit,
    /// X (formerly Twitter) posts.
    X,
    /// YouTube transcripts.
    YouTube,
}

impl SourcePlatform {
    /// Every known platform, in code order.
    pub const ALL: [SourcePlatform; 3] = [Self::Reddit, Self::X, Self::YouTube];

    /// Stable numeric code shared with upstream validators.
    pub const fn code(self) -> u8 {
        match self {
            Self::Reddit => 1,
            Self::X => 2,
            Self::YouTube => 3,
        }
    }

    /// Resolve a numeric platform code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|platform| platform.code() == code)
    }

    /// Lowercase name used in logs and CLI output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reddit => "reddit",
            Self::X => "x",
            Self::YouTube => "youtube",
        }
    }
}

impl fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite key addressing one scoring bucket.
///
/// Ordering is source, then label id, then time bucket; snapshots and scoring iterate
/// buckets in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    /// Platform of the bucket.
    pub source: SourcePlatform,
    /// Interned label id.
    pub label_id: LabelId,
    /// Hour bucket.
    pub time_bucket_id: TimeBucketId,
}

impl BucketKey {
    /// Build a key from its three coordinates.
    pub fn new(source: SourcePlatform, label_id: LabelId, time_bucket_id: TimeBucketId) -> Self {
        Self {
            source,
            label_id,
            time_bucket_id,
        }
    }
}

/// Label reference carried by a submission: an already-interned id or raw text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelRef {
    /// Previously interned label id.
    Id(LabelId),
    /// Label text to intern on first sight.
    Text(LabelText),
}

impl From<&str> for LabelRef {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<LabelId> for LabelRef {
    fn from(value: LabelId) -> Self {
        Self::Id(value)
    }
}

/// One reported content item, already validated by the platform-specific collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Submitting miner.
    pub miner_id: MinerId,
    /// Platform the content came from.
    pub source: SourcePlatform,
    /// Label as id or text.
    pub label: LabelRef,
    /// Hours-since-epoch bucket of the content's creation time.
    pub time_bucket_id: TimeBucketId,
    /// Content size in bytes; must be positive.
    pub content_size_bytes: u64,
    /// Originating URI, used for duplicate detection only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<ContentUri>,
}

impl SubmissionRecord {
    /// Build a record without a URI.
    pub fn new(
        miner_id: impl Into<MinerId>,
        source: SourcePlatform,
        label: impl Into<LabelRef>,
        time_bucket_id: TimeBucketId,
        content_size_bytes: u64,
    ) -> Self {
        Self {
            miner_id: miner_id.into(),
            source,
            label: label.into(),
            time_bucket_id,
            content_size_bytes,
            uri: None,
        }
    }

    /// Attach the originating URI.
    pub fn with_uri(mut self, uri: impl Into<ContentUri>) -> Self {
        self.uri = Some(uri.into());
        self
    }
}

/// Return the time bucket containing `instant`.
pub fn time_bucket_for(instant: DateTime<Utc>) -> Result<TimeBucketId, ScoringError> {
    let seconds = instant.timestamp();
    if seconds < 0 {
        return Err(ScoringError::invalid("content timestamp precedes the Unix epoch"));
    }
    TimeBucketId::try_from(seconds / SECONDS_PER_BUCKET)
        .map_err(|_| ScoringError::invalid("content timestamp exceeds the time bucket range"))
}

/// Return the inclusive start instant of `bucket`.
pub fn time_bucket_start(bucket: TimeBucketId) -> DateTime<Utc> {
    // u32 hours always fit chrono's supported range.
    Utc.timestamp_opt(i64::from(bucket) * SECONDS_PER_BUCKET, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
