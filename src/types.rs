/// Identifier of a submitting miner (hotkey or uid rendered as text).
/// Examples: `5F3sa2TJAWMqDhXG6jhV4N8ko9SxwGy8TpaNS1repo5EYjQX`, `uid-17`
pub type MinerId = String;
/// Human-readable label text before interning.
/// Examples: `r/bitcoin`, `#decentralization`
pub type LabelText = String;
/// Dense interned label identifier, assigned from 0 in insertion order.
/// Example: `0`, `41`
pub type LabelId = u32;
/// Hours elapsed since the Unix epoch for the start of a time bucket.
/// Example: `481_200` (2024-11-23T00:00:00Z)
pub type TimeBucketId = u32;
/// Originating content URI supplied by the upstream validator.
/// Example: `https://www.reddit.com/r/bitcoin/comments/abc123`
pub type ContentUri = String;
/// Redacted miner handle emitted to observability sinks.
/// Examples: `uid-17`, `anon-9c1f0e4a2b7d3c55`
pub type MinerHandle = String;
