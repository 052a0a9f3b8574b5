/// All entity primary keys are 64-bit integers allocated from
/// monotonically increasing per-entity sequences.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
