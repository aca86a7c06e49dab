//! Entries and queries exchanged with the external index store.
//!
//! The store is a wide-row table: a hash key selects a row, and a sorted
//! range key selects entries within it. The engine emits [`IndexEntry`]
//! values on write and [`IndexQuery`] values on read; both are carried to
//! the store verbatim.

/// One entry to write to the external index store.
///
/// Rows are keyed by `(table_name, hash_key)`; within a row each entry is
/// identified by its sorted `range_key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexEntry {
    /// Physical table holding the row.
    pub table_name: String,

    /// Hash key selecting the row.
    pub hash_key: String,

    /// Sort key identifying this entry within the row. Always set on
    /// writes.
    pub range_key: Vec<u8>,

    /// Extra opaque cell stored next to the range key. Empty except for
    /// schema versions that keep the label value (or metric name) out of
    /// the range key.
    pub value: Vec<u8>,
}

/// One read to execute against the external index store.
///
/// At most one of `range_prefix` and `range_start` is set:
///
/// - `range_prefix`: read only entries whose range key starts with these
///   bytes;
/// - `range_start`: read all entries from this inclusive bytewise lower
///   bound onwards;
/// - neither: read every entry in the row.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexQuery {
    /// Physical table holding the row.
    pub table_name: String,

    /// Hash key selecting the row.
    pub hash_key: String,

    /// Bytewise prefix filter on the range key.
    pub range_prefix: Option<Vec<u8>>,

    /// Inclusive bytewise lower bound on the range key.
    pub range_start: Option<Vec<u8>>,
}
