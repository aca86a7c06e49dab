//! Schema engine for a time-bucketed, multi-tenant chunk index.
//!
//! Chunks (immutable compressed blobs of samples for one series) live in
//! a bulk object store; finding them again by tenant, metric, label and
//! time goes through an external wide-row index: a hash key selects a row,
//! and a sorted range key selects entries within it. This crate translates
//! between the two worlds:
//!
//! - on write, [`Schema::write_entries`] turns a chunk's coordinates into
//!   the [`IndexEntry`](data_types::IndexEntry) values to store;
//! - on read, the `read_queries*` operations turn a query shape into
//!   [`IndexQuery`](data_types::IndexQuery) values, and
//!   [`parse_range_value`] decodes the rows the store hands back.
//!
//! The index is append-only and reindexing is prohibitively expensive, so
//! every historical key layout stays readable forever. Seven schema
//! versions have accumulated; [`CompositeSchema`] dispatches each time
//! sub-range to the version that was active when its data was written,
//! while new writes use the newest configured version.
//!
//! The engine is purely functional: it performs no I/O and holds no
//! mutable state, so schema values can be shared freely across threads.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use snafu::Snafu;

mod bucket;
mod composite;
mod config;
mod entries;
mod range_key;
mod schema;

pub use bucket::Bucket;
pub use composite::CompositeSchema;
pub use config::{DayValue, PeriodicTableConfig, SchemaConfig};
pub use range_key::{
    build_range_key, decode_base64_value, decode_time, encode_base64_value, encode_time,
    parse_range_value, RangeValue,
};
pub use schema::{
    v1_schema, v2_schema, v3_schema, v4_schema, v5_schema, v6_schema, v7_schema, Schema,
};

/// Errors surfaced by the schema engine.
///
/// Nothing is retried or swallowed internally; a failure in any bucket
/// aborts the whole call and yields no entries.
#[derive(Debug, Snafu)]
pub enum Error {
    /// Schema activation dates in the configuration are not ascending.
    #[snafu(display("schemas are not in time-sorted order"))]
    SchemasNotSorted,

    /// Periodic tables were enabled without the parameters they need.
    #[snafu(display("periodic tables require a positive period and a start date"))]
    InvalidPeriodicTableConfig,

    /// A label value would be stored raw but contains the component
    /// separator.
    #[snafu(display("label values cannot contain null byte"))]
    NullByteInLabelValue,

    /// A v7 write was attempted for a label set with no metric name.
    #[snafu(display("no metric name label in label set"))]
    NoMetricName,

    /// The schema version cannot answer reads that lack a metric name.
    #[snafu(display("{strategy} does not support queries without a metric name"))]
    NoMetricNameQueries {
        /// The entry strategy that was asked.
        strategy: &'static str,
    },

    /// A range key had too few components to be any known layout.
    #[snafu(display("invalid range key: {}", hex::encode(range_key)))]
    InvalidRangeKey {
        /// The offending key bytes.
        range_key: Vec<u8>,
    },

    /// A range key carried a version component this engine does not know.
    #[snafu(display("unrecognised range key version: {version:?}"))]
    UnknownRangeKeyVersion {
        /// The version component, lossily decoded for display.
        version: String,
    },

    /// A field expected to be base-64 did not decode.
    #[snafu(display("invalid base64-encoded label value: {source}"))]
    InvalidBase64Value {
        /// Underlying decode failure.
        source: base64::DecodeError,
    },

    /// A decoded component was not valid UTF-8.
    #[snafu(display("invalid UTF-8 in range key component: {source}"))]
    InvalidUtf8 {
        /// Underlying conversion failure.
        source: std::string::FromUtf8Error,
    },

    /// An encoded timestamp was not valid lowercase hex.
    #[snafu(display("invalid hex-encoded timestamp: {}", String::from_utf8_lossy(bytes)))]
    InvalidTimeEncoding {
        /// The offending bytes.
        bytes: Vec<u8>,
        /// Underlying decode failure.
        source: hex::FromHexError,
    },
}

/// Convenience alias for engine results.
pub type Result<T, E = Error> = std::result::Result<T, E>;
