//! The [`Schema`] trait and the bucketed implementation behind each
//! schema version.

use data_types::{IndexEntry, IndexQuery, Labels, Time};

use crate::bucket::{Bucket, Bucketing};
use crate::config::SchemaConfig;
use crate::entries::{
    Base64Entries, BucketEntries, LabelNameInHashKeyEntries, OriginalEntries, V5Entries, V6Entries,
    V7Entries,
};
use crate::Result;

/// Computes the index entries and queries needed to write and read chunks
/// through the external index.
///
/// All operations are pure and synchronous; a `Schema` value can be
/// shared freely across threads.
pub trait Schema: std::fmt::Debug + Send + Sync {
    /// The entries to write for one chunk covering `[from, through]`.
    fn write_entries(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
        metric_name: &str,
        labels: &Labels,
        chunk_id: &str,
    ) -> Result<Vec<IndexEntry>>;

    /// The queries serving a metric-name-agnostic read. Only v7 rows can
    /// answer this shape.
    fn read_queries(&self, from: Time, through: Time, tenant_id: &str)
        -> Result<Vec<IndexQuery>>;

    /// The queries serving "all chunks for a metric".
    fn read_queries_for_metric(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
        metric_name: &str,
    ) -> Result<Vec<IndexQuery>>;

    /// The queries serving "all chunks for a metric and label name".
    fn read_queries_for_metric_label(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
        metric_name: &str,
        label_name: &str,
    ) -> Result<Vec<IndexQuery>>;

    /// The queries serving "all chunks for a metric carrying a given
    /// label value".
    fn read_queries_for_metric_label_value(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
        metric_name: &str,
        label_name: &str,
        label_value: &str,
    ) -> Result<Vec<IndexQuery>>;
}

/// One schema version: a bucketing granularity paired with an entry
/// strategy, applied bucket by bucket over the requested range.
#[derive(Debug)]
struct BucketedSchema<E> {
    cfg: SchemaConfig,
    bucketing: Bucketing,
    entries: E,
}

impl<E: BucketEntries> BucketedSchema<E> {
    fn new(cfg: SchemaConfig, bucketing: Bucketing, entries: E) -> Self {
        Self {
            cfg,
            bucketing,
            entries,
        }
    }

    /// Concatenate `f` over every bucket in order; the first error aborts
    /// the whole call.
    fn for_buckets<T>(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
        mut f: impl FnMut(&Bucket) -> Result<Vec<T>>,
    ) -> Result<Vec<T>> {
        let mut result = Vec::new();
        for bucket in self.cfg.buckets(self.bucketing, from, through, tenant_id) {
            result.extend(f(&bucket)?);
        }
        Ok(result)
    }
}

impl<E: BucketEntries> Schema for BucketedSchema<E> {
    fn write_entries(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
        metric_name: &str,
        labels: &Labels,
        chunk_id: &str,
    ) -> Result<Vec<IndexEntry>> {
        self.for_buckets(from, through, tenant_id, |bucket| {
            self.entries.write_entries(bucket, metric_name, labels, chunk_id)
        })
    }

    fn read_queries(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
    ) -> Result<Vec<IndexQuery>> {
        self.for_buckets(from, through, tenant_id, |bucket| self.entries.queries(bucket))
    }

    fn read_queries_for_metric(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
        metric_name: &str,
    ) -> Result<Vec<IndexQuery>> {
        self.for_buckets(from, through, tenant_id, |bucket| {
            self.entries.metric_queries(bucket, metric_name)
        })
    }

    fn read_queries_for_metric_label(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
        metric_name: &str,
        label_name: &str,
    ) -> Result<Vec<IndexQuery>> {
        self.for_buckets(from, through, tenant_id, |bucket| {
            self.entries.metric_label_queries(bucket, metric_name, label_name)
        })
    }

    fn read_queries_for_metric_label_value(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
        metric_name: &str,
        label_name: &str,
        label_value: &str,
    ) -> Result<Vec<IndexQuery>> {
        self.for_buckets(from, through, tenant_id, |bucket| {
            self.entries
                .metric_label_value_queries(bucket, metric_name, label_name, label_value)
        })
    }
}

/// The first schema:
///
/// - hash key: `<tenant>:<hour bucket>:<metric name>`
/// - range key: `<label name>\0<label value>\0<chunk ID>`
pub fn v1_schema(cfg: SchemaConfig) -> impl Schema {
    BucketedSchema::new(cfg, Bucketing::Hourly, OriginalEntries)
}

/// v2 moved to daily buckets in the hash key:
///
/// - hash key: `<tenant>:d<day bucket>:<metric name>`
pub fn v2_schema(cfg: SchemaConfig) -> impl Schema {
    BucketedSchema::new(cfg, Bucketing::Daily, OriginalEntries)
}

/// v3 moved to base-64 encoded label values and a version component:
///
/// - range key: `<label name>\0<base64(label value)>\0<chunk ID>\0<1>`
pub fn v3_schema(cfg: SchemaConfig) -> impl Schema {
    BucketedSchema::new(cfg, Bucketing::Daily, Base64Entries)
}

/// v4 writes two kinds of row at once:
///
/// 1. hash key `<tenant>:<day bucket>:<metric name>:<label name>`,
///    range key `\0<base64(label value)>\0<chunk ID>\0<1>`
/// 2. hash key `<tenant>:<day bucket>:<metric name>`,
///    range key `\0\0<chunk ID>\0<2>`
pub fn v4_schema(cfg: SchemaConfig) -> impl Schema {
    BucketedSchema::new(cfg, Bucketing::Daily, LabelNameInHashKeyEntries)
}

/// v5 extends v4 with the chunk end time at the front of the range key,
/// intended to cut query latency. The placement defeats value-prefix
/// matching, so reads cannot use the end times and scan whole rows.
pub fn v5_schema(cfg: SchemaConfig) -> impl Schema {
    BucketedSchema::new(cfg, Bucketing::Daily, V5Entries)
}

/// v6 makes the end times usable for pruning and moves the label value
/// out of the range key into the value cell.
pub fn v6_schema(cfg: SchemaConfig) -> impl Schema {
    BucketedSchema::new(cfg, Bucketing::Daily, V6Entries)
}

/// v7 extends v6 with per-bucket metric-name rows, supporting queries
/// with no metric name.
pub fn v7_schema(cfg: SchemaConfig) -> impl Schema {
    BucketedSchema::new(cfg, Bucketing::Daily, V7Entries::default())
}
