//! The per-bucket entry strategies behind each schema version.
//!
//! Every strategy answers the same questions (which entries to write for
//! a chunk landing in one bucket, and which queries serve each read
//! shape), but the hash-key and range-key layouts differ per version.

use data_types::{IndexEntry, IndexQuery, Labels, METRIC_NAME_LABEL};
use sha1::{Digest, Sha1};
use snafu::{ensure, OptionExt};

use crate::bucket::Bucket;
use crate::range_key::{
    build_range_key, encode_base64_value, encode_time, RANGE_KEY_V1, RANGE_KEY_V2, RANGE_KEY_V3,
    RANGE_KEY_V4, RANGE_KEY_V5, RANGE_KEY_V6,
};
use crate::{NoMetricNameQueriesSnafu, NoMetricNameSnafu, NullByteInLabelValueSnafu, Result};

/// Bucket-local entry and query production.
///
/// Implementations are stateless values; a strategy that cannot serve a
/// read shape errors rather than returning nothing.
pub(crate) trait BucketEntries: std::fmt::Debug + Send + Sync {
    /// Entries to write for one chunk within one bucket.
    fn write_entries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        labels: &Labels,
        chunk_id: &str,
    ) -> Result<Vec<IndexEntry>>;

    /// Queries serving a metric-name-agnostic read of the bucket.
    fn queries(&self, bucket: &Bucket) -> Result<Vec<IndexQuery>>;

    /// Queries serving "all chunks for a metric".
    fn metric_queries(&self, bucket: &Bucket, metric_name: &str) -> Result<Vec<IndexQuery>>;

    /// Queries serving "all chunks for a metric and label name".
    fn metric_label_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
    ) -> Result<Vec<IndexQuery>>;

    /// Queries serving "all chunks for a metric carrying a given label
    /// value".
    fn metric_label_value_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
        label_value: &str,
    ) -> Result<Vec<IndexQuery>>;
}

fn metric_hash_key(bucket: &Bucket, metric_name: &str) -> String {
    format!("{}:{}", bucket.hash_key, metric_name)
}

fn label_hash_key(bucket: &Bucket, metric_name: &str, label_name: &str) -> String {
    format!("{}:{}:{}", bucket.hash_key, metric_name, label_name)
}

/// The original layout (v1 hourly, v2 daily): raw label values inside the
/// range key, everything on the per-metric row.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct OriginalEntries;

impl BucketEntries for OriginalEntries {
    fn write_entries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        labels: &Labels,
        chunk_id: &str,
    ) -> Result<Vec<IndexEntry>> {
        let chunk_id_bytes = chunk_id.as_bytes();
        let mut entries = Vec::new();
        for (name, value) in labels.iter() {
            if name == METRIC_NAME_LABEL {
                continue;
            }
            // Raw values share the key with NUL separators, so a NUL in
            // the value would corrupt the key.
            ensure!(!value.contains('\0'), NullByteInLabelValueSnafu);
            entries.push(IndexEntry {
                table_name: bucket.table_name.clone(),
                hash_key: metric_hash_key(bucket, metric_name),
                range_key: build_range_key(&[name.as_bytes(), value.as_bytes(), chunk_id_bytes]),
                value: Vec::new(),
            });
        }
        Ok(entries)
    }

    fn queries(&self, _bucket: &Bucket) -> Result<Vec<IndexQuery>> {
        NoMetricNameQueriesSnafu {
            strategy: "original entries",
        }
        .fail()
    }

    fn metric_queries(&self, bucket: &Bucket, metric_name: &str) -> Result<Vec<IndexQuery>> {
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: metric_hash_key(bucket, metric_name),
            ..Default::default()
        }])
    }

    fn metric_label_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
    ) -> Result<Vec<IndexQuery>> {
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: metric_hash_key(bucket, metric_name),
            range_prefix: Some(build_range_key(&[label_name.as_bytes()])),
            ..Default::default()
        }])
    }

    fn metric_label_value_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
        label_value: &str,
    ) -> Result<Vec<IndexQuery>> {
        ensure!(!label_value.contains('\0'), NullByteInLabelValueSnafu);
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: metric_hash_key(bucket, metric_name),
            range_prefix: Some(build_range_key(&[
                label_name.as_bytes(),
                label_value.as_bytes(),
            ])),
            ..Default::default()
        }])
    }
}

/// The v3 layout: base-64 label values and a trailing version component
/// in the range key.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Base64Entries;

impl BucketEntries for Base64Entries {
    fn write_entries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        labels: &Labels,
        chunk_id: &str,
    ) -> Result<Vec<IndexEntry>> {
        let chunk_id_bytes = chunk_id.as_bytes();
        let mut entries = Vec::new();
        for (name, value) in labels.iter() {
            if name == METRIC_NAME_LABEL {
                continue;
            }
            let encoded = encode_base64_value(value);
            entries.push(IndexEntry {
                table_name: bucket.table_name.clone(),
                hash_key: metric_hash_key(bucket, metric_name),
                range_key: build_range_key(&[
                    name.as_bytes(),
                    &encoded,
                    chunk_id_bytes,
                    RANGE_KEY_V1,
                ]),
                value: Vec::new(),
            });
        }
        Ok(entries)
    }

    fn queries(&self, _bucket: &Bucket) -> Result<Vec<IndexQuery>> {
        NoMetricNameQueriesSnafu {
            strategy: "base64 entries",
        }
        .fail()
    }

    fn metric_queries(&self, bucket: &Bucket, metric_name: &str) -> Result<Vec<IndexQuery>> {
        OriginalEntries.metric_queries(bucket, metric_name)
    }

    fn metric_label_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
    ) -> Result<Vec<IndexQuery>> {
        OriginalEntries.metric_label_queries(bucket, metric_name, label_name)
    }

    fn metric_label_value_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
        label_value: &str,
    ) -> Result<Vec<IndexQuery>> {
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: metric_hash_key(bucket, metric_name),
            range_prefix: Some(build_range_key(&[
                label_name.as_bytes(),
                &encode_base64_value(label_value),
            ])),
            ..Default::default()
        }])
    }
}

/// The v4 layout writes two kinds of row per chunk: a per-label row whose
/// hash key carries the label name, and a bare per-metric row listing the
/// chunk once.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LabelNameInHashKeyEntries;

impl BucketEntries for LabelNameInHashKeyEntries {
    fn write_entries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        labels: &Labels,
        chunk_id: &str,
    ) -> Result<Vec<IndexEntry>> {
        let chunk_id_bytes = chunk_id.as_bytes();
        let mut entries = vec![IndexEntry {
            table_name: bucket.table_name.clone(),
            hash_key: metric_hash_key(bucket, metric_name),
            range_key: build_range_key(&[&[], &[], chunk_id_bytes, RANGE_KEY_V2]),
            value: Vec::new(),
        }];

        for (name, value) in labels.iter() {
            if name == METRIC_NAME_LABEL {
                continue;
            }
            let encoded = encode_base64_value(value);
            entries.push(IndexEntry {
                table_name: bucket.table_name.clone(),
                hash_key: label_hash_key(bucket, metric_name, name),
                range_key: build_range_key(&[&[], &encoded, chunk_id_bytes, RANGE_KEY_V1]),
                value: Vec::new(),
            });
        }

        Ok(entries)
    }

    fn queries(&self, _bucket: &Bucket) -> Result<Vec<IndexQuery>> {
        NoMetricNameQueriesSnafu {
            strategy: "label-name-in-hash-key entries",
        }
        .fail()
    }

    fn metric_queries(&self, bucket: &Bucket, metric_name: &str) -> Result<Vec<IndexQuery>> {
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: metric_hash_key(bucket, metric_name),
            ..Default::default()
        }])
    }

    fn metric_label_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
    ) -> Result<Vec<IndexQuery>> {
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: label_hash_key(bucket, metric_name, label_name),
            ..Default::default()
        }])
    }

    fn metric_label_value_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
        label_value: &str,
    ) -> Result<Vec<IndexQuery>> {
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: label_hash_key(bucket, metric_name, label_name),
            range_prefix: Some(build_range_key(&[&[], &encode_base64_value(label_value)])),
            ..Default::default()
        }])
    }
}

/// The v5 layout puts the chunk end time at the front of the range key.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct V5Entries;

impl BucketEntries for V5Entries {
    fn write_entries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        labels: &Labels,
        chunk_id: &str,
    ) -> Result<Vec<IndexEntry>> {
        let chunk_id_bytes = chunk_id.as_bytes();
        let encoded_through = encode_time(bucket.through);

        let mut entries = vec![IndexEntry {
            table_name: bucket.table_name.clone(),
            hash_key: metric_hash_key(bucket, metric_name),
            range_key: build_range_key(&[&encoded_through, &[], chunk_id_bytes, RANGE_KEY_V3]),
            value: Vec::new(),
        }];

        for (name, value) in labels.iter() {
            if name == METRIC_NAME_LABEL {
                continue;
            }
            let encoded = encode_base64_value(value);
            entries.push(IndexEntry {
                table_name: bucket.table_name.clone(),
                hash_key: label_hash_key(bucket, metric_name, name),
                range_key: build_range_key(&[
                    &encoded_through,
                    &encoded,
                    chunk_id_bytes,
                    RANGE_KEY_V4,
                ]),
                value: Vec::new(),
            });
        }

        Ok(entries)
    }

    fn queries(&self, _bucket: &Bucket) -> Result<Vec<IndexQuery>> {
        NoMetricNameQueriesSnafu {
            strategy: "v5 entries",
        }
        .fail()
    }

    fn metric_queries(&self, bucket: &Bucket, metric_name: &str) -> Result<Vec<IndexQuery>> {
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: metric_hash_key(bucket, metric_name),
            ..Default::default()
        }])
    }

    fn metric_label_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
    ) -> Result<Vec<IndexQuery>> {
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: label_hash_key(bucket, metric_name, label_name),
            ..Default::default()
        }])
    }

    fn metric_label_value_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
        _label_value: &str,
    ) -> Result<Vec<IndexQuery>> {
        // The end time precedes the value in the range key, so a value
        // prefix cannot prune anything; the value is ignored and callers
        // filter the row scan themselves.
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: label_hash_key(bucket, metric_name, label_name),
            ..Default::default()
        }])
    }
}

/// The v6 layout keeps the v5 end times but moves the label value out of
/// the range key into the value cell, restoring value lookups and making
/// the end times usable for pruning.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct V6Entries;

impl BucketEntries for V6Entries {
    fn write_entries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        labels: &Labels,
        chunk_id: &str,
    ) -> Result<Vec<IndexEntry>> {
        let chunk_id_bytes = chunk_id.as_bytes();
        let encoded_through = encode_time(bucket.through);

        let mut entries = vec![IndexEntry {
            table_name: bucket.table_name.clone(),
            hash_key: metric_hash_key(bucket, metric_name),
            range_key: build_range_key(&[&encoded_through, &[], chunk_id_bytes, RANGE_KEY_V3]),
            value: Vec::new(),
        }];

        for (name, value) in labels.iter() {
            if name == METRIC_NAME_LABEL {
                continue;
            }
            entries.push(IndexEntry {
                table_name: bucket.table_name.clone(),
                hash_key: label_hash_key(bucket, metric_name, name),
                range_key: build_range_key(&[
                    &encoded_through,
                    &[],
                    chunk_id_bytes,
                    RANGE_KEY_V5,
                ]),
                value: value.as_bytes().to_vec(),
            });
        }

        Ok(entries)
    }

    fn queries(&self, _bucket: &Bucket) -> Result<Vec<IndexQuery>> {
        NoMetricNameQueriesSnafu {
            strategy: "v6 entries",
        }
        .fail()
    }

    fn metric_queries(&self, bucket: &Bucket, metric_name: &str) -> Result<Vec<IndexQuery>> {
        // Entries sort by end time, so starting at the query's from time
        // skips chunks that ended before it.
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: metric_hash_key(bucket, metric_name),
            range_start: Some(build_range_key(&[&encode_time(bucket.from)])),
            ..Default::default()
        }])
    }

    fn metric_label_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
    ) -> Result<Vec<IndexQuery>> {
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: label_hash_key(bucket, metric_name, label_name),
            range_start: Some(build_range_key(&[&encode_time(bucket.from)])),
            ..Default::default()
        }])
    }

    fn metric_label_value_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
        _label_value: &str,
    ) -> Result<Vec<IndexQuery>> {
        // The label value is in the value cell, which the store cannot
        // filter on; callers match it against the returned cells.
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: label_hash_key(bucket, metric_name, label_name),
            range_start: Some(build_range_key(&[&encode_time(bucket.from)])),
            ..Default::default()
        }])
    }
}

/// The v7 layout extends v6 with a per-bucket metric-name row, making
/// reads with no metric name possible.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct V7Entries {
    v6: V6Entries,
}

impl BucketEntries for V7Entries {
    fn write_entries(
        &self,
        bucket: &Bucket,
        _metric_name: &str,
        labels: &Labels,
        chunk_id: &str,
    ) -> Result<Vec<IndexEntry>> {
        let metric_name = labels.metric_name().context(NoMetricNameSnafu)?;

        let chunk_id_bytes = chunk_id.as_bytes();
        let encoded_through = encode_time(bucket.through);
        let metric_name_hash = Sha1::digest(metric_name);

        // The bare bucket row lists every metric name seen in the bucket,
        // keyed by name hash, with the raw name in the value cell.
        let mut entries = vec![IndexEntry {
            table_name: bucket.table_name.clone(),
            hash_key: bucket.hash_key.clone(),
            range_key: build_range_key(&[&[], &[], metric_name_hash.as_slice(), RANGE_KEY_V6]),
            value: metric_name.as_bytes().to_vec(),
        }];

        entries.push(IndexEntry {
            table_name: bucket.table_name.clone(),
            hash_key: metric_hash_key(bucket, metric_name),
            range_key: build_range_key(&[&encoded_through, &[], chunk_id_bytes, RANGE_KEY_V3]),
            value: Vec::new(),
        });

        for (name, value) in labels.iter() {
            if name == METRIC_NAME_LABEL {
                continue;
            }
            entries.push(IndexEntry {
                table_name: bucket.table_name.clone(),
                hash_key: label_hash_key(bucket, metric_name, name),
                range_key: build_range_key(&[
                    &encoded_through,
                    &[],
                    chunk_id_bytes,
                    RANGE_KEY_V5,
                ]),
                value: value.as_bytes().to_vec(),
            });
        }

        Ok(entries)
    }

    fn queries(&self, bucket: &Bucket) -> Result<Vec<IndexQuery>> {
        Ok(vec![IndexQuery {
            table_name: bucket.table_name.clone(),
            hash_key: bucket.hash_key.clone(),
            ..Default::default()
        }])
    }

    fn metric_queries(&self, bucket: &Bucket, metric_name: &str) -> Result<Vec<IndexQuery>> {
        self.v6.metric_queries(bucket, metric_name)
    }

    fn metric_label_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
    ) -> Result<Vec<IndexQuery>> {
        self.v6.metric_label_queries(bucket, metric_name, label_name)
    }

    fn metric_label_value_queries(
        &self,
        bucket: &Bucket,
        metric_name: &str,
        label_name: &str,
        label_value: &str,
    ) -> Result<Vec<IndexQuery>> {
        self.v6
            .metric_label_value_queries(bucket, metric_name, label_name, label_value)
    }
}
