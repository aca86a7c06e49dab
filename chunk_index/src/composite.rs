//! Dispatching writes and reads across the schema versions active over a
//! time range.

use data_types::{IndexEntry, IndexQuery, Labels, Time};
use observability_deps::tracing::debug;
use snafu::ensure;

use crate::config::SchemaConfig;
use crate::schema::{
    v1_schema, v2_schema, v3_schema, v4_schema, v5_schema, v6_schema, v7_schema, Schema,
};
use crate::{Result, SchemasNotSortedSnafu};

/// A [`Schema`] delegating to whichever schema version was active at each
/// instant of the requested range.
///
/// The index is append-only, so a cutover only changes what new writes
/// look like; data written under an older version stays readable through
/// that version forever.
#[derive(Debug)]
pub struct CompositeSchema {
    schemas: Vec<SchemaEntry>,
}

#[derive(Debug)]
struct SchemaEntry {
    start: Time,
    schema: Box<dyn Schema>,
}

impl CompositeSchema {
    /// Build the activation list from `cfg`.
    ///
    /// The v1 schema is always active from the epoch; each configured
    /// cutover day activates the next version from its midnight onwards.
    /// Cutovers must be in ascending order.
    pub fn new(cfg: SchemaConfig) -> Result<Self> {
        cfg.validate()?;

        let mut schemas = vec![SchemaEntry {
            start: Time::from_millis(0),
            schema: Box::new(v1_schema(cfg.clone())) as Box<dyn Schema>,
        }];

        if let Some(day) = cfg.daily_buckets_from {
            schemas.push(SchemaEntry {
                start: day.time(),
                schema: Box::new(v2_schema(cfg.clone())),
            });
        }
        if let Some(day) = cfg.base64_values_from {
            schemas.push(SchemaEntry {
                start: day.time(),
                schema: Box::new(v3_schema(cfg.clone())),
            });
        }
        if let Some(day) = cfg.v4_schema_from {
            schemas.push(SchemaEntry {
                start: day.time(),
                schema: Box::new(v4_schema(cfg.clone())),
            });
        }
        if let Some(day) = cfg.v5_schema_from {
            schemas.push(SchemaEntry {
                start: day.time(),
                schema: Box::new(v5_schema(cfg.clone())),
            });
        }
        if let Some(day) = cfg.v6_schema_from {
            schemas.push(SchemaEntry {
                start: day.time(),
                schema: Box::new(v6_schema(cfg.clone())),
            });
        }
        if let Some(day) = cfg.v7_schema_from {
            schemas.push(SchemaEntry {
                start: day.time(),
                schema: Box::new(v7_schema(cfg.clone())),
            });
        }

        ensure!(
            schemas.windows(2).all(|pair| pair[0].start <= pair[1].start),
            SchemasNotSortedSnafu
        );

        debug!(
            activations = ?schemas.iter().map(|entry| entry.start.millis()).collect::<Vec<_>>(),
            "constructed composite schema"
        );

        Ok(Self { schemas })
    }

    /// Invoke `f` once per schema whose activation window intersects
    /// `[from, through]`, handing each the sub-range it owns, and
    /// concatenate the results.
    fn for_schemas<T>(
        &self,
        from: Time,
        through: Time,
        mut f: impl FnMut(Time, Time, &dyn Schema) -> Result<Vec<T>>,
    ) -> Result<Vec<T>> {
        if self.schemas.is_empty() {
            return Ok(Vec::new());
        }

        // The schema with the greatest activation at or before `from`
        // owns the head of the range. A `from` before the first
        // activation (a pre-1970 sample) clamps up to it.
        let mut from = from;
        let first_after = self.schemas.partition_point(|entry| entry.start <= from);
        let i = if first_after > 0 {
            first_after - 1
        } else {
            from = self.schemas[0].start;
            0
        };

        // One past the last schema activated at or before `through`.
        let j = self.schemas.partition_point(|entry| entry.start <= through);

        let mut start = from;
        let mut result = Vec::new();
        for k in i..j {
            let next_start = self
                .schemas
                .get(k + 1)
                .map(|entry| entry.start)
                .unwrap_or(Time::MAX);

            // Two schemas activated at the same instant: the later
            // registration supersedes this one.
            if next_start == self.schemas[k].start {
                continue;
            }

            let end = through.min(next_start - 1);
            result.extend(f(start, end, self.schemas[k].schema.as_ref())?);
            start = next_start;
        }

        Ok(result)
    }
}

impl Schema for CompositeSchema {
    fn write_entries(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
        metric_name: &str,
        labels: &Labels,
        chunk_id: &str,
    ) -> Result<Vec<IndexEntry>> {
        self.for_schemas(from, through, |from, through, schema| {
            schema.write_entries(from, through, tenant_id, metric_name, labels, chunk_id)
        })
    }

    fn read_queries(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
    ) -> Result<Vec<IndexQuery>> {
        self.for_schemas(from, through, |from, through, schema| {
            schema.read_queries(from, through, tenant_id)
        })
    }

    fn read_queries_for_metric(
        &self,
        from: Time,
        through: Time,
        tenant_id: &str,
        metric_name: &str,
    ) -> Result<Vec<IndexQuery>> {
        self.for_schemas(from, through, |from, through, schema| {
            schema.read_queries_for_metric(from, through, tenant_id, metric_name)
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
        self.for_schemas(from, through, |from, through, schema| {
            schema.read_queries_for_metric_label(from, through, tenant_id, metric_name, label_name)
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
        self.for_schemas(from, through, |from, through, schema| {
            schema.read_queries_for_metric_label_value(
                from,
                through,
                tenant_id,
                metric_name,
                label_name,
                label_value,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DayValue, PeriodicTableConfig};
    use crate::Error;
    use assert_matches::assert_matches;
    use data_types::METRIC_NAME_LABEL;
    use std::time::Duration;

    const SECONDS_IN_DAY: i64 = 24 * 60 * 60;

    /// Records the sub-range it is invoked with, as a marker entry.
    #[derive(Debug)]
    struct MockSchema(u8);

    impl MockSchema {
        fn marker(&self, from: Time, through: Time) -> IndexEntry {
            IndexEntry {
                table_name: format!("mock{}", self.0),
                hash_key: format!("{}:{}", from.millis(), through.millis()),
                ..Default::default()
            }
        }
    }

    impl Schema for MockSchema {
        fn write_entries(
            &self,
            from: Time,
            through: Time,
            _tenant_id: &str,
            _metric_name: &str,
            _labels: &Labels,
            _chunk_id: &str,
        ) -> Result<Vec<IndexEntry>> {
            Ok(vec![self.marker(from, through)])
        }

        fn read_queries(
            &self,
            from: Time,
            through: Time,
            _tenant_id: &str,
        ) -> Result<Vec<IndexQuery>> {
            Ok(vec![IndexQuery {
                table_name: format!("mock{}", self.0),
                hash_key: format!("{}:{}", from.millis(), through.millis()),
                ..Default::default()
            }])
        }

        fn read_queries_for_metric(
            &self,
            _from: Time,
            _through: Time,
            _tenant_id: &str,
            _metric_name: &str,
        ) -> Result<Vec<IndexQuery>> {
            Ok(Vec::new())
        }

        fn read_queries_for_metric_label(
            &self,
            _from: Time,
            _through: Time,
            _tenant_id: &str,
            _metric_name: &str,
            _label_name: &str,
        ) -> Result<Vec<IndexQuery>> {
            Ok(Vec::new())
        }

        fn read_queries_for_metric_label_value(
            &self,
            _from: Time,
            _through: Time,
            _tenant_id: &str,
            _metric_name: &str,
            _label_name: &str,
            _label_value: &str,
        ) -> Result<Vec<IndexQuery>> {
            Ok(Vec::new())
        }
    }

    fn mock_composite(starts: Vec<(i64, u8)>) -> CompositeSchema {
        CompositeSchema {
            schemas: starts
                .into_iter()
                .map(|(start, id)| SchemaEntry {
                    start: Time::from_unix(start),
                    schema: Box::new(MockSchema(id)) as Box<dyn Schema>,
                })
                .collect(),
        }
    }

    fn dispatch(cs: &CompositeSchema, from: i64, through: i64) -> Vec<(u8, i64, i64)> {
        let labels: Labels = [(METRIC_NAME_LABEL, "foo")].into_iter().collect();
        cs.write_entries(
            Time::from_unix(from),
            Time::from_unix(through),
            "userid",
            "foo",
            &labels,
            "chunkID",
        )
        .unwrap()
        .into_iter()
        .map(|entry| {
            let id = entry.table_name.strip_prefix("mock").unwrap().parse().unwrap();
            let (from, through) = entry.hash_key.split_once(':').unwrap();
            (id, from.parse().unwrap(), through.parse().unwrap())
        })
        .collect()
    }

    #[test]
    fn test_dispatch_with_no_schemas() {
        assert_eq!(dispatch(&mock_composite(vec![]), 0, 1), vec![]);
    }

    #[test]
    fn test_dispatch_single_schema() {
        let cs = mock_composite(vec![(0, 1)]);
        assert_eq!(dispatch(&cs, 0, 10), vec![(1, 0, 10_000)]);
    }

    #[test]
    fn test_dispatch_pre_epoch_ranges() {
        let cs = mock_composite(vec![(0, 1)]);

        // Entirely before the first activation: nothing to do.
        assert_eq!(dispatch(&cs, -10, -9), vec![]);

        // Partially before: clamps up to the first activation.
        assert_eq!(dispatch(&cs, -10, 10), vec![(1, 0, 10_000)]);
    }

    #[test]
    fn test_dispatch_two_schemas() {
        let cs = mock_composite(vec![(0, 1), (100, 2)]);
        assert_eq!(
            dispatch(&cs, 34, 165),
            vec![(1, 34_000, 100_000 - 1), (2, 100_000, 165_000)]
        );
    }

    #[test]
    fn test_dispatch_duplicate_activation_times() {
        // The later registration at an activation time supersedes the
        // earlier one entirely.
        let cs = mock_composite(vec![(0, 1), (10, 2), (10, 3)]);
        assert_eq!(
            dispatch(&cs, 0, 165),
            vec![(1, 0, 10_000 - 1), (3, 10_000, 165_000)]
        );
    }

    #[test]
    fn test_dispatch_three_schemas() {
        let cs = mock_composite(vec![(0, 1), (100, 2), (200, 3)]);

        assert_eq!(dispatch(&cs, 34, 65), vec![(1, 34_000, 65_000)]);
        assert_eq!(dispatch(&cs, 244, 6785), vec![(3, 244_000, 6_785_000)]);
        assert_eq!(
            dispatch(&cs, 34, 165),
            vec![(1, 34_000, 100_000 - 1), (2, 100_000, 165_000)]
        );
        assert_eq!(
            dispatch(&cs, 151, 264),
            vec![(2, 151_000, 200_000 - 1), (3, 200_000, 264_000)]
        );
        assert_eq!(
            dispatch(&cs, 32, 264),
            vec![
                (1, 32_000, 100_000 - 1),
                (2, 100_000, 200_000 - 1),
                (3, 200_000, 264_000),
            ]
        );
    }

    #[test]
    fn test_dispatch_covers_range_without_overlap() {
        let cs = mock_composite(vec![(0, 1), (100, 2), (200, 3), (300, 4)]);
        for (from, through) in [(0, 1000), (50, 250), (99, 100), (100, 100), (299, 301)] {
            let handled = dispatch(&cs, from, through);
            // Sub-ranges abut exactly: each starts one millisecond after
            // the previous one ends, and the ends are the query bounds.
            assert_eq!(handled.first().unwrap().1, from * 1000);
            assert_eq!(handled.last().unwrap().2, through * 1000);
            for pair in handled.windows(2) {
                assert_eq!(pair[0].2 + 1, pair[1].1);
            }
        }
    }

    #[test]
    fn test_read_queries_dispatch_like_writes() {
        let cs = mock_composite(vec![(0, 1), (100, 2)]);
        let queries = cs
            .read_queries(Time::from_unix(34), Time::from_unix(165), "userid")
            .unwrap();
        let seen: Vec<_> = queries
            .iter()
            .map(|q| (q.table_name.as_str(), q.hash_key.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![("mock1", "34000:99999"), ("mock2", "100000:165000")]
        );
    }

    fn day(n: i64) -> DayValue {
        DayValue::new(Time::from_unix(n * SECONDS_IN_DAY))
    }

    fn periodic_config() -> SchemaConfig {
        SchemaConfig {
            original_table_name: "table".to_string(),
            periodic_tables: PeriodicTableConfig {
                enabled: true,
                table_prefix: "periodicPrefix".to_string(),
                table_period: Duration::from_secs(2 * 24 * 60 * 60),
                start_at: Some(day(5)),
            },
            ..Default::default()
        }
    }

    /// Hash keys produced by a composite write over `[from, through]`
    /// seconds, with range keys and values cleared so only the bucketing
    /// is compared.
    fn hash_keys(cs: &CompositeSchema, from: i64, through: i64) -> Vec<IndexEntry> {
        let labels: Labels = [(METRIC_NAME_LABEL, "foo"), ("bar", "baz")]
            .into_iter()
            .collect();
        let mut entries = cs
            .write_entries(
                Time::from_unix(from),
                Time::from_unix(through),
                "userid",
                "foo",
                &labels,
                "chunkID",
            )
            .unwrap();
        for entry in &mut entries {
            entry.range_key = Vec::new();
            entry.value = Vec::new();
        }
        entries.sort();
        entries
    }

    fn mk_result(table: &str, hash: impl Fn(i64) -> String, from: i64, through: i64) -> Vec<IndexEntry> {
        (from..through)
            .map(|i| IndexEntry {
                table_name: table.to_string(),
                hash_key: hash(i),
                ..Default::default()
            })
            .collect()
    }

    fn sorted(mut entries: Vec<IndexEntry>) -> Vec<IndexEntry> {
        entries.sort();
        entries
    }

    #[test]
    fn test_hourly_buckets_until_the_daily_cutover() {
        let cs = CompositeSchema::new(SchemaConfig {
            daily_buckets_from: Some(day(1)),
            ..periodic_config_disabled()
        })
        .unwrap();

        assert_eq!(
            hash_keys(&cs, 0, 3 * SECONDS_IN_DAY - 1),
            sorted(
                [
                    mk_result("table", |i| format!("userid:{i}:foo"), 0, 24),
                    mk_result("table", |i| format!("userid:d{i}:foo"), 1, 3),
                ]
                .concat()
            ),
        );
    }

    #[test]
    fn test_only_the_day_part_of_a_cutover_matters() {
        // A cutover just before the second midnight still lands on day 1.
        let cs = CompositeSchema::new(SchemaConfig {
            daily_buckets_from: Some(DayValue::new(
                Time::from_unix(2 * SECONDS_IN_DAY) - 1,
            )),
            ..periodic_config_disabled()
        })
        .unwrap();
        assert_eq!(
            hash_keys(&cs, 0, 3 * SECONDS_IN_DAY - 1),
            sorted(
                [
                    mk_result("table", |i| format!("userid:{i}:foo"), 0, 24),
                    mk_result("table", |i| format!("userid:d{i}:foo"), 1, 3),
                ]
                .concat()
            ),
        );

        // One millisecond earlier floors to the previous day, and the 24
        // hourly buckets disappear.
        let cs = CompositeSchema::new(SchemaConfig {
            daily_buckets_from: Some(DayValue::new(Time::from_unix(SECONDS_IN_DAY) - 1)),
            ..periodic_config_disabled()
        })
        .unwrap();
        assert_eq!(
            hash_keys(&cs, 0, 3 * SECONDS_IN_DAY - 1),
            sorted(mk_result("table", |i| format!("userid:d{i}:foo"), 0, 3)),
        );
    }

    #[test]
    fn test_cutover_after_the_interval_keeps_hourly_buckets() {
        let cs = CompositeSchema::new(SchemaConfig {
            daily_buckets_from: Some(day(99)),
            ..periodic_config_disabled()
        })
        .unwrap();
        assert_eq!(
            hash_keys(&cs, 0, 2 * SECONDS_IN_DAY - 1),
            sorted(mk_result("table", |i| format!("userid:{i}:foo"), 0, 48)),
        );
    }

    #[test]
    fn test_cutover_before_the_interval_is_all_daily() {
        let cs = CompositeSchema::new(SchemaConfig {
            daily_buckets_from: Some(day(0)),
            ..periodic_config_disabled()
        })
        .unwrap();
        assert_eq!(
            hash_keys(&cs, SECONDS_IN_DAY, 3 * SECONDS_IN_DAY - 1),
            sorted(mk_result("table", |i| format!("userid:d{i}:foo"), 1, 3)),
        );
    }

    fn periodic_config_disabled() -> SchemaConfig {
        SchemaConfig {
            original_table_name: "table".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_periodic_tables() {
        let cs = CompositeSchema::new(SchemaConfig {
            daily_buckets_from: Some(day(0)),
            ..periodic_config()
        })
        .unwrap();
        assert_eq!(
            hash_keys(&cs, 5 * SECONDS_IN_DAY, 10 * SECONDS_IN_DAY - 1),
            sorted(
                [
                    mk_result("periodicPrefix2", |i| format!("userid:d{i}:foo"), 5, 6),
                    mk_result("periodicPrefix3", |i| format!("userid:d{i}:foo"), 6, 8),
                    mk_result("periodicPrefix4", |i| format!("userid:d{i}:foo"), 8, 10),
                ]
                .concat()
            ),
        );
    }

    #[test]
    fn test_daily_buckets_then_periodic_tables() {
        let cs = CompositeSchema::new(SchemaConfig {
            daily_buckets_from: Some(day(0)),
            ..periodic_config()
        })
        .unwrap();
        assert_eq!(
            hash_keys(&cs, 0, 10 * SECONDS_IN_DAY - 1),
            sorted(
                [
                    mk_result("table", |i| format!("userid:d{i}:foo"), 0, 5),
                    mk_result("periodicPrefix2", |i| format!("userid:d{i}:foo"), 5, 6),
                    mk_result("periodicPrefix3", |i| format!("userid:d{i}:foo"), 6, 8),
                    mk_result("periodicPrefix4", |i| format!("userid:d{i}:foo"), 8, 10),
                ]
                .concat()
            ),
        );
    }

    #[test]
    fn test_hourly_then_daily_then_periodic_tables() {
        let cs = CompositeSchema::new(SchemaConfig {
            daily_buckets_from: Some(day(2)),
            ..periodic_config()
        })
        .unwrap();
        assert_eq!(
            hash_keys(&cs, 0, 10 * SECONDS_IN_DAY - 1),
            sorted(
                [
                    mk_result("table", |i| format!("userid:{i}:foo"), 0, 48),
                    mk_result("table", |i| format!("userid:d{i}:foo"), 2, 5),
                    mk_result("periodicPrefix2", |i| format!("userid:d{i}:foo"), 5, 6),
                    mk_result("periodicPrefix3", |i| format!("userid:d{i}:foo"), 6, 8),
                    mk_result("periodicPrefix4", |i| format!("userid:d{i}:foo"), 8, 10),
                ]
                .concat()
            ),
        );
    }

    #[test]
    fn test_later_schema_wins_a_shared_cutover_day() {
        // Daily buckets and base64 values cutting over on the same day:
        // only the base64 schema writes from that day onwards.
        let cs = CompositeSchema::new(SchemaConfig {
            daily_buckets_from: Some(day(2)),
            base64_values_from: Some(day(2)),
            ..periodic_config_disabled()
        })
        .unwrap();

        let labels: Labels = [(METRIC_NAME_LABEL, "foo"), ("bar", "baz")]
            .into_iter()
            .collect();
        let entries = cs
            .write_entries(
                Time::from_unix(3 * SECONDS_IN_DAY),
                Time::from_unix(3 * SECONDS_IN_DAY + 60) - 1,
                "userid",
                "foo",
                &labels,
                "chunkID",
            )
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hash_key, "userid:d3:foo");
        assert_eq!(entries[0].range_key, b"bar\x00YmF6\x00chunkID\x001\x00");
    }

    #[test]
    fn test_unsorted_cutovers_are_rejected() {
        let result = CompositeSchema::new(SchemaConfig {
            daily_buckets_from: Some(day(5)),
            base64_values_from: Some(day(2)),
            ..periodic_config_disabled()
        });
        assert_matches!(result, Err(Error::SchemasNotSorted));
    }

    #[test]
    fn test_invalid_periodic_tables_are_rejected() {
        let mut cfg = periodic_config();
        cfg.periodic_tables.table_period = Duration::ZERO;
        assert_matches!(
            CompositeSchema::new(cfg),
            Err(Error::InvalidPeriodicTableConfig)
        );
    }
}
