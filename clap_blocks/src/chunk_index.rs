//! CLI config for the chunk index schema engine.

use std::time::Duration;

use chunk_index::{DayValue, PeriodicTableConfig, SchemaConfig};

/// CLI config for chunk index schemas and their cutover dates.
#[derive(Debug, Clone, clap::Parser)]
pub struct ChunkIndexConfig {
    /// The name of the index table used before versioned schemas were
    /// introduced.
    #[clap(
        long = "chunk-index-original-table-name",
        env = "CHUNK_INDEX_ORIGINAL_TABLE_NAME",
        default_value = ""
    )]
    pub original_table_name: String,

    /// Shard the index into one table per period instead of using the
    /// original table for everything.
    #[clap(
        long = "chunk-index-use-periodic-tables",
        env = "CHUNK_INDEX_USE_PERIODIC_TABLES"
    )]
    pub use_periodic_tables: bool,

    /// Name prefix of the periodic tables.
    #[clap(
        long = "chunk-index-table-prefix",
        env = "CHUNK_INDEX_TABLE_PREFIX",
        default_value = "index_"
    )]
    pub table_prefix: String,

    /// Length of each periodic table's period.
    #[clap(
        long = "chunk-index-table-period",
        env = "CHUNK_INDEX_TABLE_PERIOD",
        default_value = "168h",
        value_parser = humantime::parse_duration
    )]
    pub table_period: Duration,

    /// The day (YYYY-MM-DD) the first periodic table takes effect.
    #[clap(
        long = "chunk-index-periodic-table-start-at",
        env = "CHUNK_INDEX_PERIODIC_TABLE_START_AT"
    )]
    pub periodic_table_start_at: Option<DayValue>,

    /// The first day (YYYY-MM-DD) for which index buckets are day-sized
    /// rather than hour-sized.
    #[clap(
        long = "chunk-index-daily-buckets-from",
        env = "CHUNK_INDEX_DAILY_BUCKETS_FROM"
    )]
    pub daily_buckets_from: Option<DayValue>,

    /// The first day (YYYY-MM-DD) from which label values are written
    /// base-64 encoded.
    #[clap(
        long = "chunk-index-base64-values-from",
        env = "CHUNK_INDEX_BASE64_VALUES_FROM"
    )]
    pub base64_values_from: Option<DayValue>,

    /// The first day (YYYY-MM-DD) of the v4 schema.
    #[clap(
        long = "chunk-index-v4-schema-from",
        env = "CHUNK_INDEX_V4_SCHEMA_FROM"
    )]
    pub v4_schema_from: Option<DayValue>,

    /// The first day (YYYY-MM-DD) of the v5 schema.
    #[clap(
        long = "chunk-index-v5-schema-from",
        env = "CHUNK_INDEX_V5_SCHEMA_FROM"
    )]
    pub v5_schema_from: Option<DayValue>,

    /// The first day (YYYY-MM-DD) of the v6 schema.
    #[clap(
        long = "chunk-index-v6-schema-from",
        env = "CHUNK_INDEX_V6_SCHEMA_FROM"
    )]
    pub v6_schema_from: Option<DayValue>,

    /// The first day (YYYY-MM-DD) of the v7 schema.
    #[clap(
        long = "chunk-index-v7-schema-from",
        env = "CHUNK_INDEX_V7_SCHEMA_FROM"
    )]
    pub v7_schema_from: Option<DayValue>,
}

impl ChunkIndexConfig {
    /// The [`SchemaConfig`] described by these flags.
    pub fn schema_config(&self) -> SchemaConfig {
        SchemaConfig {
            original_table_name: self.original_table_name.clone(),
            periodic_tables: PeriodicTableConfig {
                enabled: self.use_periodic_tables,
                table_prefix: self.table_prefix.clone(),
                table_period: self.table_period,
                start_at: self.periodic_table_start_at,
            },
            daily_buckets_from: self.daily_buckets_from,
            base64_values_from: self.base64_values_from,
            v4_schema_from: self.v4_schema_from,
            v5_schema_from: self.v5_schema_from,
            v6_schema_from: self.v6_schema_from,
            v7_schema_from: self.v7_schema_from,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_index::{CompositeSchema, Schema};
    use clap::Parser;
    use data_types::{Labels, Time, METRIC_NAME_LABEL};

    #[test]
    fn test_defaults() {
        let cfg = ChunkIndexConfig::parse_from(["server"]);
        let schema_cfg = cfg.schema_config();

        assert_eq!(
            schema_cfg,
            SchemaConfig {
                original_table_name: String::new(),
                periodic_tables: PeriodicTableConfig {
                    enabled: false,
                    table_prefix: "index_".to_string(),
                    table_period: Duration::from_secs(168 * 60 * 60),
                    start_at: None,
                },
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_flags_round_trip_into_a_working_schema() {
        let cfg = ChunkIndexConfig::parse_from([
            "server",
            "--chunk-index-original-table-name",
            "table",
            "--chunk-index-daily-buckets-from",
            "1970-01-02",
            "--chunk-index-base64-values-from",
            "1970-01-04",
        ]);

        let composite = CompositeSchema::new(cfg.schema_config()).unwrap();
        let labels: Labels = [(METRIC_NAME_LABEL, "foo"), ("bar", "baz")]
            .into_iter()
            .collect();

        // Day 5 is past the base64 cutover, so writes use versioned,
        // encoded range keys.
        let entries = composite
            .write_entries(
                Time::from_unix(5 * 24 * 60 * 60),
                Time::from_unix(5 * 24 * 60 * 60 + 60) - 1,
                "userid",
                "foo",
                &labels,
                "chunkID",
            )
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].table_name, "table");
        assert_eq!(entries[0].hash_key, "userid:d5:foo");
        assert_eq!(entries[0].range_key, b"bar\x00YmF6\x00chunkID\x001\x00");
    }

    #[test]
    fn test_periodic_table_flags() {
        let cfg = ChunkIndexConfig::parse_from([
            "server",
            "--chunk-index-original-table-name",
            "table",
            "--chunk-index-use-periodic-tables",
            "--chunk-index-table-prefix",
            "weekly_",
            "--chunk-index-table-period",
            "48h",
            "--chunk-index-periodic-table-start-at",
            "1970-01-06",
        ]);
        let schema_cfg = cfg.schema_config();

        assert!(schema_cfg.periodic_tables.enabled);
        assert_eq!(schema_cfg.periodic_tables.table_prefix, "weekly_");
        assert_eq!(
            schema_cfg.periodic_tables.table_period,
            Duration::from_secs(48 * 60 * 60)
        );
        assert_eq!(
            schema_cfg.periodic_tables.start_at,
            Some(DayValue::new(Time::from_unix(5 * 24 * 60 * 60)))
        );
        schema_cfg.validate().unwrap();
    }

    #[test]
    fn test_invalid_dates_are_rejected() {
        let result = ChunkIndexConfig::try_parse_from([
            "server",
            "--chunk-index-daily-buckets-from",
            "not-a-date",
        ]);
        assert!(result.is_err());
    }
}
