//! Schema configuration: table naming, periodic table sharding, and the
//! activation dates of each schema version.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use data_types::Time;
use snafu::ensure;

use crate::bucket::SECONDS_IN_DAY;
use crate::{InvalidPeriodicTableConfigSnafu, Result};

/// A date with day granularity, as used for schema cutovers.
///
/// Construction floors to the start of the UTC day: only the day
/// component is ever significant when comparing cutovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DayValue(Time);

impl DayValue {
    /// The day containing `t`.
    pub fn new(t: Time) -> Self {
        Self(Time::from_unix((t.unix() / SECONDS_IN_DAY) * SECONDS_IN_DAY))
    }

    /// Midnight UTC at the start of the day.
    pub fn time(&self) -> Time {
        self.0
    }
}

impl FromStr for DayValue {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is a valid time");
        Ok(Self(Time::from_unix(midnight.and_utc().timestamp())))
    }
}

impl Display for DayValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let date = chrono::DateTime::from_timestamp(self.0.unix(), 0)
            .expect("day values fit the supported date range");
        write!(f, "{}", date.format("%Y-%m-%d"))
    }
}

/// Sharding of the index into per-period physical tables.
///
/// Once active, a bucket starting at or after `start_at` lands in the
/// table `<table_prefix><N>` with `N = bucket start in seconds divided by
/// the period in seconds`; earlier buckets stay in the original table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodicTableConfig {
    /// Whether periodic tables are in use at all.
    pub enabled: bool,

    /// Name prefix of the per-period tables.
    pub table_prefix: String,

    /// Length of each period. Must be positive when enabled.
    pub table_period: Duration,

    /// Day the first periodic table takes effect. Required when enabled.
    pub start_at: Option<DayValue>,
}

/// Configuration for the full set of chunk index schemas.
///
/// Each `*_from` date activates the corresponding schema version for data
/// from that day onwards; data written earlier stays readable through the
/// version that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaConfig {
    /// Name of the index table used before periodic tables were
    /// introduced.
    pub original_table_name: String,

    /// Periodic-table sharding, if any.
    pub periodic_tables: PeriodicTableConfig,

    /// First day for which index buckets are day-sized rather than
    /// hour-sized.
    pub daily_buckets_from: Option<DayValue>,

    /// First day from which label values are written base-64 encoded.
    pub base64_values_from: Option<DayValue>,

    /// First day of the v4 schema (label names in the hash key).
    pub v4_schema_from: Option<DayValue>,

    /// First day of the v5 schema (chunk end times in the range key).
    pub v5_schema_from: Option<DayValue>,

    /// First day of the v6 schema (label values in the value cell).
    pub v6_schema_from: Option<DayValue>,

    /// First day of the v7 schema (metric name listing rows).
    pub v7_schema_from: Option<DayValue>,
}

impl SchemaConfig {
    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<()> {
        let periodic = &self.periodic_tables;
        if periodic.enabled {
            ensure!(
                !periodic.table_period.is_zero() && periodic.start_at.is_some(),
                InvalidPeriodicTableConfigSnafu
            );
        }
        Ok(())
    }
}
