//! Time buckets: how a chunk's time range maps onto index rows and
//! physical tables.

use data_types::Time;

use crate::config::SchemaConfig;

pub(crate) const SECONDS_IN_HOUR: i64 = 60 * 60;
pub(crate) const SECONDS_IN_DAY: i64 = 24 * SECONDS_IN_HOUR;
pub(crate) const MILLISECONDS_IN_HOUR: i64 = SECONDS_IN_HOUR * 1000;
pub(crate) const MILLISECONDS_IN_DAY: i64 = SECONDS_IN_DAY * 1000;

/// One hour or day of a chunk's time range, mapped onto an index row.
///
/// The hash key pins the bucket's absolute start; `from` and `through`
/// are offsets in milliseconds relative to that start, capped to the
/// bucket boundaries so they fit a u32 even after base-32-free encoding.
/// For chunks spanning multiple buckets, `from` is positive in the first
/// bucket and zero in the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Start offset within the bucket, in milliseconds.
    pub from: u32,

    /// End offset within the bucket, in milliseconds.
    pub through: u32,

    /// Physical table the bucket's rows live in.
    pub table_name: String,

    /// Row hash key prefix: `<tenant>:<bucket>` hourly, or
    /// `<tenant>:d<bucket>` daily.
    pub hash_key: String,
}

/// The granularity a schema version buckets time at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bucketing {
    Hourly,
    Daily,
}

impl SchemaConfig {
    pub(crate) fn buckets(
        &self,
        bucketing: Bucketing,
        from: Time,
        through: Time,
        tenant_id: &str,
    ) -> Vec<Bucket> {
        match bucketing {
            Bucketing::Hourly => self.hourly_buckets(from, through, tenant_id),
            Bucketing::Daily => self.daily_buckets(from, through, tenant_id),
        }
    }

    fn hourly_buckets(&self, from: Time, through: Time, tenant_id: &str) -> Vec<Bucket> {
        let from_hour = from.unix() / SECONDS_IN_HOUR;
        let through_hour = through.unix() / SECONDS_IN_HOUR;

        (from_hour..=through_hour)
            .map(|i| {
                let relative_from = (from.millis() - i * MILLISECONDS_IN_HOUR).max(0);
                // Historical oddity, preserved because rows on disk were
                // written with these offsets: the upper clamp mixes in the
                // day length where the hour length would be expected.
                let relative_through =
                    (through.millis() - i * MILLISECONDS_IN_DAY).min(MILLISECONDS_IN_HOUR);
                Bucket {
                    from: relative_from as u32,
                    through: relative_through as u32,
                    table_name: self.table_for_bucket(i * SECONDS_IN_HOUR),
                    hash_key: format!("{tenant_id}:{i}"),
                }
            })
            .collect()
    }

    fn daily_buckets(&self, from: Time, through: Time, tenant_id: &str) -> Vec<Bucket> {
        let from_day = from.unix() / SECONDS_IN_DAY;
        let through_day = through.unix() / SECONDS_IN_DAY;

        // The hash key carries the bucket start rounded to the day; the
        // range keys carry offsets from that start, capped to the bucket
        // boundaries. Keeping the offsets small is what lets them fit the
        // u32 the range-key time encoding expects.
        (from_day..=through_day)
            .map(|i| {
                let relative_from = (from.millis() - i * MILLISECONDS_IN_DAY).max(0);
                let relative_through =
                    (through.millis() - i * MILLISECONDS_IN_DAY).min(MILLISECONDS_IN_DAY);
                Bucket {
                    from: relative_from as u32,
                    through: relative_through as u32,
                    table_name: self.table_for_bucket(i * SECONDS_IN_DAY),
                    hash_key: format!("{tenant_id}:d{i}"),
                }
            })
            .collect()
    }

    /// The physical table holding a bucket that starts at
    /// `bucket_start_sec` seconds since the epoch.
    pub(crate) fn table_for_bucket(&self, bucket_start_sec: i64) -> String {
        let periodic = &self.periodic_tables;
        if !periodic.enabled {
            return self.original_table_name.clone();
        }
        let Some(start_at) = periodic.start_at else {
            return self.original_table_name.clone();
        };
        if bucket_start_sec < start_at.time().unix() {
            return self.original_table_name.clone();
        }
        format!(
            "{}{}",
            periodic.table_prefix,
            bucket_start_sec / periodic.table_period.as_secs() as i64
        )
    }
}
