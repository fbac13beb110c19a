use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, SecondsFormat, Utc};
use serde::Serialize;

/// Time resolution of a metrics chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    #[default]
    Week,
    Month,
}

impl Granularity {
    /// Lenient parse: anything that is not `day` or `month` is a week.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Granularity::Day,
            "month" => Granularity::Month,
            _ => Granularity::Week,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contiguous window of equally sized buckets ending at local midnight of
/// the reference instant.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub bucket_count: usize,
    pub bucket_hours: i64,
}

impl BucketRange {
    pub fn bucket_duration(&self) -> Duration {
        Duration::hours(self.bucket_hours)
    }

    pub fn bucket_starts(&self) -> Vec<DateTime<FixedOffset>> {
        (0..self.bucket_count)
            .map(|i| self.start + Duration::hours(i as i64 * self.bucket_hours))
            .collect()
    }
}

pub fn start_of_day(instant: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    *instant - (instant.time() - NaiveTime::MIN)
}

pub fn get_range(granularity: Granularity, now: &DateTime<FixedOffset>) -> BucketRange {
    let end = start_of_day(now);
    let (start, bucket_count, bucket_hours) = match granularity {
        Granularity::Day => (end - Duration::days(1), 24, 1),
        Granularity::Week => (end - Duration::days(6), 7, 24),
        // A fixed 30-day window, not the calendar month.
        Granularity::Month => (end - Duration::days(29), 30, 24),
    };

    BucketRange {
        start,
        end,
        bucket_count,
        bucket_hours,
    }
}

/// `2024-01-01T00:00:00.000Z` style rendering used on the wire.
pub fn iso_utc(instant: &DateTime<FixedOffset>) -> String {
    instant
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn reference() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 15, 14, 37, 12)
            .unwrap()
    }

    #[test]
    fn day_range_covers_the_prior_day_hour_by_hour() {
        let range = get_range(Granularity::Day, &reference());
        assert_eq!(range.bucket_count, 24);
        assert_eq!(range.bucket_hours, 1);
        assert_eq!(range.end.to_rfc3339(), "2024-03-15T00:00:00+09:00");
        assert_eq!(range.start.to_rfc3339(), "2024-03-14T00:00:00+09:00");

        let starts = range.bucket_starts();
        assert_eq!(starts.len(), 24);
        assert_eq!(starts[0], range.start);
        assert_eq!(starts[23].hour(), 23);
        assert_eq!(starts[23] + range.bucket_duration(), range.end);
    }

    #[test]
    fn week_range_includes_the_reference_day() {
        let range = get_range(Granularity::Week, &reference());
        assert_eq!(range.bucket_count, 7);
        assert_eq!(range.bucket_hours, 24);
        assert_eq!(range.start.to_rfc3339(), "2024-03-09T00:00:00+09:00");
        assert_eq!(range.bucket_starts().last(), Some(&range.end));
    }

    #[test]
    fn month_range_is_thirty_days() {
        let range = get_range(Granularity::Month, &reference());
        assert_eq!(range.bucket_count, 30);
        assert_eq!(range.start.to_rfc3339(), "2024-02-15T00:00:00+09:00");
    }

    #[test]
    fn unknown_granularity_falls_back_to_week() {
        assert_eq!(Granularity::parse_or_default("day"), Granularity::Day);
        assert_eq!(Granularity::parse_or_default("MONTH"), Granularity::Month);
        assert_eq!(Granularity::parse_or_default("year"), Granularity::Week);
        assert_eq!(Granularity::parse_or_default(""), Granularity::Week);
    }

    #[test]
    fn iso_rendering_is_utc_with_millis() {
        let range = get_range(Granularity::Week, &reference());
        assert_eq!(iso_utc(&range.end), "2024-03-14T15:00:00.000Z");
    }
}
