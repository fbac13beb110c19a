use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{BucketSummary, HealthRecord};
use crate::range::{get_range, iso_utc, BucketRange, Granularity};
use crate::vitals::vitals_for;

const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsWindow {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMetrics {
    pub animal_id: Uuid,
    pub granularity: Granularity,
    pub range: MetricsWindow,
    pub data: Vec<BucketSummary>,
}

pub fn bucket_label(granularity: Granularity, start: &DateTime<FixedOffset>) -> String {
    match granularity {
        Granularity::Day => format!("{:02}:00", start.hour()),
        Granularity::Week => {
            let sunday_based = start.weekday().num_days_from_sunday() as usize;
            WEEKDAY_LABELS[(sunday_based + 6) % 7].to_string()
        }
        Granularity::Month => format!("{}/{}", start.month(), start.day()),
    }
}

/// Records whose date falls in `[day(start), day(start + duration))`.
///
/// Samples only carry a calendar date, so membership is decided on whole
/// days even for hourly buckets. An hourly bucket that does not cross
/// midnight therefore selects nothing, and the last hour of the day picks
/// up that day's samples.
fn records_in_bucket<'a>(
    records: &[&'a HealthRecord],
    start: &DateTime<FixedOffset>,
    range: &BucketRange,
) -> Vec<&'a HealthRecord> {
    let first_day = start.date_naive();
    let end_day = (*start + range.bucket_duration()).date_naive();
    records
        .iter()
        .copied()
        .filter(|record| record.date >= first_day && record.date < end_day)
        .collect()
}

fn summarize_bucket(
    granularity: Granularity,
    start: &DateTime<FixedOffset>,
    members: &[&HealthRecord],
) -> BucketSummary {
    let name = bucket_label(granularity, start);
    let t = iso_utc(start);

    if members.is_empty() {
        return BucketSummary {
            name,
            calories: 0,
            heart_rate: 0,
            t,
        };
    }

    let (calorie_sum, heart_sum) = members.iter().fold((0i64, 0i64), |(c, h), record| {
        let vitals = vitals_for(record);
        (c + vitals.calories, h + vitals.heart_rate)
    });
    let count = members.len() as f64;

    BucketSummary {
        name,
        calories: (calorie_sum as f64 / count).round() as i64,
        heart_rate: (heart_sum as f64 / count).round() as i64,
        t,
    }
}

/// One summary per bucket, in bucket order; empty buckets are kept as
/// zero points so the output length always equals the bucket count.
pub fn aggregate(
    records: &[&HealthRecord],
    granularity: Granularity,
    range: &BucketRange,
) -> Vec<BucketSummary> {
    range
        .bucket_starts()
        .iter()
        .map(|start| {
            let members = records_in_bucket(records, start, range);
            summarize_bucket(granularity, start, &members)
        })
        .collect()
}

/// Builds the chart payload for one animal from its full record list.
pub fn activity_metrics(
    animal_id: Uuid,
    records: &[HealthRecord],
    granularity: Granularity,
    now: &DateTime<FixedOffset>,
) -> ActivityMetrics {
    let range = get_range(granularity, now);
    let own: Vec<&HealthRecord> = records
        .iter()
        .filter(|record| record.animal_id == animal_id)
        .collect();
    let data = aggregate(&own, granularity, &range);

    ActivityMetrics {
        animal_id,
        granularity,
        range: MetricsWindow {
            start: iso_utc(&range.start),
            end: iso_utc(&range.end),
        },
        data,
    }
}
