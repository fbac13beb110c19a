use chrono::{Duration, NaiveDate};

use crate::models::{ActivityLevel, AverageSummary, HealthRecord, RecordSummary};

pub const DEFAULT_SUMMARY_DAYS: i64 = 60;
const RECENT_SYMPTOM_LIMIT: usize = 3;

/// Rounds half away from zero at `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// `today` minus `days`, clamped to the earliest representable date.
pub fn days_before(today: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|window| today.checked_sub_signed(window))
        .unwrap_or(NaiveDate::MIN)
}

/// First date inside a lookback window; `None` when no window applies.
pub fn cutoff_date(today: NaiveDate, days: Option<i64>) -> Option<NaiveDate> {
    match days {
        Some(days) if days > 0 => Some(days_before(today, days)),
        _ => None,
    }
}

/// Sorts ascending by date (stable for equal dates) and keeps what falls
/// inside the lookback window.
pub fn records_in_window(
    records: &[HealthRecord],
    days: Option<i64>,
    today: NaiveDate,
) -> Vec<HealthRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|record| record.date);

    match cutoff_date(today, days) {
        Some(cutoff) => sorted
            .into_iter()
            .filter(|record| record.date >= cutoff)
            .collect(),
        None => sorted,
    }
}

pub fn summarize(
    records: &[HealthRecord],
    days: Option<i64>,
    today: NaiveDate,
) -> Option<RecordSummary> {
    let window = records_in_window(records, days, today);
    let first = window.first()?;
    let last = window.last()?;
    let n = window.len() as f64;

    let avg_weight = window.iter().map(|r| r.weight).sum::<f64>() / n;
    let avg_food = window.iter().map(|r| r.food_intake).sum::<f64>() / n;
    let avg_sleep = window.iter().map(|r| r.sleep_hours).sum::<f64>() / n;
    let avg_activity = window.iter().map(|r| r.activity_level.score()).sum::<f64>() / n;

    let trend = if window.len() >= 2 {
        last.weight - first.weight
    } else {
        0.0
    };

    let symptoms: Vec<String> = window
        .iter()
        .filter(|record| record.has_symptoms())
        .map(|record| record.symptoms.clone())
        .collect();
    let recent_start = symptoms.len().saturating_sub(RECENT_SYMPTOM_LIMIT);

    Some(RecordSummary {
        count: window.len(),
        range: format!("{} ~ {}", first.date, last.date),
        last: last.clone(),
        avg: AverageSummary {
            weight_kg: round_to(avg_weight, 2),
            food_g: avg_food.round() as i64,
            sleep_h: round_to(avg_sleep, 1),
            activity: ActivityLevel::from_score(avg_activity),
        },
        weight_trend_kg: round_to(trend, 2),
        symptoms_recent: symptoms[recent_start..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample(date: NaiveDate, weight: f64, level: ActivityLevel, symptoms: &str) -> HealthRecord {
        HealthRecord {
            record_id: Uuid::new_v4(),
            animal_id: Uuid::nil(),
            date,
            weight,
            food_intake: 300.0,
            sleep_hours: 12.0,
            activity_level: level,
            symptoms: symptoms.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn two_record_window_reports_weight_trend() {
        let records = vec![
            sample(day(2024, 1, 15), 9.2, ActivityLevel::Moderate, "none"),
            sample(day(2024, 1, 1), 10.0, ActivityLevel::Moderate, "none"),
        ];
        let summary = summarize(&records, Some(60), day(2024, 2, 1)).unwrap();

        assert_eq!(summary.count, 2);
        assert_eq!(summary.weight_trend_kg, -0.8);
        assert_eq!(summary.range, "2024-01-01 ~ 2024-01-15");
        assert_eq!(summary.last.date, day(2024, 1, 15));
        assert_eq!(summary.avg.weight_kg, 9.6);
        assert_eq!(summary.avg.food_g, 300);
        assert_eq!(summary.avg.sleep_h, 12.0);
    }

    #[test]
    fn single_record_has_flat_trend() {
        let records = vec![sample(day(2024, 1, 1), 10.0, ActivityLevel::Low, "")];
        let summary = summarize(&records, Some(60), day(2024, 1, 10)).unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.weight_trend_kg, 0.0);
    }

    #[test]
    fn empty_window_yields_no_summary() {
        let records = vec![sample(day(2023, 1, 1), 10.0, ActivityLevel::Low, "")];
        assert!(summarize(&records, Some(60), day(2024, 1, 10)).is_none());
        assert!(summarize(&[], Some(60), day(2024, 1, 10)).is_none());
    }

    #[test]
    fn no_window_uses_full_history() {
        let records = vec![
            sample(day(2020, 5, 1), 8.0, ActivityLevel::Low, ""),
            sample(day(2024, 1, 1), 10.0, ActivityLevel::Low, ""),
        ];
        let summary = summarize(&records, None, day(2024, 1, 10)).unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.weight_trend_kg, 2.0);
    }

    #[test]
    fn cutoff_is_inclusive() {
        let today = day(2024, 3, 1);
        let records = vec![
            sample(today - Duration::days(60), 10.0, ActivityLevel::Low, ""),
            sample(today - Duration::days(61), 10.0, ActivityLevel::Low, ""),
        ];
        assert_eq!(records_in_window(&records, Some(60), today).len(), 1);
        assert_eq!(cutoff_date(today, Some(0)), None);
    }

    #[test]
    fn oversized_window_covers_the_whole_history() {
        let today = day(2024, 3, 1);
        assert_eq!(days_before(today, 30), day(2024, 1, 31));
        assert_eq!(cutoff_date(today, Some(1_000_000_000_000)), Some(NaiveDate::MIN));
        assert_eq!(cutoff_date(today, Some(200_000_000)), Some(NaiveDate::MIN));
        assert_eq!(cutoff_date(today, Some(i64::MAX)), Some(NaiveDate::MIN));

        assert!(summarize(&[], Some(1_000_000_000_000), today).is_none());
        let records = vec![
            sample(day(1990, 6, 1), 9.0, ActivityLevel::Low, ""),
            sample(day(2024, 2, 1), 10.0, ActivityLevel::Low, ""),
        ];
        let summary = summarize(&records, Some(200_000_000), today).unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.weight_trend_kg, 1.0);
    }

    #[test]
    fn activity_average_is_rebucketed() {
        let today = day(2024, 1, 10);
        let low_moderate = vec![
            sample(day(2024, 1, 1), 10.0, ActivityLevel::Low, ""),
            sample(day(2024, 1, 2), 10.0, ActivityLevel::Moderate, ""),
        ];
        let summary = summarize(&low_moderate, Some(60), today).unwrap();
        assert_eq!(summary.avg.activity, ActivityLevel::Moderate);

        let moderate_high = vec![
            sample(day(2024, 1, 1), 10.0, ActivityLevel::Moderate, ""),
            sample(day(2024, 1, 2), 10.0, ActivityLevel::High, ""),
        ];
        let summary = summarize(&moderate_high, Some(60), today).unwrap();
        assert_eq!(summary.avg.activity, ActivityLevel::High);
    }

    #[test]
    fn keeps_the_three_latest_real_symptoms_in_date_order() {
        let records = vec![
            sample(day(2024, 1, 5), 10.0, ActivityLevel::Low, "vomiting"),
            sample(day(2024, 1, 1), 10.0, ActivityLevel::Low, "sneezing"),
            sample(day(2024, 1, 2), 10.0, ActivityLevel::Low, "NONE"),
            sample(day(2024, 1, 3), 10.0, ActivityLevel::Low, "limping"),
            sample(day(2024, 1, 4), 10.0, ActivityLevel::Low, "  "),
            sample(day(2024, 1, 6), 10.0, ActivityLevel::Low, "itching"),
        ];
        let summary = summarize(&records, None, day(2024, 1, 10)).unwrap();
        assert_eq!(
            summary.symptoms_recent,
            vec!["limping", "vomiting", "itching"]
        );
    }

    #[test]
    fn equal_dates_keep_their_input_order() {
        let records = vec![
            sample(day(2024, 1, 2), 11.0, ActivityLevel::Low, ""),
            sample(day(2024, 1, 1), 10.0, ActivityLevel::Low, ""),
            sample(day(2024, 1, 2), 12.0, ActivityLevel::Low, ""),
        ];
        let summary = summarize(&records, None, day(2024, 1, 10)).unwrap();
        assert_eq!(summary.last.weight, 12.0);
        assert_eq!(summary.weight_trend_kg, 2.0);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_to(2.345, 1), 2.3);
        assert_eq!(round_to(2.25, 1), 2.3);
        assert_eq!(round_to(-0.125, 2), -0.13);
        assert_eq!(round_to(-0.8000000000000007, 2), -0.8);
    }
}
