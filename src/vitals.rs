//! Deterministic stand-in for sensor vitals.
//!
//! No device data exists for daily samples, so calories and heart rate are
//! derived from the activity level, food intake and sleep of the day. The
//! heart-rate wobble is a sine of the sample date, so the same inputs always
//! produce the same numbers.

use chrono::{NaiveDate, NaiveTime};

use crate::models::{ActivityLevel, HealthRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticVitals {
    pub calories: i64,
    pub heart_rate: i64,
}

fn activity_weight(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::High => 1.0,
        ActivityLevel::Moderate => 0.65,
        ActivityLevel::Low => 0.35,
    }
}

fn base_heart_rate(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::High => 94.0,
        ActivityLevel::Moderate => 82.0,
        ActivityLevel::Low => 72.0,
    }
}

/// Milliseconds since the epoch at UTC midnight of `date`.
fn epoch_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

pub fn synthesize_vitals(
    level: ActivityLevel,
    food_intake: f64,
    sleep_hours: f64,
    date: NaiveDate,
) -> SyntheticVitals {
    let intake_factor = (0.8 + food_intake / 1000.0).clamp(0.8, 1.3);
    let calories = ((180.0 + 420.0 * activity_weight(level)) * intake_factor).round() as i64;

    // More sleep pulls the daily average down a little.
    let sleep_adj = (2.0 - (sleep_hours - 7.0)).clamp(-6.0, 2.0);
    let wobble = (epoch_millis(date) as f64 / 1e7).sin() * 4.0;
    let heart_rate = ((base_heart_rate(level) + sleep_adj + wobble).round() as i64).max(48);

    SyntheticVitals {
        calories,
        heart_rate,
    }
}

pub fn vitals_for(record: &HealthRecord) -> SyntheticVitals {
    synthesize_vitals(
        record.activity_level,
        record.food_intake,
        record.sleep_hours,
        record.date,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn identical_inputs_give_identical_vitals() {
        let a = synthesize_vitals(ActivityLevel::Moderate, 320.0, 11.5, day(2024, 1, 15));
        let b = synthesize_vitals(ActivityLevel::Moderate, 320.0, 11.5, day(2024, 1, 15));
        assert_eq!(a, b);
    }

    #[test]
    fn calories_follow_activity_and_clamped_intake() {
        // (180 + 420) * 1.3 when intake saturates the factor.
        let high = synthesize_vitals(ActivityLevel::High, 900.0, 7.0, day(2024, 1, 1));
        assert_eq!(high.calories, 780);

        // (180 + 147) * 0.8 with no intake at all.
        let low = synthesize_vitals(ActivityLevel::Low, 0.0, 7.0, day(2024, 1, 1));
        assert_eq!(low.calories, 262);

        // (180 + 273) * 1.1
        let moderate = synthesize_vitals(ActivityLevel::Moderate, 300.0, 7.0, day(2024, 1, 1));
        assert_eq!(moderate.calories, 498);
    }

    #[test]
    fn heart_rate_stays_within_the_sleep_and_wobble_envelope() {
        let date = day(2024, 1, 1);
        let wobble = (epoch_millis(date) as f64 / 1e7).sin() * 4.0;

        // 7h of sleep gives the full +2 adjustment.
        let rested = synthesize_vitals(ActivityLevel::Low, 200.0, 7.0, date);
        assert_eq!(rested.heart_rate, (72.0 + 2.0 + wobble).round() as i64);

        // Very long sleep bottoms out at -6.
        let sleepy = synthesize_vitals(ActivityLevel::Low, 200.0, 20.0, date);
        assert_eq!(sleepy.heart_rate, (72.0 - 6.0 + wobble).round() as i64);
        assert!(sleepy.heart_rate >= 48);
    }

    #[test]
    fn epoch_is_taken_at_utc_midnight() {
        assert_eq!(epoch_millis(day(1970, 1, 2)), 86_400_000);
    }

    #[test]
    fn calorie_estimate_ignores_the_date() {
        let a = synthesize_vitals(ActivityLevel::High, 400.0, 8.0, day(2024, 1, 1));
        let b = synthesize_vitals(ActivityLevel::High, 400.0, 8.0, day(2024, 1, 2));
        assert_eq!(a.calories, b.calories);
        assert!((a.heart_rate - b.heart_rate).abs() <= 8);
    }
}
