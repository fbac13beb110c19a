use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::info;
use uuid::Uuid;

use crate::error::CoreError;
use crate::metrics::{self, ActivityMetrics};
use crate::models::{HealthRecord, RecordSummary};
use crate::range::Granularity;
use crate::store::HealthStore;
use crate::summary;

/// Required subject id check shared by every read operation.
pub fn parse_animal_id(raw: Option<&str>) -> Result<Uuid, CoreError> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty());
    let raw = raw.ok_or(CoreError::MissingAnimalId)?;
    Uuid::parse_str(raw).map_err(|_| CoreError::InvalidAnimalId(raw.to_string()))
}

/// Chart data for an animal whose id came through [`parse_animal_id`].
pub async fn activity_metrics(
    store: &dyn HealthStore,
    animal_id: Uuid,
    granularity: Option<&str>,
    now: &DateTime<FixedOffset>,
) -> anyhow::Result<ActivityMetrics> {
    let granularity = granularity
        .map(Granularity::parse_or_default)
        .unwrap_or_default();

    let records = store.records_by_animal(animal_id).await?;
    info!(%animal_id, %granularity, records = records.len(), "computing activity metrics");
    Ok(metrics::activity_metrics(animal_id, &records, granularity, now))
}

/// Sorted samples for an animal, optionally limited to the last `days`.
pub async fn records_by_animal(
    store: &dyn HealthStore,
    animal_id: Uuid,
    days: Option<i64>,
    today: NaiveDate,
) -> anyhow::Result<Vec<HealthRecord>> {
    let records = store.records_by_animal(animal_id).await?;
    Ok(summary::records_in_window(&records, days, today))
}

pub async fn summarize_records(
    store: &dyn HealthStore,
    animal_id: Uuid,
    days: Option<i64>,
    today: NaiveDate,
) -> anyhow::Result<Option<RecordSummary>> {
    let records = store.records_by_animal(animal_id).await?;
    let days = days.or(Some(summary::DEFAULT_SUMMARY_DAYS));
    Ok(summary::summarize(&records, days, today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityLevel;
    use crate::store::FixtureStore;
    use chrono::{TimeZone, Utc};

    fn store_with(animal_id: Uuid) -> FixtureStore {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let records = (0..3)
            .map(|i| HealthRecord {
                record_id: Uuid::new_v4(),
                animal_id,
                date: base + chrono::Duration::days(i * 7),
                weight: 10.0 - i as f64 * 0.1,
                food_intake: 250.0,
                sleep_hours: 13.0,
                activity_level: ActivityLevel::Moderate,
                symptoms: String::new(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .collect();
        FixtureStore::new(Vec::new(), records)
    }

    #[test]
    fn animal_id_is_required() {
        assert_eq!(parse_animal_id(None), Err(CoreError::MissingAnimalId));
        assert_eq!(parse_animal_id(Some("  ")), Err(CoreError::MissingAnimalId));
        assert_eq!(
            parse_animal_id(Some("buddy")),
            Err(CoreError::InvalidAnimalId("buddy".to_string()))
        );
    }

    #[tokio::test]
    async fn parsed_id_drives_the_metrics_query() {
        let animal = Uuid::new_v4();
        let store = store_with(animal);
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 20, 8, 0, 0)
            .unwrap();
        let raw = format!("  {animal} ");
        let id = parse_animal_id(Some(&raw)).unwrap();
        let metrics = activity_metrics(&store, id, Some("day"), &now).await.unwrap();
        assert_eq!(metrics.animal_id, animal);
        assert_eq!(metrics.data.len(), 24);
    }

    #[tokio::test]
    async fn metrics_default_to_week() {
        let animal = Uuid::new_v4();
        let store = store_with(animal);
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 20, 8, 0, 0)
            .unwrap();
        let metrics = activity_metrics(&store, animal, None, &now).await.unwrap();
        assert_eq!(metrics.granularity, Granularity::Week);
        assert_eq!(metrics.data.len(), 7);
        // 2024-01-15 falls inside the 01-14..01-20 window.
        assert_eq!(metrics.data.iter().filter(|p| p.calories > 0).count(), 1);
    }

    #[tokio::test]
    async fn summary_defaults_to_sixty_days() {
        let animal = Uuid::new_v4();
        let store = store_with(animal);
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        // 2024-01-05 is the cutoff, so only the 01-08 and 01-15 samples count.
        let summary = summarize_records(&store, animal, None, today)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.weight_trend_kg, -0.1);

        let recent = records_by_animal(&store, animal, Some(30), today).await.unwrap();
        assert!(recent.is_empty());
        let all = records_by_animal(&store, animal, None, today).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
