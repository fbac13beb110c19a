use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Declares a lowercase text-backed enum with `as_str`, `FromStr` and
/// `Display`, matching how the column is stored in Postgres.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err(CoreError::UnknownVariant {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Categorical activity level recorded with each daily sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Low,
    Moderate,
    High,
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Low => "low",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::High => "high",
        }
    }

    /// Numeric score used when averaging levels: low=1, moderate=2, high=3.
    pub fn score(&self) -> f64 {
        match self {
            ActivityLevel::Low => 1.0,
            ActivityLevel::Moderate => 2.0,
            ActivityLevel::High => 3.0,
        }
    }

    /// Maps an averaged score back onto a level. The upper bound of each
    /// band is exclusive, so 1.5 is moderate and 2.5 is high.
    pub fn from_score(score: f64) -> Self {
        if score < 1.5 {
            ActivityLevel::Low
        } else if score < 2.5 {
            ActivityLevel::Moderate
        } else {
            ActivityLevel::High
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(ActivityLevel::Low),
            "moderate" => Ok(ActivityLevel::Moderate),
            "high" => Ok(ActivityLevel::High),
            _ => Err(CoreError::UnknownActivityLevel(value.to_string())),
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One daily health sample for an animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub record_id: Uuid,
    pub animal_id: Uuid,
    pub date: NaiveDate,
    /// Kilograms.
    pub weight: f64,
    /// Grams.
    pub food_intake: f64,
    pub sleep_hours: f64,
    pub activity_level: ActivityLevel,
    /// Free text; blank or "none" means nothing was observed.
    pub symptoms: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl HealthRecord {
    pub fn has_symptoms(&self) -> bool {
        let trimmed = self.symptoms.trim();
        !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("none")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Identifier assigned by the external identity provider.
    pub identity_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub species: String,
    pub breed: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub age: i32,
    pub weight: f64,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or replacing a pet.
#[derive(Debug, Clone)]
pub struct PetInput {
    pub user_id: Uuid,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub age: i32,
    pub weight: f64,
}

impl PetInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().chars().count() < 2 {
            return Err(CoreError::Validation(
                "Name must be at least 2 characters".to_string(),
            ));
        }
        if self.species.trim().chars().count() < 2 {
            return Err(CoreError::Validation(
                "Species must be at least 2 characters".to_string(),
            ));
        }
        if self.age < 0 {
            return Err(CoreError::Validation(
                "Age must be a non-negative integer".to_string(),
            ));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(CoreError::Validation(
                "Weight must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

text_enum!(
    /// What kind of veterinary event a care record describes.
    CareKind, "type" {
        Vaccination => "vaccination",
        Checkup => "checkup",
        Treatment => "treatment",
        Appointment => "appointment",
    }
);

text_enum!(
    CareStatus, "status" {
        Completed => "completed",
        Ongoing => "ongoing",
        Scheduled => "scheduled",
    }
);

text_enum!(
    CarePriority, "priority" {
        High => "high",
        Medium => "medium",
        Routine => "routine",
    }
);

/// A veterinary history entry: vaccinations, checkups, treatments and
/// booked appointments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareRecord {
    pub id: Uuid,
    pub animal_id: Uuid,
    pub animal_name: String,
    #[serde(rename = "type")]
    pub kind: CareKind,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub veterinarian: Option<String>,
    pub clinic: Option<String>,
    pub status: CareStatus,
    pub priority: CarePriority,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CareRecordInput {
    pub animal_id: Uuid,
    pub animal_name: String,
    pub kind: CareKind,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub veterinarian: Option<String>,
    pub clinic: Option<String>,
    pub status: CareStatus,
    pub priority: CarePriority,
    pub user_id: Uuid,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct CareRecordPatch {
    pub animal_id: Option<Uuid>,
    pub animal_name: Option<String>,
    pub kind: Option<CareKind>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub veterinarian: Option<String>,
    pub clinic: Option<String>,
    pub status: Option<CareStatus>,
    pub priority: Option<CarePriority>,
    pub user_id: Option<Uuid>,
}

fn check_len(label: &str, value: &str, min: usize, max: usize) -> Result<(), CoreError> {
    let len = value.chars().count();
    if len < min {
        return Err(CoreError::Validation(format!("{label} is required")));
    }
    if len > max {
        return Err(CoreError::Validation(format!("{label} too long")));
    }
    Ok(())
}

impl CareRecordInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        check_len("Animal name", &self.animal_name, 1, usize::MAX)?;
        check_len("Title", &self.title, 1, 200)?;
        if let Some(description) = &self.description {
            check_len("Description", description, 0, 1000)?;
        }
        if let Some(veterinarian) = &self.veterinarian {
            check_len("Veterinarian name", veterinarian, 0, 100)?;
        }
        if let Some(clinic) = &self.clinic {
            check_len("Clinic name", clinic, 0, 200)?;
        }
        Ok(())
    }
}

impl CareRecordPatch {
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(animal_name) = &self.animal_name {
            check_len("Animal name", animal_name, 1, usize::MAX)?;
        }
        if let Some(title) = &self.title {
            check_len("Title", title, 1, 200)?;
        }
        if let Some(description) = &self.description {
            check_len("Description", description, 0, 1000)?;
        }
        if let Some(veterinarian) = &self.veterinarian {
            check_len("Veterinarian name", veterinarian, 0, 100)?;
        }
        if let Some(clinic) = &self.clinic {
            check_len("Clinic name", clinic, 0, 200)?;
        }
        Ok(())
    }

    /// Applies the provided fields onto an existing record.
    pub fn apply(self, record: &mut CareRecord) {
        if let Some(value) = self.animal_id {
            record.animal_id = value;
        }
        if let Some(value) = self.animal_name {
            record.animal_name = value;
        }
        if let Some(value) = self.kind {
            record.kind = value;
        }
        if let Some(value) = self.title {
            record.title = value;
        }
        if let Some(value) = self.description {
            record.description = Some(value);
        }
        if let Some(value) = self.date {
            record.date = value;
        }
        if let Some(value) = self.veterinarian {
            record.veterinarian = Some(value);
        }
        if let Some(value) = self.clinic {
            record.clinic = Some(value);
        }
        if let Some(value) = self.status {
            record.status = value;
        }
        if let Some(value) = self.priority {
            record.priority = value;
        }
        if let Some(value) = self.user_id {
            record.user_id = value;
        }
    }
}

/// One chart point produced by the metrics aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSummary {
    pub name: String,
    pub calories: i64,
    #[serde(rename = "heartRate")]
    pub heart_rate: i64,
    /// ISO-8601 UTC timestamp of the bucket start.
    pub t: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageSummary {
    pub weight_kg: f64,
    pub food_g: i64,
    pub sleep_h: f64,
    pub activity: ActivityLevel,
}

/// Aggregate view of an animal's recent samples, embedded into the chat
/// assistant's context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSummary {
    pub count: usize,
    pub range: String,
    pub last: HealthRecord,
    pub avg: AverageSummary,
    pub weight_trend_kg: f64,
    pub symptoms_recent: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_scores_rebucket_on_upper_inclusive_bounds() {
        assert_eq!(ActivityLevel::from_score(1.0), ActivityLevel::Low);
        assert_eq!(ActivityLevel::from_score(1.49), ActivityLevel::Low);
        assert_eq!(ActivityLevel::from_score(1.5), ActivityLevel::Moderate);
        assert_eq!(ActivityLevel::from_score(2.49), ActivityLevel::Moderate);
        assert_eq!(ActivityLevel::from_score(2.5), ActivityLevel::High);
        assert_eq!(ActivityLevel::from_score(3.0), ActivityLevel::High);
    }

    #[test]
    fn activity_level_parses_case_insensitively() {
        assert_eq!("High".parse::<ActivityLevel>(), Ok(ActivityLevel::High));
        assert_eq!(" low ".parse::<ActivityLevel>(), Ok(ActivityLevel::Low));
        assert!("sprinting".parse::<ActivityLevel>().is_err());
    }

    #[test]
    fn care_enums_round_trip_through_text() {
        assert_eq!("checkup".parse::<CareKind>(), Ok(CareKind::Checkup));
        assert_eq!(CareStatus::Scheduled.to_string(), "scheduled");
        let err = "urgent".parse::<CarePriority>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown priority: urgent");
    }

    #[test]
    fn pet_input_rejects_short_names_and_negative_age() {
        let mut input = PetInput {
            user_id: Uuid::new_v4(),
            name: "Buddy".to_string(),
            species: "Dog".to_string(),
            breed: "Golden Retriever".to_string(),
            gender: None,
            birth_date: None,
            age: 5,
            weight: 30.0,
        };
        assert!(input.validate().is_ok());

        input.name = "B".to_string();
        assert!(input.validate().is_err());

        input.name = "Buddy".to_string();
        input.age = -1;
        assert_eq!(
            input.validate(),
            Err(CoreError::Validation(
                "Age must be a non-negative integer".to_string()
            ))
        );
    }

    #[test]
    fn care_patch_only_touches_provided_fields() {
        let now = Utc::now();
        let mut record = CareRecord {
            id: Uuid::new_v4(),
            animal_id: Uuid::new_v4(),
            animal_name: "Buddy".to_string(),
            kind: CareKind::Checkup,
            title: "Annual checkup".to_string(),
            description: None,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            veterinarian: Some("Dr. Kim".to_string()),
            clinic: None,
            status: CareStatus::Scheduled,
            priority: CarePriority::Routine,
            user_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };

        let patch = CareRecordPatch {
            status: Some(CareStatus::Completed),
            description: Some("All clear".to_string()),
            ..Default::default()
        };
        patch.apply(&mut record);

        assert_eq!(record.status, CareStatus::Completed);
        assert_eq!(record.description.as_deref(), Some("All clear"));
        assert_eq!(record.title, "Annual checkup");
        assert_eq!(record.veterinarian.as_deref(), Some("Dr. Kim"));
    }

    #[test]
    fn care_input_limits_title_length() {
        let input = CareRecordInput {
            animal_id: Uuid::new_v4(),
            animal_name: "Mittens".to_string(),
            kind: CareKind::Vaccination,
            title: "x".repeat(201),
            description: None,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            veterinarian: None,
            clinic: None,
            status: CareStatus::Scheduled,
            priority: CarePriority::High,
            user_id: Uuid::new_v4(),
        };
        assert_eq!(
            input.validate(),
            Err(CoreError::Validation("Title too long".to_string()))
        );
    }

    #[test]
    fn symptoms_marked_none_are_ignored() {
        let record = HealthRecord {
            record_id: Uuid::new_v4(),
            animal_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            weight: 10.0,
            food_intake: 300.0,
            sleep_hours: 12.0,
            activity_level: ActivityLevel::Moderate,
            symptoms: "None".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(!record.has_symptoms());
    }
}
