use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    ActivityLevel, CareKind, CareRecord, CareRecordInput, CareRecordPatch, HealthRecord, Pet,
    PetInput, User,
};
use crate::store::{HealthStore, UserDirectory};
use crate::summary;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn pet_from_row(row: &PgRow) -> anyhow::Result<Pet> {
    Ok(Pet {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        species: row.try_get("species")?,
        breed: row.try_get("breed")?,
        gender: row.try_get("gender")?,
        birth_date: row.try_get("birth_date")?,
        age: row.try_get("age")?,
        weight: row.try_get("weight")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn record_from_row(row: &PgRow) -> anyhow::Result<HealthRecord> {
    let activity: String = row.try_get("activity_level")?;
    Ok(HealthRecord {
        record_id: row.try_get("record_id")?,
        animal_id: row.try_get("animal_id")?,
        date: row.try_get("date")?,
        weight: row.try_get("weight")?,
        food_intake: row.try_get("food_intake")?,
        sleep_hours: row.try_get("sleep_hours")?,
        activity_level: activity.parse()?,
        symptoms: row.try_get("symptoms")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn care_from_row(row: &PgRow) -> anyhow::Result<CareRecord> {
    let kind: String = row.try_get("type")?;
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    Ok(CareRecord {
        id: row.try_get("id")?,
        animal_id: row.try_get("animal_id")?,
        animal_name: row.try_get("animal_name")?,
        kind: kind.parse()?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        date: row.try_get("date")?,
        veterinarian: row.try_get("veterinarian")?,
        clinic: row.try_get("clinic")?,
        status: status.parse()?,
        priority: priority.parse()?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_from_row(row: &PgRow) -> anyhow::Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        identity_id: row.try_get("identity_id")?,
        name: row.try_get("name")?,
    })
}

/// Postgres-backed store for the `pet_health` schema.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthStore for PgStore {
    async fn pets_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Pet>> {
        list_pets(&self.pool, Some(user_id)).await
    }

    async fn pet_for_user(&self, user_id: Uuid, animal_id: Uuid) -> anyhow::Result<Option<Pet>> {
        let row = sqlx::query("SELECT * FROM pet_health.pets WHERE id = $1 AND user_id = $2")
            .bind(animal_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(pet_from_row).transpose()
    }

    async fn records_by_animal(&self, animal_id: Uuid) -> anyhow::Result<Vec<HealthRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM pet_health.health_samples WHERE animal_id = $1 ORDER BY date, created_at",
        )
        .bind(animal_id)
        .fetch_all(&self.pool)
        .await?;
        debug!(%animal_id, rows = rows.len(), "fetched health samples");
        rows.iter().map(record_from_row).collect()
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_by_identity(&self, identity_id: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query("SELECT id, identity_id, name FROM pet_health.users WHERE identity_id = $1")
            .bind(identity_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn create_user(&self, identity_id: &str, name: &str) -> anyhow::Result<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO pet_health.users (id, identity_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (identity_id) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, identity_id, name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(identity_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        user_from_row(&row)
    }

    async fn delete_by_identity(&self, identity_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM pet_health.users WHERE identity_id = $1")
            .bind(identity_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

struct SeedPet {
    id: &'static str,
    owner: &'static str,
    name: &'static str,
    species: &'static str,
    breed: &'static str,
    gender: &'static str,
    birth_date: (i32, u32, u32),
    age: i32,
    weight: f64,
    food_base: f64,
    sleep_base: f64,
}

static SEED_USERS: [(&str, &str, &str); 2] = [
    ("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc", "user_123", "Jules Moreno"),
    ("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2", "user_456", "Kiara Patel"),
];

static SEED_PETS: [SeedPet; 2] = [
    SeedPet {
        id: "a1f9c2e0-5d77-4c1f-9b32-12a5d45f1c01",
        owner: "0c22f1f1-9184-4fd4-9b21-28c68a6a89dc",
        name: "Buddy",
        species: "Dog",
        breed: "Golden Retriever",
        gender: "male",
        birth_date: (2019, 4, 2),
        age: 5,
        weight: 30.0,
        food_base: 620.0,
        sleep_base: 12.5,
    },
    SeedPet {
        id: "a2b3d4f5-6a78-4e2b-91c2-56d9f23a7b12",
        owner: "0c22f1f1-9184-4fd4-9b21-28c68a6a89dc",
        name: "Mittens",
        species: "Cat",
        breed: "Siamese",
        gender: "female",
        birth_date: (2022, 8, 19),
        age: 2,
        weight: 5.0,
        food_base: 75.0,
        sleep_base: 14.0,
    },
];

const SEED_SAMPLE_DAYS: i64 = 45;

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    for (id, identity_id, name) in SEED_USERS {
        sqlx::query(
            r#"
            INSERT INTO pet_health.users (id, identity_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (identity_id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(identity_id)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let today = Utc::now().date_naive();
    let levels = [ActivityLevel::High, ActivityLevel::Moderate, ActivityLevel::Low];
    let notes = ["none", "none", "none", "mild cough", "none", "soft stool", "none"];

    for pet in SEED_PETS.iter() {
        let pet_id = Uuid::parse_str(pet.id)?;
        let (y, m, d) = pet.birth_date;
        sqlx::query(
            r#"
            INSERT INTO pet_health.pets
            (id, user_id, name, species, breed, gender, birth_date, age, weight)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(pet_id)
        .bind(Uuid::parse_str(pet.owner)?)
        .bind(pet.name)
        .bind(pet.species)
        .bind(pet.breed)
        .bind(pet.gender)
        .bind(NaiveDate::from_ymd_opt(y, m, d).context("invalid date")?)
        .bind(pet.age)
        .bind(pet.weight)
        .execute(pool)
        .await?;

        for offset in 0..SEED_SAMPLE_DAYS {
            let date = today - Duration::days(SEED_SAMPLE_DAYS - offset);
            let i = offset as usize;
            let drift = (offset as f64 - SEED_SAMPLE_DAYS as f64 / 2.0) * pet.weight * 0.0005;
            sqlx::query(
                r#"
                INSERT INTO pet_health.health_samples
                (record_id, animal_id, date, weight, food_intake, sleep_hours,
                 activity_level, symptoms, source_key)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(pet_id)
            .bind(date)
            .bind(((pet.weight + drift) * 100.0).round() / 100.0)
            .bind(pet.food_base + ((i % 5) as f64 - 2.0) * pet.food_base * 0.05)
            .bind(pet.sleep_base + ((i % 3) as f64 - 1.0) * 0.5)
            .bind(levels[i % levels.len()].as_str())
            .bind(notes[i % notes.len()])
            .bind(format!("seed-{}-{}", pet.name.to_lowercase(), date))
            .execute(pool)
            .await?;
        }
    }

    let care = [
        (
            "5b1d8f0e-0d5a-4b0e-9a56-2f4c7e1b9a01",
            0usize,
            "vaccination",
            "Rabies booster",
            -20i64,
            "completed",
            "high",
        ),
        (
            "5b1d8f0e-0d5a-4b0e-9a56-2f4c7e1b9a02",
            1usize,
            "checkup",
            "Dental checkup",
            14i64,
            "scheduled",
            "routine",
        ),
        (
            "5b1d8f0e-0d5a-4b0e-9a56-2f4c7e1b9a03",
            0usize,
            "treatment",
            "Ear infection drops",
            -3i64,
            "ongoing",
            "medium",
        ),
    ];

    for (id, pet_index, kind, title, offset, status, priority) in care {
        let pet = &SEED_PETS[pet_index];
        sqlx::query(
            r#"
            INSERT INTO pet_health.care_records
            (id, animal_id, animal_name, type, title, date, veterinarian, clinic,
             status, priority, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(Uuid::parse_str(pet.id)?)
        .bind(pet.name)
        .bind(kind)
        .bind(title)
        .bind(today + Duration::days(offset))
        .bind("Dr. Rivera")
        .bind("Maple Street Animal Clinic")
        .bind(status)
        .bind(priority)
        .bind(Uuid::parse_str(pet.owner)?)
        .execute(pool)
        .await?;
    }

    info!(pets = SEED_PETS.len(), days = SEED_SAMPLE_DAYS, "seed data written");
    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        animal_id: Uuid,
        date: NaiveDate,
        weight: f64,
        food_intake: f64,
        sleep_hours: f64,
        activity_level: String,
        symptoms: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let level: ActivityLevel = row
            .activity_level
            .parse()
            .with_context(|| format!("row {}", line + 1))?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}-{}", row.animal_id, row.date));

        let result = sqlx::query(
            r#"
            INSERT INTO pet_health.health_samples
            (record_id, animal_id, date, weight, food_intake, sleep_hours,
             activity_level, symptoms, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.animal_id)
        .bind(row.date)
        .bind(row.weight)
        .bind(row.food_intake)
        .bind(row.sleep_hours)
        .bind(level.as_str())
        .bind(row.symptoms.unwrap_or_else(|| "none".to_string()))
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

async fn user_exists(pool: &PgPool, user_id: Uuid) -> anyhow::Result<bool> {
    let row = sqlx::query("SELECT 1 FROM pet_health.users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub async fn create_pet(pool: &PgPool, input: &PetInput) -> anyhow::Result<Pet> {
    input.validate()?;
    if !user_exists(pool, input.user_id).await? {
        bail!("User not found");
    }

    let mut tx = pool.begin().await?;
    let row = sqlx::query(
        r#"
        INSERT INTO pet_health.pets
        (id, user_id, name, species, breed, gender, birth_date, age, weight)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(input.user_id)
    .bind(&input.name)
    .bind(&input.species)
    .bind(&input.breed)
    .bind(&input.gender)
    .bind(input.birth_date)
    .bind(input.age)
    .bind(input.weight)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to create pet record")?;
    tx.commit().await?;

    pet_from_row(&row)
}

pub async fn list_pets(pool: &PgPool, user_id: Option<Uuid>) -> anyhow::Result<Vec<Pet>> {
    let rows = sqlx::query(
        "SELECT * FROM pet_health.pets WHERE ($1::uuid IS NULL OR user_id = $1) ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(pet_from_row).collect()
}

pub async fn get_pet(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<Pet>> {
    let row = sqlx::query("SELECT * FROM pet_health.pets WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(pet_from_row).transpose()
}

pub async fn update_pet(pool: &PgPool, id: Uuid, input: &PetInput) -> anyhow::Result<Option<Pet>> {
    input.validate()?;
    let row = sqlx::query(
        r#"
        UPDATE pet_health.pets
        SET user_id = $2, name = $3, species = $4, breed = $5, gender = $6,
            birth_date = $7, age = $8, weight = $9, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(input.user_id)
    .bind(&input.name)
    .bind(&input.species)
    .bind(&input.breed)
    .bind(&input.gender)
    .bind(input.birth_date)
    .bind(input.age)
    .bind(input.weight)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(pet_from_row).transpose()
}

pub async fn delete_pet(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM pet_health.pets WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn create_care(pool: &PgPool, input: &CareRecordInput) -> anyhow::Result<CareRecord> {
    input.validate()?;
    let mut tx = pool.begin().await?;
    let row = sqlx::query(
        r#"
        INSERT INTO pet_health.care_records
        (id, animal_id, animal_name, type, title, description, date,
         veterinarian, clinic, status, priority, user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(input.animal_id)
    .bind(&input.animal_name)
    .bind(input.kind.as_str())
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.date)
    .bind(&input.veterinarian)
    .bind(&input.clinic)
    .bind(input.status.as_str())
    .bind(input.priority.as_str())
    .bind(input.user_id)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to create health record")?;
    tx.commit().await?;

    care_from_row(&row)
}

/// All care records, newest first, optionally narrowed by animal name and type.
pub async fn list_care(
    pool: &PgPool,
    animal_name: Option<&str>,
    kind: Option<CareKind>,
) -> anyhow::Result<Vec<CareRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM pet_health.care_records
        WHERE ($1::text IS NULL OR animal_name = $1)
          AND ($2::text IS NULL OR type = $2)
        ORDER BY date DESC
        "#,
    )
    .bind(animal_name)
    .bind(kind.map(|k| k.as_str()))
    .fetch_all(pool)
    .await?;
    rows.iter().map(care_from_row).collect()
}

pub async fn get_care(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<CareRecord>> {
    let row = sqlx::query("SELECT * FROM pet_health.care_records WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(care_from_row).transpose()
}

pub async fn update_care(
    pool: &PgPool,
    id: Uuid,
    patch: CareRecordPatch,
) -> anyhow::Result<Option<CareRecord>> {
    patch.validate()?;
    let Some(mut record) = get_care(pool, id).await? else {
        return Ok(None);
    };
    patch.apply(&mut record);

    let row = sqlx::query(
        r#"
        UPDATE pet_health.care_records
        SET animal_id = $2, animal_name = $3, type = $4, title = $5, description = $6,
            date = $7, veterinarian = $8, clinic = $9, status = $10, priority = $11,
            user_id = $12, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(record.animal_id)
    .bind(&record.animal_name)
    .bind(record.kind.as_str())
    .bind(&record.title)
    .bind(&record.description)
    .bind(record.date)
    .bind(&record.veterinarian)
    .bind(&record.clinic)
    .bind(record.status.as_str())
    .bind(record.priority.as_str())
    .bind(record.user_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(care_from_row).transpose()
}

pub async fn delete_care(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM pet_health.care_records WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Scheduled visits from today onwards, soonest first.
pub async fn upcoming_care(
    pool: &PgPool,
    today: NaiveDate,
    animal_name: Option<&str>,
) -> anyhow::Result<Vec<CareRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM pet_health.care_records
        WHERE status = 'scheduled'
          AND date >= $1
          AND ($2::text IS NULL OR animal_name = $2)
        ORDER BY date
        "#,
    )
    .bind(today)
    .bind(animal_name)
    .fetch_all(pool)
    .await?;
    rows.iter().map(care_from_row).collect()
}

/// Completed or ongoing care within the last `days`, newest first.
pub async fn recent_care(
    pool: &PgPool,
    today: NaiveDate,
    days: i64,
    animal_name: Option<&str>,
) -> anyhow::Result<Vec<CareRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM pet_health.care_records
        WHERE status IN ('completed', 'ongoing')
          AND date BETWEEN $1 AND $2
          AND ($3::text IS NULL OR animal_name = $3)
        ORDER BY date DESC
        "#,
    )
    .bind(summary::days_before(today, days.max(0)))
    .bind(today)
    .bind(animal_name)
    .fetch_all(pool)
    .await?;
    rows.iter().map(care_from_row).collect()
}
