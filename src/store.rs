use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::models::{HealthRecord, Pet, User};

/// Read-only access to pets and their daily samples.
#[async_trait]
pub trait HealthStore: Send + Sync {
    async fn pets_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Pet>>;

    async fn pet_for_user(&self, user_id: Uuid, animal_id: Uuid) -> anyhow::Result<Option<Pet>> {
        let pets = self.pets_by_user(user_id).await?;
        Ok(pets.into_iter().find(|pet| pet.id == animal_id))
    }

    /// Every sample recorded for the animal, in no particular order.
    async fn records_by_animal(&self, animal_id: Uuid) -> anyhow::Result<Vec<HealthRecord>>;
}

/// User rows keyed by the identity provider's id.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_identity(&self, identity_id: &str) -> anyhow::Result<Option<User>>;

    async fn create_user(&self, identity_id: &str, name: &str) -> anyhow::Result<User>;

    /// Returns how many rows were removed.
    async fn delete_by_identity(&self, identity_id: &str) -> anyhow::Result<u64>;
}

/// Store backed by `animals.json` and `records.json` in a directory.
#[derive(Debug, Clone)]
pub struct FixtureStore {
    pets: Vec<Pet>,
    records: Vec<HealthRecord>,
}

impl FixtureStore {
    pub fn new(pets: Vec<Pet>, records: Vec<HealthRecord>) -> Self {
        Self { pets, records }
    }

    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let pets: Vec<Pet> = read_json(&dir.join("animals.json"))?;
        let records: Vec<HealthRecord> = read_json(&dir.join("records.json"))?;
        debug!(
            pets = pets.len(),
            records = records.len(),
            dir = %dir.display(),
            "loaded fixtures"
        );
        Ok(Self::new(pets, records))
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

#[async_trait]
impl HealthStore for FixtureStore {
    async fn pets_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Pet>> {
        Ok(self
            .pets
            .iter()
            .filter(|pet| pet.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn records_by_animal(&self, animal_id: Uuid) -> anyhow::Result<Vec<HealthRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.animal_id == animal_id)
            .cloned()
            .collect())
    }
}
