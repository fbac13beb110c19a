use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod chat;
mod config;
mod db;
mod error;
mod llm;
mod metrics;
mod models;
mod range;
mod service;
mod store;
mod summary;
mod vitals;
mod webhook;

use crate::chat::{ChatMessage, ChatRequest, ChatSettings, Role};
use crate::config::AppConfig;
use crate::db::PgStore;
use crate::models::{
    CareKind, CarePriority, CareRecordInput, CareRecordPatch, CareStatus, PetInput,
};
use crate::store::{FixtureStore, HealthStore};

#[derive(Parser)]
#[command(name = "pet-health")]
#[command(about = "Pet health tracker: daily samples, activity charts and an assistant", long_about = None)]
struct Cli {
    /// Read pets and samples from animals.json / records.json in this
    /// directory instead of Postgres
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo users, pets, daily samples and care records
    Seed,
    /// Import daily samples from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Chart calories and heart rate for an animal
    Metrics {
        #[arg(long)]
        animal_id: Option<String>,
        /// day, week or month; anything else is treated as week
        #[arg(long, default_value = "week")]
        granularity: String,
    },
    /// Summarize an animal's recent samples
    Summary {
        #[arg(long)]
        animal_id: String,
        #[arg(long)]
        days: Option<i64>,
    },
    /// List an animal's samples in date order
    Records {
        #[arg(long)]
        animal_id: String,
        #[arg(long)]
        days: Option<i64>,
    },
    /// Manage pets
    Pets {
        #[command(subcommand)]
        command: PetCommand,
    },
    /// Manage vaccinations, checkups, treatments and appointments
    Care {
        #[command(subcommand)]
        command: CareCommand,
    },
    /// Apply an identity-provider webhook payload (file path or - for stdin)
    Webhook {
        #[arg(long)]
        payload: PathBuf,
    },
    /// Ask the health assistant about your pets
    Chat(ChatArgs),
}

#[derive(Args)]
struct ChatArgs {
    /// JSON request with user_id, animal_id and a role-tagged message
    /// history (file path or - for stdin)
    #[arg(long, conflicts_with_all = ["user_id", "animal_id", "messages"])]
    request: Option<PathBuf>,
    #[arg(long, required_unless_present = "request")]
    user_id: Option<String>,
    #[arg(long)]
    animal_id: Option<Uuid>,
    /// A user turn; repeat for several
    #[arg(long = "message", required_unless_present = "request")]
    messages: Vec<String>,
    #[arg(long)]
    temperature: Option<f64>,
    #[arg(long)]
    model: Option<String>,
}

impl ChatArgs {
    fn into_request(self) -> anyhow::Result<ChatRequest> {
        let mut request = match self.request {
            Some(path) => ChatRequest::from_json(&read_payload(&path)?)?,
            None => ChatRequest {
                user_id: self.user_id.unwrap_or_default(),
                animal_id: self.animal_id,
                messages: self
                    .messages
                    .into_iter()
                    .map(|content| ChatMessage::new(Role::User, content))
                    .collect(),
                temperature: None,
                model: None,
            },
        };
        if self.temperature.is_some() {
            request.temperature = self.temperature;
        }
        if self.model.is_some() {
            request.model = self.model;
        }
        Ok(request)
    }
}

#[derive(Args)]
struct PetArgs {
    #[arg(long)]
    user_id: Uuid,
    #[arg(long)]
    name: String,
    #[arg(long)]
    species: String,
    #[arg(long, default_value = "")]
    breed: String,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    birth_date: Option<NaiveDate>,
    #[arg(long)]
    age: i32,
    #[arg(long, default_value_t = 0.0)]
    weight: f64,
}

impl From<PetArgs> for PetInput {
    fn from(args: PetArgs) -> Self {
        PetInput {
            user_id: args.user_id,
            name: args.name,
            species: args.species,
            breed: args.breed,
            gender: args.gender,
            birth_date: args.birth_date,
            age: args.age,
            weight: args.weight,
        }
    }
}

#[derive(Subcommand)]
enum PetCommand {
    Add(PetArgs),
    List {
        #[arg(long)]
        user_id: Option<Uuid>,
    },
    Show {
        id: Uuid,
    },
    Update {
        id: Uuid,
        #[command(flatten)]
        pet: PetArgs,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Args)]
struct CareArgs {
    #[arg(long)]
    animal_id: Uuid,
    #[arg(long)]
    animal_name: String,
    #[arg(long = "type", value_enum)]
    kind: CareKind,
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    date: NaiveDate,
    #[arg(long)]
    veterinarian: Option<String>,
    #[arg(long)]
    clinic: Option<String>,
    #[arg(long, value_enum, default_value_t = CareStatus::Scheduled)]
    status: CareStatus,
    #[arg(long, value_enum, default_value_t = CarePriority::Routine)]
    priority: CarePriority,
    #[arg(long)]
    user_id: Uuid,
}

impl From<CareArgs> for CareRecordInput {
    fn from(args: CareArgs) -> Self {
        CareRecordInput {
            animal_id: args.animal_id,
            animal_name: args.animal_name,
            kind: args.kind,
            title: args.title,
            description: args.description,
            date: args.date,
            veterinarian: args.veterinarian,
            clinic: args.clinic,
            status: args.status,
            priority: args.priority,
            user_id: args.user_id,
        }
    }
}

#[derive(Args)]
struct CarePatchArgs {
    #[arg(long)]
    animal_id: Option<Uuid>,
    #[arg(long)]
    animal_name: Option<String>,
    #[arg(long = "type", value_enum)]
    kind: Option<CareKind>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    veterinarian: Option<String>,
    #[arg(long)]
    clinic: Option<String>,
    #[arg(long, value_enum)]
    status: Option<CareStatus>,
    #[arg(long, value_enum)]
    priority: Option<CarePriority>,
    #[arg(long)]
    user_id: Option<Uuid>,
}

impl From<CarePatchArgs> for CareRecordPatch {
    fn from(args: CarePatchArgs) -> Self {
        CareRecordPatch {
            animal_id: args.animal_id,
            animal_name: args.animal_name,
            kind: args.kind,
            title: args.title,
            description: args.description,
            date: args.date,
            veterinarian: args.veterinarian,
            clinic: args.clinic,
            status: args.status,
            priority: args.priority,
            user_id: args.user_id,
        }
    }
}

#[derive(Subcommand)]
enum CareCommand {
    Add(CareArgs),
    /// All records, newest first
    List {
        #[arg(long)]
        animal: Option<String>,
        #[arg(long = "type", value_enum)]
        kind: Option<CareKind>,
    },
    Show {
        id: Uuid,
    },
    Update {
        id: Uuid,
        #[command(flatten)]
        patch: CarePatchArgs,
    },
    Delete {
        id: Uuid,
    },
    /// Scheduled visits from today on
    Upcoming {
        #[arg(long)]
        animal: Option<String>,
    },
    /// Completed or ongoing care in the last N days
    Recent {
        #[arg(long)]
        animal: Option<String>,
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

async fn open_store(
    fixtures: Option<&Path>,
    config: &AppConfig,
) -> anyhow::Result<Box<dyn HealthStore>> {
    match fixtures {
        Some(dir) => Ok(Box::new(FixtureStore::load(dir)?)),
        None => Ok(Box::new(PgStore::new(connect(config).await?))),
    }
}

fn read_payload(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut payload = String::new();
        std::io::stdin().read_to_string(&mut payload)?;
        return Ok(payload);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let fixtures = cli.fixtures.as_deref();
    let now = Local::now().fixed_offset();
    let today = now.date_naive();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect(&config).await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&connect(&config).await?).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&connect(&config).await?, &csv).await?;
            println!("Inserted {inserted} samples from {}.", csv.display());
        }
        Commands::Metrics {
            animal_id,
            granularity,
        } => {
            let animal_id = service::parse_animal_id(animal_id.as_deref())?;
            let store = open_store(fixtures, &config).await?;
            let metrics = service::activity_metrics(
                store.as_ref(),
                animal_id,
                Some(granularity.as_str()),
                &now,
            )
            .await?;
            print_json(&metrics)?;
        }
        Commands::Summary { animal_id, days } => {
            let animal_id = service::parse_animal_id(Some(&animal_id))?;
            let store = open_store(fixtures, &config).await?;
            let days = days.unwrap_or(config.summary_days);
            let summary =
                service::summarize_records(store.as_ref(), animal_id, Some(days), today).await?;
            if summary.is_none() {
                info!(%animal_id, days, "no samples in window");
            }
            print_json(&summary)?;
        }
        Commands::Records { animal_id, days } => {
            let animal_id = service::parse_animal_id(Some(&animal_id))?;
            let store = open_store(fixtures, &config).await?;
            let records = service::records_by_animal(store.as_ref(), animal_id, days, today).await?;
            print_json(&records)?;
        }
        Commands::Pets { command } => {
            let pool = connect(&config).await?;
            match command {
                PetCommand::Add(args) => print_json(&db::create_pet(&pool, &args.into()).await?)?,
                PetCommand::List { user_id } => print_json(&db::list_pets(&pool, user_id).await?)?,
                PetCommand::Show { id } => {
                    let pet = db::get_pet(&pool, id).await?.context("Pet not found")?;
                    print_json(&pet)?;
                }
                PetCommand::Update { id, pet } => {
                    let pet = db::update_pet(&pool, id, &pet.into())
                        .await?
                        .context("Pet not found")?;
                    print_json(&pet)?;
                }
                PetCommand::Delete { id } => {
                    if !db::delete_pet(&pool, id).await? {
                        anyhow::bail!("Pet not found");
                    }
                    println!("Pet deleted successfully.");
                }
            }
        }
        Commands::Care { command } => {
            let pool = connect(&config).await?;
            match command {
                CareCommand::Add(args) => print_json(&db::create_care(&pool, &args.into()).await?)?,
                CareCommand::List { animal, kind } => {
                    print_json(&db::list_care(&pool, animal.as_deref(), kind).await?)?
                }
                CareCommand::Show { id } => {
                    let record = db::get_care(&pool, id)
                        .await?
                        .context("Health record not found")?;
                    print_json(&record)?;
                }
                CareCommand::Update { id, patch } => {
                    let record = db::update_care(&pool, id, patch.into())
                        .await?
                        .context("Health record not found")?;
                    print_json(&record)?;
                }
                CareCommand::Delete { id } => {
                    if !db::delete_care(&pool, id).await? {
                        anyhow::bail!("Health record not found");
                    }
                    println!("Health record deleted successfully.");
                }
                CareCommand::Upcoming { animal } => {
                    print_json(&db::upcoming_care(&pool, today, animal.as_deref()).await?)?
                }
                CareCommand::Recent { animal, days } => {
                    print_json(&db::recent_care(&pool, today, days, animal.as_deref()).await?)?
                }
            }
        }
        Commands::Webhook { payload } => {
            let raw = read_payload(&payload)?;
            let event = webhook::WebhookEvent::parse(&raw)?;
            let directory = PgStore::new(connect(&config).await?);
            let outcome = webhook::handle_event(&directory, event).await?;
            println!("{}", outcome.message());
        }
        Commands::Chat(args) => {
            let request = args.into_request()?;
            let settings = ChatSettings {
                model: config.openai_model.clone(),
                summary_days: config.summary_days,
                recent_days: config.recent_days,
            };
            let store = open_store(fixtures, &config).await?;
            let client = llm::OpenAiClient::new(&config.openai_base_url, config.openai_api_key()?);
            let reply =
                chat::run_chat(store.as_ref(), &client, &request, &settings, now).await?;
            println!("{reply}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_args(argv: &[&str]) -> ChatArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Chat(args) => args,
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn chat_request_file_keeps_roles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        std::fs::write(
            &path,
            r#"{
                "user_id": "0c22f1f1-9184-4fd4-9b21-28c68a6a89dc",
                "messages": [
                    { "role": "user", "content": "How much should Buddy eat?" },
                    { "role": "assistant", "content": "About 600 g a day." },
                    { "role": "user", "content": "And Mittens?" }
                ],
                "temperature": 0.2
            }"#,
        )
        .unwrap();

        let path = path.to_string_lossy().to_string();
        let request = chat_args(&["pet-health", "chat", "--request", &path, "--model", "gpt-4o"])
            .into_request()
            .unwrap();
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn chat_messages_from_flags_are_user_turns() {
        let request = chat_args(&[
            "pet-health",
            "chat",
            "--user-id",
            "0c22f1f1-9184-4fd4-9b21-28c68a6a89dc",
            "--message",
            "hello",
            "--message",
            "how is Buddy?",
        ])
        .into_request()
        .unwrap();
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages.iter().all(|m| m.role == Role::User));
    }

    #[test]
    fn chat_needs_a_request_or_messages() {
        assert!(Cli::try_parse_from(["pet-health", "chat"]).is_err());
        assert!(Cli::try_parse_from([
            "pet-health",
            "chat",
            "--request",
            "-",
            "--message",
            "hi"
        ])
        .is_err());
    }
}
