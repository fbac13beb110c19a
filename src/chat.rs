use std::fmt::Write;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::llm::ChatModel;
use crate::models::{HealthRecord, Pet, RecordSummary};
use crate::store::HealthStore;
use crate::summary;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("Forbidden: animal not found for user")]
    Forbidden,

    #[error("Failed to load assistant context: {0}")]
    Store(anyhow::Error),

    #[error("Failed to render assistant context: {0}")]
    Render(#[from] serde_json::Error),

    #[error("Chat model error: {0}")]
    Model(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    #[serde(default)]
    pub animal_id: Option<Uuid>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub model: Option<String>,
}

impl ChatRequest {
    /// Parses a JSON request body carrying the full conversation history.
    pub fn from_json(raw: &str) -> Result<Self, ChatError> {
        serde_json::from_str(raw).map_err(|err| ChatError::InvalidRequest(err.to_string()))
    }

    /// Checks the request shape and returns the parsed user id.
    pub fn validate(&self) -> Result<Uuid, ChatError> {
        let user_id = self.user_id.trim();
        if user_id.is_empty() {
            return Err(ChatError::InvalidRequest("user_id is required".to_string()));
        }
        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| ChatError::InvalidRequest(format!("user_id {user_id} is not a uuid")))?;

        if self.messages.is_empty() {
            return Err(ChatError::InvalidRequest(
                "at least one message is required".to_string(),
            ));
        }
        if self.messages.iter().any(|m| m.content.is_empty()) {
            return Err(ChatError::InvalidRequest(
                "message content must not be empty".to_string(),
            ));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ChatError::InvalidRequest(
                    "temperature must be between 0 and 2".to_string(),
                ));
            }
        }
        Ok(user_id)
    }
}

/// Defaults applied when the request leaves them open.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub summary_days: i64,
    pub recent_days: i64,
}

/// Data the assistant is allowed to answer from.
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    pub animals: Vec<Pet>,
    pub selected: Option<Pet>,
    pub summary: Option<RecordSummary>,
    pub recent: Vec<HealthRecord>,
}

pub async fn gather_context(
    store: &dyn HealthStore,
    user_id: Uuid,
    animal_id: Option<Uuid>,
    today: NaiveDate,
    settings: &ChatSettings,
) -> Result<ChatContext, ChatError> {
    let animals = store.pets_by_user(user_id).await.map_err(ChatError::Store)?;

    let Some(animal_id) = animal_id else {
        return Ok(ChatContext {
            animals,
            ..Default::default()
        });
    };

    let selected = store
        .pet_for_user(user_id, animal_id)
        .await
        .map_err(ChatError::Store)?
        .ok_or(ChatError::Forbidden)?;

    let records = store
        .records_by_animal(selected.id)
        .await
        .map_err(ChatError::Store)?;

    Ok(ChatContext {
        animals,
        summary: summary::summarize(&records, Some(settings.summary_days), today),
        recent: summary::records_in_window(&records, Some(settings.recent_days), today),
        selected: Some(selected),
    })
}

fn json_or_none<T: Serialize>(value: Option<&T>) -> Result<String, serde_json::Error> {
    match value {
        Some(value) => serde_json::to_string_pretty(value),
        None => Ok("(none)".to_string()),
    }
}

pub fn build_system_prompt(
    context: &ChatContext,
    user_id: Uuid,
    now: DateTime<FixedOffset>,
    settings: &ChatSettings,
) -> Result<String, serde_json::Error> {
    let animals = serde_json::to_string_pretty(&context.animals)?;
    let summary = json_or_none(context.summary.as_ref())?;
    let recent = json_or_none(Some(&context.recent).filter(|r| !r.is_empty()))?;
    let selected = context
        .selected
        .as_ref()
        .map(|pet| pet.id.to_string())
        .unwrap_or_else(|| "(none)".to_string());

    let mut output = String::new();
    let _ = writeln!(output, "You are a veterinary and health assistant for registered pets.");
    let _ = writeln!(
        output,
        "Use ONLY the information from \"User's Registered Animals\", \"Recent Record Summary\", and \"Recent Raw Records\" below."
    );
    let _ = writeln!(
        output,
        "If the information is missing, say \"No registered data available\" without guessing."
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "[Today] {}", now.to_rfc3339());
    let _ = writeln!(output, "[User ID] {user_id}");
    let _ = writeln!(output, "[Selected Animal] {selected}");
    let _ = writeln!(output);
    let _ = writeln!(output, "[User's Registered Animals (JSON)]");
    let _ = writeln!(output, "{animals}");
    let _ = writeln!(output);
    let _ = writeln!(output, "[Recent Record Summary ({} days)]", settings.summary_days);
    let _ = writeln!(output, "{summary}");
    let _ = writeln!(output);
    let _ = writeln!(output, "[Recent Raw Records ({} days)]", settings.recent_days);
    let _ = writeln!(output, "{recent}");
    let _ = writeln!(output);
    let _ = writeln!(output, "Response rules:");
    let _ = writeln!(
        output,
        "- If the question is about a specific animal but no animal is selected, first ask which animal the user means."
    );
    let _ = writeln!(
        output,
        "- When age is needed, compute it from birth_date relative to today and express it as 'X years Y months'."
    );
    let _ = writeln!(
        output,
        "- Give concrete, number-based recommendations based on weight_trend_kg, avg.food_g, avg.sleep_h and avg.activity."
    );
    let _ = writeln!(
        output,
        "- If weight changed rapidly (±5% within about 2 weeks) or symptoms_recent is not empty, add a caution and recommend a veterinarian."
    );
    let _ = write!(
        output,
        "- End the answer with: \"Data range: {{range}}, recent records: {{count}}\" as metadata."
    );

    Ok(output)
}

/// Validates the request, assembles the context prompt and asks the model.
///
/// Lookback windows are counted back from the calendar date of `now`.
pub async fn run_chat(
    store: &dyn HealthStore,
    model: &dyn ChatModel,
    request: &ChatRequest,
    settings: &ChatSettings,
    now: DateTime<FixedOffset>,
) -> Result<String, ChatError> {
    let user_id = request.validate()?;
    let context = gather_context(
        store,
        user_id,
        request.animal_id,
        now.date_naive(),
        settings,
    )
    .await?;

    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(ChatMessage::new(
        Role::System,
        build_system_prompt(&context, user_id, now, settings)?,
    ));
    messages.extend(request.messages.iter().cloned());

    let model_name = request.model.as_deref().unwrap_or(&settings.model);
    let temperature = request.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    info!(
        %user_id,
        animal = ?request.animal_id,
        model = model_name,
        messages = messages.len(),
        has_summary = context.summary.is_some(),
        "forwarding chat to model"
    );

    model
        .complete(model_name, temperature, &messages)
        .await
        .map_err(ChatError::Model)
}
