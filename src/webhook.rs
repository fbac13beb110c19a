//! User provisioning driven by identity-provider webhooks.
//!
//! Payloads arrive as `{ "type": "...", "data": { ... } }`. Only the event
//! kinds that touch the user table get typed bodies; everything else is
//! acknowledged and ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::store::UserDirectory;

const FALLBACK_NAME: &str = "User";

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Invalid webhook payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Webhook {event} is missing {field}")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },

    #[error("User directory error: {0}")]
    Directory(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EmailAddress {
    pub email_address: String,
}

/// Profile fields carried by `user.created`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UserPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
}

impl UserPayload {
    /// "First Last", then username, then the local part of the first
    /// email address.
    pub fn display_name(&self) -> String {
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if let (Some(first), Some(last)) = (non_blank(&self.first_name), non_blank(&self.last_name)) {
            return format!("{first} {last}");
        }
        if let Some(username) = non_blank(&self.username) {
            return username;
        }
        self.email_addresses
            .first()
            .and_then(|email| email.email_address.split('@').next())
            .filter(|local| !local.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| FALLBACK_NAME.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SessionPayload {
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DeletedPayload {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    UserCreated(UserPayload),
    SessionCreated(SessionPayload),
    UserDeleted(DeletedPayload),
    Other(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl WebhookEvent {
    pub fn parse(payload: &str) -> Result<Self, WebhookError> {
        let envelope: Envelope = serde_json::from_str(payload)?;
        let event = match envelope.kind.as_str() {
            "user.created" => WebhookEvent::UserCreated(serde_json::from_value(envelope.data)?),
            "session.created" => {
                WebhookEvent::SessionCreated(serde_json::from_value(envelope.data)?)
            }
            "user.deleted" => WebhookEvent::UserDeleted(serde_json::from_value(envelope.data)?),
            _ => WebhookEvent::Other(envelope.kind),
        };
        Ok(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    UserCreated,
    UserExists,
    UserDeleted,
    Processed,
}

impl WebhookOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            WebhookOutcome::UserCreated => "User created",
            WebhookOutcome::UserExists => "User already exists",
            WebhookOutcome::UserDeleted => "User deleted",
            WebhookOutcome::Processed => "Webhook processed",
        }
    }
}

fn require(value: &str, event: &'static str, field: &'static str) -> Result<(), WebhookError> {
    if value.trim().is_empty() {
        return Err(WebhookError::MissingField { event, field });
    }
    Ok(())
}

async fn provision(
    directory: &dyn UserDirectory,
    identity_id: &str,
    name: &str,
) -> Result<WebhookOutcome, WebhookError> {
    if directory.find_by_identity(identity_id).await?.is_some() {
        info!(identity_id, name, "user already exists");
        return Ok(WebhookOutcome::UserExists);
    }

    let user = directory.create_user(identity_id, name).await?;
    info!(identity_id, user_id = %user.id, name = %user.name, "created user");
    Ok(WebhookOutcome::UserCreated)
}

pub async fn handle_event(
    directory: &dyn UserDirectory,
    event: WebhookEvent,
) -> Result<WebhookOutcome, WebhookError> {
    match event {
        WebhookEvent::UserCreated(user) => {
            require(&user.id, "user.created", "data.id")?;
            provision(directory, &user.id, &user.display_name()).await
        }
        WebhookEvent::SessionCreated(session) => {
            require(&session.user_id, "session.created", "data.user_id")?;
            provision(directory, &session.user_id, FALLBACK_NAME).await
        }
        WebhookEvent::UserDeleted(deleted) => {
            require(&deleted.id, "user.deleted", "data.id")?;
            let removed = directory.delete_by_identity(&deleted.id).await?;
            if removed == 0 {
                warn!(identity_id = %deleted.id, "delete requested for unknown user");
            }
            Ok(WebhookOutcome::UserDeleted)
        }
        WebhookEvent::Other(kind) => {
            info!(kind = %kind, "ignoring webhook event");
            Ok(WebhookOutcome::Processed)
        }
    }
}
