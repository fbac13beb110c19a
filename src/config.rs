use std::env;

use anyhow::Context;

use crate::summary::DEFAULT_SUMMARY_DAYS;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1";
const DEFAULT_RECENT_DAYS: i64 = 30;

/// Settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub summary_days: i64,
    pub recent_days: i64,
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn days_var(name: &str, default: i64) -> anyhow::Result<i64> {
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a whole number of days")),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: var("DATABASE_URL"),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            summary_days: days_var("SUMMARY_DAYS", DEFAULT_SUMMARY_DAYS)?,
            recent_days: days_var("RECENT_DAYS", DEFAULT_RECENT_DAYS)?,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }

    pub fn openai_api_key(&self) -> anyhow::Result<&str> {
        self.openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY must be set to use the chat assistant")
    }
}
