use anyhow::{anyhow, Context};

use super::SecretManagerClient;

pub const PROJECT_ID_ENV: &str = "GCP_PROJECT_ID";

const TELEGRAM_API_ID_SECRET: &str = "telegram-api-id";
const TELEGRAM_API_HASH_SECRET: &str = "telegram-api-hash";
const GEMINI_API_KEY_SECRET: &str = "gemini-api-key";

const TELEGRAM_API_ID_ENV: &str = "TELEGRAM_API_ID";
const TELEGRAM_API_HASH_ENV: &str = "TELEGRAM_API_HASH";
const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Clone)]
pub struct Credentials {
    pub telegram_api_id: i32,
    pub telegram_api_hash: String,
    pub gemini_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("telegram_api_id", &self.telegram_api_id)
            .finish_non_exhaustive()
    }
}

pub fn get_project_id() -> anyhow::Result<String> {
    match std::env::var(PROJECT_ID_ENV) {
        Ok(project_id) if !project_id.trim().is_empty() => Ok(project_id),
        _ => Err(anyhow!("{} environment variable not set.", PROJECT_ID_ENV)),
    }
}

pub async fn load_from_secret_manager(
    secret_manager: &SecretManagerClient,
) -> anyhow::Result<Credentials> {
    log::info!("Fetching secrets from Secret Manager...");

    let api_id = secret_manager
        .get_latest_secret(TELEGRAM_API_ID_SECRET)
        .await?;
    let api_hash = secret_manager
        .get_latest_secret(TELEGRAM_API_HASH_SECRET)
        .await?;
    let gemini_api_key = secret_manager
        .get_latest_secret(GEMINI_API_KEY_SECRET)
        .await?;

    build_credentials(&api_id, api_hash, gemini_api_key)
}

pub fn load_from_env() -> anyhow::Result<Credentials> {
    let (api_id, api_hash) = load_telegram_from_env()?;
    let gemini_api_key = require_env(GEMINI_API_KEY_ENV)?;

    Ok(Credentials {
        telegram_api_id: api_id,
        telegram_api_hash: api_hash,
        gemini_api_key,
    })
}

/// Only the platform half of the credentials, for tools that never call the model.
pub fn load_telegram_from_env() -> anyhow::Result<(i32, String)> {
    let api_id = require_env(TELEGRAM_API_ID_ENV)?;
    let api_hash = require_env(TELEGRAM_API_HASH_ENV)?;

    Ok((parse_api_id(&api_id)?, api_hash))
}

fn require_env(key: &str) -> anyhow::Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("Please set the {} environment variable.", key))
}

fn build_credentials(
    api_id: &str,
    api_hash: String,
    gemini_api_key: String,
) -> anyhow::Result<Credentials> {
    Ok(Credentials {
        telegram_api_id: parse_api_id(api_id)?,
        telegram_api_hash: api_hash.trim().to_string(),
        gemini_api_key: gemini_api_key.trim().to_string(),
    })
}

fn parse_api_id(api_id: &str) -> anyhow::Result<i32> {
    api_id
        .trim()
        .parse()
        .with_context(|| format!("Telegram api id is not numeric: {:?}", api_id))
}
