use std::sync::Arc;

use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::Deserialize;

use super::GcpTokenProvider;

const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com/v1";

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct SecretPayload {
    data: String,
}

pub struct SecretManagerClient {
    client: Client,
    tokens: Arc<GcpTokenProvider>,
    project_id: String,
}

impl SecretManagerClient {
    pub fn new(client: Client, tokens: Arc<GcpTokenProvider>, project_id: String) -> Self {
        SecretManagerClient {
            client,
            tokens,
            project_id,
        }
    }

    pub async fn get_secret(&self, secret_id: &str, version_id: &str) -> anyhow::Result<String> {
        let url = secret_version_url(&self.project_id, secret_id, version_id);
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to request secret {}", secret_id))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Secret {} not accessible ({}): {}", secret_id, status, body);
        }

        let secret: AccessSecretVersionResponse = response.json().await?;
        decode_payload(&secret.payload.data)
            .with_context(|| format!("Secret {} has an undecodable payload", secret_id))
    }

    pub async fn get_latest_secret(&self, secret_id: &str) -> anyhow::Result<String> {
        self.get_secret(secret_id, "latest").await
    }
}

fn secret_version_url(project_id: &str, secret_id: &str, version_id: &str) -> String {
    format!(
        "{}/projects/{}/secrets/{}/versions/{}:access",
        SECRET_MANAGER_URL, project_id, secret_id, version_id
    )
}

fn decode_payload(data: &str) -> anyhow::Result<String> {
    let bytes = STANDARD.decode(data)?;
    Ok(String::from_utf8(bytes)?)
}
