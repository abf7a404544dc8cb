use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Hands out OAuth access tokens for Google APIs.
///
/// Outside of Google Cloud a token can be supplied through
/// `GOOGLE_OAUTH_ACCESS_TOKEN` (e.g. `gcloud auth print-access-token`),
/// otherwise the metadata server of the running instance is asked.
pub struct GcpTokenProvider {
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl GcpTokenProvider {
    pub fn new(client: Client) -> Self {
        GcpTokenProvider {
            client,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> anyhow::Result<String> {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            return Ok(token);
        }

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("Failed to reach the metadata server for an access token")?;

        if !response.status().is_success() {
            bail!(
                "Metadata server refused the token request with status {}",
                response.status()
            );
        }

        let token: MetadataToken = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}
