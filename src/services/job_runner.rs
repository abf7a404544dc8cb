use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;

use crate::{
    configuration::{CredentialSource, Settings, WarehouseBackend},
    dal::{BigQueryWarehouse, PgWarehouse, Warehouse},
};

use super::{
    backfill_group_links, get_project_id, load_from_env, load_from_secret_manager, run_batch_job,
    BackfillReport, Credentials, DiscoveryOptions, GcpTokenProvider, GeminiClient, JobOptions,
    JobOutcome, SecretManagerClient, TelegramPlatform,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

impl From<&Settings> for JobOptions {
    fn from(settings: &Settings) -> Self {
        JobOptions {
            discovery: DiscoveryOptions {
                search_limit: settings.telegram.search_limit,
                message_limit: settings.telegram.message_limit,
                include_group_link: settings.job.include_group_link,
            },
            insert_only_relevant: settings.job.insert_only_relevant,
            keyword_pause: settings.job.keyword_pause(),
        }
    }
}

/// Clients shared by every run of the process.
pub struct JobClients {
    pub http: reqwest::Client,
    pub tokens: Arc<GcpTokenProvider>,
}

impl JobClients {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let tokens = Arc::new(GcpTokenProvider::new(http.clone()));
        Ok(JobClients { http, tokens })
    }
}

pub async fn load_job_credentials(
    settings: &Settings,
    clients: &JobClients,
) -> anyhow::Result<Credentials> {
    match settings.job.credential_source {
        CredentialSource::SecretManager => {
            let secret_manager = SecretManagerClient::new(
                clients.http.clone(),
                clients.tokens.clone(),
                get_project_id()?,
            );
            load_from_secret_manager(&secret_manager).await
        }
        CredentialSource::Environment => load_from_env(),
    }
}

pub fn build_warehouse(
    settings: &Settings,
    clients: &JobClients,
) -> anyhow::Result<Box<dyn Warehouse>> {
    match settings.warehouse.backend {
        WarehouseBackend::Bigquery => Ok(Box::new(BigQueryWarehouse::new(
            clients.http.clone(),
            clients.tokens.clone(),
            &get_project_id()?,
            &settings.warehouse,
        )?)),
        WarehouseBackend::Postgres => {
            let database = settings
                .warehouse
                .database
                .as_ref()
                .ok_or_else(|| anyhow!("warehouse.database is required for the postgres backend"))?;

            let pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .connect_lazy_with(database.with_db());

            Ok(Box::new(PgWarehouse::new(pool, &settings.warehouse)))
        }
    }
}

/// Loads secrets, builds the three collaborators and runs the batch job once.
pub async fn run_scheduled_job(
    settings: &Settings,
    clients: &JobClients,
) -> anyhow::Result<JobOutcome> {
    let credentials = load_job_credentials(settings, clients).await?;
    let warehouse = build_warehouse(settings, clients)?;
    let generator = GeminiClient::new(credentials.gemini_api_key.clone(), &settings.classifier);
    let platform = TelegramPlatform::connect(
        &settings.telegram.session_path,
        credentials.telegram_api_id,
        &credentials.telegram_api_hash,
    )
    .await?;

    let outcome = run_batch_job(
        &platform,
        &generator,
        warehouse.as_ref(),
        JobOptions::from(settings),
    )
    .await;

    platform.save_session();
    outcome
}

pub async fn run_link_backfill(
    settings: &Settings,
    clients: &JobClients,
) -> anyhow::Result<BackfillReport> {
    let credentials = load_job_credentials(settings, clients).await?;
    let warehouse = build_warehouse(settings, clients)?;
    let platform = TelegramPlatform::connect(
        &settings.telegram.session_path,
        credentials.telegram_api_id,
        &credentials.telegram_api_hash,
    )
    .await?;

    let report =
        backfill_group_links(&platform, warehouse.as_ref(), settings.job.backfill_pause()).await;

    platform.save_session();
    report
}

/// Something the trigger endpoint can run.
#[async_trait]
pub trait JobTrigger: Send + Sync {
    async fn run(&self) -> anyhow::Result<JobOutcome>;
}

pub struct ScheduledJob {
    settings: Settings,
    clients: JobClients,
}

impl ScheduledJob {
    pub fn new(settings: Settings, clients: JobClients) -> Self {
        ScheduledJob { settings, clients }
    }
}

#[async_trait]
impl JobTrigger for ScheduledJob {
    async fn run(&self) -> anyhow::Result<JobOutcome> {
        run_scheduled_job(&self.settings, &self.clients).await
    }
}
