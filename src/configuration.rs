use std::time::Duration;

use serde::Deserialize;
use serde_aux::field_attributes::{
    deserialize_number_from_string, deserialize_option_number_from_string,
};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub telegram: TelegramSettings,
    pub classifier: ClassifierSettings,
    pub warehouse: WarehouseSettings,
    pub job: JobSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TelegramSettings {
    pub session_path: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub search_limit: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub message_limit: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub cli_search_limit: usize,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ClassifierSettings {
    pub model: String,
    pub api_base: String,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub max_tokens: Option<u32>,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseBackend {
    Bigquery,
    Postgres,
}

#[derive(Deserialize, Clone, Debug)]
pub struct WarehouseSettings {
    pub backend: WarehouseBackend,
    pub keywords_table: String,
    pub keyword_column: String,
    pub groups_table: String,
    pub database: Option<DatabaseSettings>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(&self.password)
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    SecretManager,
    Environment,
}

#[derive(Deserialize, Clone, Debug)]
pub struct JobSettings {
    pub insert_only_relevant: bool,
    pub include_group_link: bool,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub keyword_pause_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub backfill_pause_secs: u64,
    pub credential_source: CredentialSource,
}

impl JobSettings {
    pub fn keyword_pause(&self) -> Duration {
        Duration::from_secs(self.keyword_pause_secs)
    }

    pub fn backfill_pause(&self) -> Duration {
        Duration::from_secs(self.backfill_pause_secs)
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT.");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let mut builder = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        );

    // Cloud Run hands the listening port over in $PORT
    if let Ok(port) = std::env::var("PORT") {
        builder = builder.set_override("application.port", port)?;
    }

    builder.build()?.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use super::{Environment, JobSettings, Settings, WarehouseBackend};

    #[test]
    fn environment_parses_case_insensitively() {
        let env: Result<Environment, _> = "Production".to_string().try_into();
        assert!(matches!(env, Ok(Environment::Production)));

        let env: Result<Environment, _> = "staging".to_string().try_into();
        assert!(env.is_err());
    }

    #[test]
    fn settings_deserialize_from_yaml() {
        let yaml = r#"
application:
  host: 0.0.0.0
  port: "8080"
telegram:
  session_path: anon.session
  search_limit: 10
  message_limit: 10
  cli_search_limit: 100
classifier:
  model: gemini-2.5-flash
  api_base: https://generativelanguage.googleapis.com/v1beta/openai
warehouse:
  backend: bigquery
  keywords_table: proj.ds.keys
  keyword_column: keys_group
  groups_table: proj.ds.groups
job:
  insert_only_relevant: true
  include_group_link: true
  keyword_pause_secs: 5
  backfill_pause_secs: 1
  credential_source: secret_manager
"#;
        let settings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<Settings>()
            .unwrap();

        assert_eq!(settings.application.port, 8080);
        assert_eq!(settings.warehouse.backend, WarehouseBackend::Bigquery);
        assert!(settings.warehouse.database.is_none());
        assert_eq!(settings.classifier.max_tokens, None);

        let job: &JobSettings = &settings.job;
        assert_eq!(job.keyword_pause().as_secs(), 5);
        assert!(job.insert_only_relevant);
    }
}
