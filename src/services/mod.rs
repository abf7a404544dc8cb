pub mod batch_job;
pub mod credentials;
pub mod gcp_auth;
pub mod gemini_client;
pub mod group_discovery;
pub mod job_runner;
pub mod link_backfill;
pub mod relevance;
pub mod secret_manager;
pub mod telegram;

pub use batch_job::*;
pub use credentials::*;
pub use gcp_auth::*;
pub use gemini_client::*;
pub use group_discovery::*;
pub use job_runner::*;
pub use link_backfill::*;
pub use relevance::*;
pub use secret_manager::*;
pub use telegram::*;
