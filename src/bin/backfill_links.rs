use env_logger::Env;
use groupfinder::{
    configuration::get_configuration,
    services::{run_link_backfill, JobClients},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration()?;
    let clients = JobClients::new()?;

    let report = run_link_backfill(&configuration, &clients).await?;

    log::info!(
        "Backfill finished: {} candidates, {} updated, {} without username, {} failed.",
        report.candidates,
        report.updated,
        report.unmatched,
        report.failed
    );
    Ok(())
}
