use std::net::TcpListener;

use env_logger::Env;
use groupfinder::{
    configuration::get_configuration,
    routes::job_route::JobState,
    services::{JobClients, ScheduledJob},
    startup::run,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");
    let clients = JobClients::new().expect("Failed to build HTTP clients.");

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(address)?;
    log::info!("Listening on {}", listener.local_addr()?);

    let job_state = JobState::new(Box::new(ScheduledJob::new(configuration, clients)));

    run(listener, job_state)?.await
}
