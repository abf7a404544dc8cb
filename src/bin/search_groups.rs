use clap::Parser;
use env_logger::Env;
use groupfinder::{
    configuration::get_configuration,
    services::{load_telegram_from_env, MessagingPlatform, TelegramPlatform},
};

/// Lists public groups and channels matching a keyword.
#[derive(Parser)]
struct Args {
    keyword: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let configuration = get_configuration()?;
    let (api_id, api_hash) = load_telegram_from_env()?;

    let platform =
        TelegramPlatform::connect(&configuration.telegram.session_path, api_id, &api_hash).await?;

    let groups = platform
        .search_groups(&args.keyword, configuration.telegram.cli_search_limit)
        .await?;

    if groups.is_empty() {
        println!("No groups found for '{}'.", args.keyword);
    }
    for group in groups.iter() {
        println!(
            "ID: {}, Title: {}, Username: @{}",
            group.id,
            group.title,
            group.username.as_deref().unwrap_or("N/A")
        );
    }

    platform.save_session();
    Ok(())
}
