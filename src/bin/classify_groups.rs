use clap::Parser;
use env_logger::Env;
use groupfinder::{
    configuration::get_configuration,
    services::{
        get_and_classify_groups, load_from_env, DiscoveryOptions, GeminiClient, TelegramPlatform,
    },
};

/// Runs discovery and classification for one keyword without touching the
/// warehouse, printing the classified groups as JSON.
#[derive(Parser)]
struct Args {
    keyword: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let configuration = get_configuration()?;
    let credentials = load_from_env()?;

    let platform = TelegramPlatform::connect(
        &configuration.telegram.session_path,
        credentials.telegram_api_id,
        &credentials.telegram_api_hash,
    )
    .await?;
    let generator = GeminiClient::new(credentials.gemini_api_key.clone(), &configuration.classifier);

    let options = DiscoveryOptions {
        search_limit: configuration.telegram.search_limit,
        message_limit: configuration.telegram.message_limit,
        include_group_link: configuration.job.include_group_link,
    };
    let groups = get_and_classify_groups(&platform, &generator, &args.keyword, options).await;

    println!("{}", serde_json::to_string_pretty(&groups)?);

    platform.save_session();
    Ok(())
}
