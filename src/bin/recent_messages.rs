use clap::Parser;
use env_logger::Env;
use groupfinder::{
    configuration::get_configuration,
    services::{load_telegram_from_env, MessagingPlatform, TelegramPlatform},
};

/// Prints the latest messages of every group found for a keyword.
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
        .search_groups(&args.keyword, configuration.telegram.search_limit)
        .await?;

    for group in groups.iter() {
        println!(
            "\n--- Group: {} (@{}) ---",
            group.title,
            group.username.as_deref().unwrap_or("N/A")
        );

        let messages = match platform
            .recent_messages(group, configuration.telegram.message_limit)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                println!("Could not fetch messages: {}", e);
                continue;
            }
        };

        if messages.is_empty() {
            println!("No recent messages found or history is hidden.");
            continue;
        }
        for message in messages.iter().filter(|m| m.has_text()) {
            println!("{}", message.display_line());
        }
    }

    platform.save_session();
    Ok(())
}
