use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;

use receipts::bot::{self, AppContext};
use receipts::config::Config;
use receipts::db::{self, PgStore};
use receipts::vision::GroqVision;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Fail fast on missing credentials instead of starting with null clients
    let config = Config::from_env()?;

    info!("Starting Receipts Telegram Bot");

    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db::init_database_schema(&pool).await?;

    let vision = GroqVision::new(
        config.groq_api_key.clone(),
        config.vision_model.clone(),
        config.vision_timeout,
    )?;
    let ctx = Arc::new(AppContext {
        store: PgStore::new(pool),
        vision,
    });

    let bot = Bot::new(&config.telegram_bot_token);

    info!("Bot initialized, starting dispatcher");

    // Set up the dispatcher with the shared application context
    let handler = dptree::entry().branch(Update::filter_message().endpoint({
        let ctx = Arc::clone(&ctx);
        move |bot: Bot, msg: Message| {
            let ctx = Arc::clone(&ctx);
            async move { bot::message_handler(bot, msg, ctx).await }
        }
    }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
