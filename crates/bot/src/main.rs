//! Bot backend entry point: Telegram dispatcher plus the HTTP surface the
//! API backend calls for verification and notification delivery.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use stardrop_common::{Config, MemoryStore, PgStore, Store};
use stardrop_engine::Engine;

mod activation;
mod http;
mod notify;
mod verify;

use notify::TelegramNotifier;
use verify::TelegramVerifier;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "register and open the app")]
    Start(String),
}

async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    engine: Arc<Engine>,
    config: Config,
) -> ResponseResult<()> {
    match cmd {
        Command::Start(payload) => {
            activation::handle_start(bot, msg, payload, engine, config.webapp_url).await
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::load()?;
    let token = config
        .bot_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("BOT_TOKEN is required for the bot backend"))?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url).await?;
            pg.init_schema().await?;
            info!("connected to postgres");
            Arc::new(pg)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let bot = Bot::new(token);
    let verifier = TelegramVerifier::new(bot.clone());
    let notifier = Arc::new(TelegramNotifier::new(
        bot.clone(),
        config.admin_ids.clone(),
        Arc::clone(&store),
    ));
    let engine = Arc::new(Engine::new(
        Arc::clone(&store),
        Arc::new(verifier.clone()),
        Arc::clone(&notifier) as Arc<dyn stardrop_common::Notifier>,
        &config,
    ));

    // HTTP surface for the api backend
    let state = Arc::new(http::BotState {
        verifier,
        notifier,
        store,
    });
    let addr = config.bot_bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "bot backend listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, http::router(state)).await {
            tracing::error!(error = %e, "http server exited");
        }
    });

    // Telegram long-poll dispatcher
    let handler = Update::filter_message().branch(
        dptree::entry()
            .filter_command::<Command>()
            .endpoint(command_handler),
    );

    info!("starting telegram dispatcher");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine, config])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
