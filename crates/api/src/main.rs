//! API backend entry point.

use std::sync::Arc;

use tracing::{info, warn};

use stardrop_api::{app, clients::{HttpNotifier, HttpVerifier}, AppState};
use stardrop_common::{Config, MemoryStore, PgStore, Store};
use stardrop_engine::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::load()?;

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

    let verifier = Arc::new(HttpVerifier::new(&config));
    let notifier = Arc::new(HttpNotifier::new(&config));
    let engine = Engine::new(store, verifier, notifier, &config);

    let addr = config.api_bind_addr.clone();
    let state = Arc::new(AppState::new(engine, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "api backend listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
