use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{Level, info, warn};

use mq::{MqConfig, init_mq};
use nitpick_server::config::AppConfig;
use nitpick_server::fanout::StoreFanout;
use nitpick_server::state::AppState;
use nitpick_server::store::{DbStore, MemoryStore, Store};
use nitpick_server::{build_router, database, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;

    let level: Level = config.logging.level.parse().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    let store: Arc<dyn Store> = if config.database.is_memory() {
        warn!("Using the in-memory store; data is lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        let db = database::init_db(&config.database.url)
            .await
            .context("Failed to connect to database")?;
        seed::ensure_indexes(&db).await?;
        Arc::new(DbStore::new(db))
    };

    seed::seed_catalog(store.as_ref(), &config.catalog)
        .await
        .context("Failed to seed exercise catalog")?;

    let mq = if config.mq.enabled {
        match init_mq(MqConfig {
            url: config.mq.url.clone(),
            pool_size: config.mq.pool_size,
        })
        .await
        {
            Ok(queue) => {
                info!("Connected to MQ at {}", config.mq.url);
                Some(Arc::new(queue))
            }
            Err(e) => {
                warn!("MQ unavailable, background jobs will be skipped: {}", e);
                None
            }
        }
    } else {
        info!("MQ disabled");
        None
    };

    let fanout = Arc::new(StoreFanout::new(store.clone(), mq, config.mq.clone()));
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        store,
        fanout,
        config,
    };
    let app = build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
