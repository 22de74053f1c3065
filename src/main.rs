use std::sync::Arc;

use folio::cache::MapCache;
use folio::config::Config;
use folio::http::connection::Dispatcher;
use folio::routes::Router;
use folio::server::pool::ServerState;
use folio::server::listener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let config = Arc::new(Config::load()?);

    let cache = Arc::new(MapCache::new(
        config.limits.cache_size,
        config.limits.cache_max_file_size,
    ));
    let state = ServerState::new(config.limits.clone());

    let dispatcher: Arc<dyn Dispatcher> = Arc::new(Router::with_defaults(
        state.clone(),
        cache.clone(),
        config.clone(),
    ));

    state.start(&dispatcher)?;

    tokio::select! {
        res = listener::run(&config.network, state.clone(), dispatcher) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    state.shutdown();

    Ok(())
}
