//! `eventsited`: the eventsite backend binary.

use anyhow::Context;
use clap::Parser;
use eventsite_core::{Server, ServerConfig};
use eventsite_server::{build_app, page_routes, AppState, Config, ContactStore, SqliteStore};
use std::sync::Arc;
use tracing::{error, info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn open_store(config: &Config) -> Option<Arc<dyn ContactStore>> {
    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!(path = %parent.display(), error = %e, "cannot create database directory");
            return None;
        }
    }

    match SqliteStore::open(&config.db_path) {
        Ok(store) => {
            info!(path = %config.db_path.display(), "database ready");
            Some(Arc::new(store))
        }
        Err(e) => {
            // Pages and login keep working; contact endpoints answer 500.
            error!(path = %config.db_path.display(), error = %e, "failed to open database");
            None
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::parse();
    if config.uses_dev_secret() {
        warn!("JWT_SECRET not set, using the development secret");
    }

    let server_config = ServerConfig {
        listen: config.listen,
        workers: config.workers(),
        ..Default::default()
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(server_config.workers)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let store = open_store(&config);
        let state = Arc::new(AppState::new(config, store));
        let app = build_app(state, page_routes()?).context("failed to register routes")?;

        info!(version = env!("CARGO_PKG_VERSION"), "starting eventsited");
        Server::new(app, server_config)
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "failed to listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
                info!("shutdown signal received");
            })
            .await
            .context("server error")?;

        info!("server stopped");
        Ok::<(), anyhow::Error>(())
    })
}
