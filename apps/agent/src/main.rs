//! Wbskt client agent entry point.

mod app;
mod config;
mod handler;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting Wbskt client agent"
    );

    let path = config::config_path(std::env::args().nth(1));
    let config = config::Config::load_or_create(&path)?;
    tracing::info!(
        path = %path.display(),
        name = %config.client.name,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(path, config))?;

    tracing::info!("agent shut down cleanly");
    Ok(())
}
