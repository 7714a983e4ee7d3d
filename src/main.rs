use anyhow::Result;
use cinexplora::config::Config;
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let loaded = dotenv();
    init_tracing();
    match loaded {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }
    let config = Config::from_env()?;
    cinexplora::app::run(config).await
}
