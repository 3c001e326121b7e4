//! OpenSASE Pricing - checkout pricing and discount resolution service

use anyhow::Result;
use opensase_pricing::{api, config::Config, services::Services};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;
    let services = Services::from_config(&config).await?;
    let app = api::router(api::AppState::new(services, config.shipping));

    tracing::info!("🚀 OpenSASE Pricing listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
