use anyhow::Context;
use task_backend::config::AppConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .ok();

    // Missing DATABASE_URL, SESSION_SECRET or AI_API_KEY stops the process here.
    let config = AppConfig::from_env().context("invalid configuration")?;

    let rocket = task_backend::rocket_instance(&config)?;
    rocket
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket server failed to launch: {}", e))?;
    Ok(())
}
