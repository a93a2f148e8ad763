use std::time::Duration;

use anyhow::Context;

use gatehouse_api::app::{self, services};
use gatehouse_infra::GatehouseConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gatehouse_observability::init();

    let config = GatehouseConfig::from_env().context("reading GATEHOUSE_* configuration")?;
    if config.bootstrap_admin.is_none() {
        tracing::warn!("GATEHOUSE_ADMIN_USER not set; no administrator will exist");
    }

    let services = services::build_services(&config).await?;
    let _sweeper = services::spawn_session_sweeper(services.sessions.clone(), Duration::from_secs(60));
    let app = app::router(services);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
