use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use adsdash_api::{build_router, jobs, AppState};
use adsdash_common::Config;
use adsdash_store::{connect_dashboard, connect_inventory, DashboardStore, InventoryReader};
use amocrm_client::{CrmClient, CrmSettings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("adsdash=info".parse()?)
                .add_directive("amocrm_client=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    config.log_redacted();

    let dashboard_pool = connect_dashboard(&config.database_url, 10)
        .await
        .context("Failed to connect to the dashboard database")?;
    let inventory_pool = connect_inventory(&config.inventory_database_url, 5)
        .await
        .context("Failed to connect to the inventory database")?;
    info!("Connected to databases");

    let store = DashboardStore::new(dashboard_pool);
    store.migrate().await.context("Failed to run migrations")?;
    info!("Migrations complete");

    let crm = CrmClient::new(CrmSettings::new(
        config.crm.domain.as_deref(),
        config.crm.access_token.as_deref(),
        &config.crm.qualified_tag,
    ))?;

    let addr = format!("{}:{}", config.web_host, config.web_port);
    let sync_interval = config.sync_interval_minutes;

    let state = Arc::new(AppState {
        config,
        store,
        inventory: InventoryReader::new(inventory_pool),
        crm,
    });

    if let Some(minutes) = sync_interval {
        jobs::start_sync_interval(state.clone(), Duration::from_secs(minutes * 60));
    }

    let app = build_router(state);

    info!("Ads dashboard starting on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
