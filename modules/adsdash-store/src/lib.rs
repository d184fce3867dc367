//! Postgres persistence for the dashboard: its own tables plus a read-only
//! view of the property inventory database.

pub mod dashboard;
pub mod error;
pub mod inventory;

pub use dashboard::{BatchOutcome, DashboardStore, LeadTable};
pub use error::{Result, StoreError};
pub use inventory::InventoryReader;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

pub async fn connect_dashboard(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    Ok(pool)
}

/// Pool for the inventory database. Every session is opened read-only.
pub async fn connect_inventory(url: &str, max_connections: u32) -> Result<PgPool> {
    let options: PgConnectOptions = url.parse()?;
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options.options([("default_transaction_read_only", "on")]))
        .await?;
    Ok(pool)
}
