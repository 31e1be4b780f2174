use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Small pool: traffic is dominated by slow upstream scoring calls, not by
/// database work, so a handful of connections goes a long way.
const MAX_CONNECTIONS: u32 = 10;

/// Connects to PostgreSQL and returns the shared pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}
