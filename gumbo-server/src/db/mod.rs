//! Database access layer

pub mod orders;
pub mod products;
pub mod queue;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Connect to PostgreSQL with the bounded pool the service runs on.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(25)
        .max_lifetime(Duration::from_secs(300))
        .connect(database_url)
        .await
}
