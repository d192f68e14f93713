pub mod pg_store;
pub mod rows;
pub mod store_trait;

pub use pg_store::PgStore;
pub use store_trait::{EventOutcome, Store};

use anyhow::{Context, Result};

/// Connects to the store database using `DATABASE_URL` from the environment
/// and runs pending migrations. The usual daemon-startup entry point.
pub async fn connect_from_env() -> Result<PgStore> {
    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set to connect the store")?;
    let store = PgStore::connect(&database_url).await?;
    store.migrate().await?;
    Ok(store)
}

pub async fn migrate(store: &PgStore) -> Result<()> {
    store.migrate().await
}

/// A coarse health signal for the admin `/v1/status` surface: whether the
/// pool can currently round-trip a trivial query.
pub async fn status(pool: &sqlx::PgPool) -> Result<bool> {
    let row: (i32,) = sqlx::query_as("SELECT 1")
        .fetch_one(pool)
        .await
        .context("store status probe query")?;
    Ok(row.0 == 1)
}
