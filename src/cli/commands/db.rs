use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::{manager::connect_pool, PgStore};

pub async fn migrate(output_format: OutputFormat) -> anyhow::Result<()> {
    let database = &config().database;
    if database.url.starts_with("memory://") {
        return output_success(output_format, "In-memory store: nothing to migrate", None);
    }

    let store = PgStore::new(connect_pool(database).await?);
    store.migrate().await?;
    output_success(output_format, "Migrations applied", None)
}
