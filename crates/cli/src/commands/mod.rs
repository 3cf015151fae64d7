//! Subcommand implementations.
//!
//! Every command loads `.env`, connects with `STOREFRONT_DATABASE_URL`
//! (falling back to `DATABASE_URL`) and works through the storefront's
//! stores and services.

pub mod catalog;
pub mod dashboard;
pub mod login_history;
pub mod migrate;
pub mod orders;
pub mod seed;

use secrecy::SecretString;
use thiserror::Error;

use loka_core::catalog::CatalogError;
use loka_core::OrderNumberError;
use loka_storefront::db::{PgStore, RepositoryError, create_pool};
use loka_storefront::services::orders::OrderError;

/// Errors from CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Order(#[from] OrderError),

    #[error("Invalid catalog entry: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid order number: {0}")]
    OrderNumber(#[from] OrderNumberError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Read the database URL from the environment.
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}

/// Connect to the storefront database.
async fn connect() -> Result<PgStore, CommandError> {
    let database_url = database_url()?;
    tracing::info!("Connecting to storefront database...");
    let pool = create_pool(&database_url).await?;
    Ok(PgStore::new(pool))
}
