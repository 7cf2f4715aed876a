//! Database module: the credential store seam and its backends.
//!
//! Handlers and services talk to [`CredentialStore`], never to a process-wide
//! client. Production uses [`postgres::PgStore`] over SeaORM; tests (and
//! database-less local runs) use [`memory::MemoryStore`].

pub mod memory;
pub mod postgres;
mod store;

use std::sync::Arc;

use sea_orm::{Database, DatabaseConnection};
use secrecy::ExposeSecret;

use crate::config::Config;
use crate::error::AppResult;

pub use store::CredentialStore;

/// Shared handle to the active credential store backend.
pub type SharedStore = Arc<dyn CredentialStore>;

/// Open a PostgreSQL connection from configuration.
pub async fn connect(config: &Config) -> AppResult<DatabaseConnection> {
    let conn = Database::connect(config.database_url.expose_secret()).await?;
    Ok(conn)
}
