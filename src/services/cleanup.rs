//! Cleanup service for expired admin verification codes and sessions.

use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info};

use crate::db::SharedStore;
use crate::error::AppResult;

/// Configuration for the cleanup service.
#[derive(Clone, Copy)]
pub struct CleanupConfig {
    /// How often to run cleanup (in seconds)
    pub interval_secs: u64,
}

/// Start the cleanup background task.
///
/// Spawns a tokio task that periodically deletes verification codes and
/// admin sessions past their expiry.
pub fn start_cleanup_task(store: SharedStore, config: CleanupConfig) {
    tokio::spawn(async move {
        info!(
            "Starting cleanup service (interval: {} seconds)",
            config.interval_secs
        );

        let mut ticker = interval(Duration::from_secs(config.interval_secs));

        loop {
            ticker.tick().await;

            if let Err(e) = run_cleanup(store.as_ref()).await {
                error!("Cleanup task error: {}", e);
            }
        }
    });
}

/// Run a single cleanup cycle.
async fn run_cleanup(store: &dyn crate::db::CredentialStore) -> AppResult<()> {
    let (codes, sessions) = store.purge_expired(Utc::now()).await?;
    if codes > 0 || sessions > 0 {
        info!(
            "Expired credential cleanup: {} codes, {} sessions",
            codes, sessions
        );
    }
    Ok(())
}
