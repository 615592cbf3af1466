use sqlx::MySqlPool;
use std::time::Duration;
use tokio::time::interval;

use crate::repositories::{AuthorizationCodeRepository, BlacklistRepository, TokenRepository};

/// Background worker sweeping rows that have outlived their usefulness:
/// expired authorization codes, blacklist entries past the expiry of the
/// token they blacklist, and token rows whose refresh lifetime is over.
///
/// The validator and revocation service already delete expired blacklist
/// rows lazily when they consult them; this sweep keeps the tables small
/// for rows that are never consulted again.
pub struct MaintenanceWorker {
    pool: MySqlPool,
    interval_secs: u64,
}

impl MaintenanceWorker {
    pub fn new(pool: MySqlPool, interval_secs: u64) -> Self {
        Self {
            pool,
            interval_secs,
        }
    }

    /// Run indefinitely until the task is cancelled.
    pub async fn run(&self) {
        tracing::info!(
            "Maintenance worker started, sweeping every {} seconds",
            self.interval_secs
        );

        let mut ticker = interval(Duration::from_secs(self.interval_secs));

        loop {
            ticker.tick().await;

            if let Err(e) = self.sweep().await {
                tracing::error!("Maintenance sweep error: {}", e);
            }
        }
    }

    async fn sweep(&self) -> Result<(), anyhow::Error> {
        let codes = AuthorizationCodeRepository::new(self.pool.clone())
            .delete_expired()
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        let blacklist = BlacklistRepository::new(self.pool.clone())
            .delete_expired()
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        let tokens = TokenRepository::new(self.pool.clone())
            .delete_expired()
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        if codes + blacklist + tokens > 0 {
            tracing::info!(
                codes,
                blacklist,
                tokens,
                "maintenance sweep removed expired rows"
            );
        }

        Ok(())
    }
}

/// Spawn the maintenance worker as a background task.
pub fn spawn_maintenance_worker(
    pool: MySqlPool,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let worker = MaintenanceWorker::new(pool, interval_secs);
        worker.run().await;
    })
}
