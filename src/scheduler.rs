//! Background buffer sweep.
//!
//! A recurring task owned by the process lifecycle: every tick it lists the
//! users with pending buffered samples and offers each queue to
//! [`BufferedIngestion::maybe_learn`]. It shares the per-user locks with the
//! request-triggered flushes, so the two can race safely on the same queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::buffer::BufferedIngestion;
use crate::storage::SqliteStyleStore;

/// Spawn the recurring sweep. The returned handle aborts it on shutdown.
pub fn spawn_buffer_sweep(
    store: Arc<SqliteStyleStore>,
    ingestion: Arc<BufferedIngestion>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a fresh process does
        // not race its own startup traffic.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_once(&store, &ingestion).await;
        }
    })
}

/// One sweep pass: per-user failures are logged and skipped, never fatal to
/// the sweep itself.
pub async fn sweep_once(store: &SqliteStyleStore, ingestion: &BufferedIngestion) {
    let user_ids = match store.buffered_user_ids() {
        Ok(user_ids) => user_ids,
        Err(e) => {
            tracing::error!(error = %e, "buffer sweep could not list users");
            return;
        }
    };
    tracing::debug!(users = user_ids.len(), "running scheduled style learning");
    for user_id in user_ids {
        if let Err(e) = ingestion.maybe_learn(&user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "scheduled learning failed for user");
        }
    }
}
