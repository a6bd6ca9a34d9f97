/// Background retention sweep for old notifications
use super::dispatcher::NotificationDispatcher;
use crate::config::RetentionConfig;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Periodically delete notifications older than the retention window.
///
/// A failed sweep is logged and retried on the next tick.
pub fn spawn_retention_sweeper(
    dispatcher: NotificationDispatcher,
    config: RetentionConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.sweep_interval);
        loop {
            interval.tick().await;
            match dispatcher.purge_expired(config.days).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, retention_days = config.days, "expired notifications purged"),
                Err(e) => warn!(error = %e, "retention sweep failed"),
            }
        }
    })
}
