//! The periodic upload-session sweep: expired sessions are
//! garbage-collected on an interval driven by
//! `upload_cleanup_interval_ms`.

use std::sync::Arc;
use std::time::Duration;

use crate::config::TransferConfig;
use crate::storage::TemporaryUploadStore;

/// Spawn a task that sweeps `store` for expired upload sessions on the
/// interval configured by `config.upload_cleanup_interval_ms`, using
/// `config.upload_session_ttl_ms` as the expiry age. Runs until the
/// returned handle is dropped or aborted.
pub fn spawn_cleanup_task<U: TemporaryUploadStore + 'static>(
    store: Arc<U>,
    config: &TransferConfig,
) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_millis(config.upload_cleanup_interval_ms);
    let ttl = Duration::from_millis(config.upload_session_ttl_ms);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = store.cleanup_expired_uploads(ttl);
            if removed > 0 {
                tracing::info!(removed, "upload session sweep reclaimed expired sessions");
            }
        }
    })
}
