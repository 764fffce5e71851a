//! Background removal of expired sessions.
//!
//! Expired sessions are already ignored on load; the reaper only keeps the
//! table from growing.

use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::api::handlers::auth::SessionStore;

const MIN_INTERVAL_SECONDS: u64 = 1;

pub fn spawn_session_reaper(
    sessions: Arc<dyn SessionStore>,
    interval_seconds: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_seconds.max(MIN_INTERVAL_SECONDS));

        loop {
            sleep(interval).await;

            if let Err(err) = purge_once(sessions.as_ref()).await {
                error!("session purge failed: {err:#}");
            }
        }
    })
}

async fn purge_once(sessions: &dyn SessionStore) -> Result<u64> {
    let purged = sessions.purge_expired().await?;
    if purged > 0 {
        info!(purged, "Purged expired sessions");
    } else {
        debug!("No expired sessions to purge");
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::{MemoryStore, SessionState};

    #[tokio::test]
    async fn purge_once_removes_only_expired() -> Result<()> {
        let store = MemoryStore::default();
        store
            .create(b"expired", &SessionState::default(), 0)
            .await?;
        store
            .create(b"live", &SessionState::default(), 3600)
            .await?;

        assert_eq!(purge_once(&store).await?, 1);
        assert!(store.load(b"live").await?.is_some());
        assert_eq!(purge_once(&store).await?, 0);
        Ok(())
    }
}
