use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use coffer_api::AppState;

/// Background task that drops share links which can no longer be consumed.
///
/// Dead links are already refused at download time; this only keeps the
/// table from growing.
pub async fn run_prune_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match state.shares.prune(Utc::now()) {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: pruned {} dead share links", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}
