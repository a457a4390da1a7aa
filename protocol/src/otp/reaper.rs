//! Background sweep of expired OTP records.
//!
//! Optional. Validation never depends on it; expired records are already
//! invisible to reads. The sweep only keeps the map from growing with codes
//! nobody came back for.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::clock::Clock;
use super::store::OtpStore;

/// Spawns a task that purges expired records every `interval`.
///
/// The first sweep runs one full interval after spawning. Abort the returned
/// handle to stop it.
pub fn spawn_reaper(store: Arc<OtpStore>, clock: Arc<dyn Clock>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = store.purge_expired(clock.now());
            if removed > 0 {
                tracing::debug!(removed, remaining = store.len(), "expired otp records purged");
            }
        }
    })
}
