//! Periodic cleanup of idle sessions and expired CSRF tokens.
//!
//! Without it both tables only shrink when somebody touches a stale entry or
//! a new token is issued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::security::state::SecurityState;

pub struct Sweeper {
    state: Arc<SecurityState>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(state: Arc<SecurityState>, interval: Duration) -> Self {
        Self { state, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Session sweeper starting");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (sessions, tokens) = self.state.sweep();
                    if sessions > 0 || tokens > 0 {
                        tracing::debug!(sessions, tokens, "Swept expired security state");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Session sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
