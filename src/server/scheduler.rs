use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::{LazyCache, RefreshSelection};
use crate::config::Configuration;

/// Periodic collateral refresh: one task re-fetches PCK certificates,
/// the other walks the non-PCK collateral. Both share the configured
/// period but tick independently; a tick that is still running simply
/// delays the next one.
pub struct RefreshScheduler {
    cache: Arc<LazyCache>,
    period: Duration,
}

impl RefreshScheduler {
    pub fn new(cache: Arc<LazyCache>, config: &Configuration) -> Self {
        Self {
            cache,
            period: Duration::from_secs(config.refresh_hours * 3600),
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(run_refresh_task(
                "pck_cert_refresh",
                self.cache.clone(),
                self.period,
                RefreshSelection::Certs,
                shutdown.clone(),
            )),
            tokio::spawn(run_refresh_task(
                "collateral_refresh",
                self.cache,
                self.period,
                RefreshSelection::Tcbs,
                shutdown,
            )),
        ]
    }
}

async fn run_refresh_task(
    name: &'static str,
    cache: Arc<LazyCache>,
    period: Duration,
    selection: RefreshSelection,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the cache was just primed or is
    // empty, so skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracing::debug!(task = name, "refresh tick");
                if let Err(err) = cache.refresh(Some(selection)).await {
                    tracing::warn!(task = name, error = %err, "refresh tick failed");
                }
            }
            _ = shutdown.changed() => {
                tracing::debug!(task = name, "refresh task stopping");
                break;
            }
        }
    }
}
