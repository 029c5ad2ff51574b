use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::error::ScsError;

/// Keyed in-flight deduplication: for any key at most one `work` future
/// runs at a time, and every concurrent caller for that key receives a
/// clone of the leader's outcome. Once the flight lands the key is
/// forgotten, so later callers start a fresh fetch.
pub struct SingleFlight<T: Clone> {
    inflight: Mutex<HashMap<String, Arc<OnceCell<Result<T, ScsError>>>>>,
}

impl<T: Clone + Send + Sync> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<T, ScsError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ScsError>>,
    {
        let cell = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let outcome = cell.get_or_init(work).await.clone();

        let mut inflight = self.inflight.lock().await;
        if let Some(current) = inflight.get(key) {
            // Only the flight we rode may be retired; a newer entry under
            // the same key belongs to a later caller.
            if Arc::ptr_eq(current, &cell) {
                inflight.remove(key);
            }
        }
        outcome
    }
}

impl<T: Clone + Send + Sync> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
