use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::{StreamExt, future, stream};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::guard::GuardedStream;
use crate::application::ports::data_source::{DataSource, SourceError, ValueStream};
use crate::domain::bridge::SourcePath;

const FANOUT_CHANNEL_CAP: usize = 256;

type Change = Result<Value, SourceError>;

struct SharedPath {
    generation: u64,
    tx: broadcast::Sender<Change>,
    /// Latest good snapshot. Failures are only broadcast live.
    last: Option<Value>,
    task: AbortHandle,
}

type Registry = Arc<Mutex<HashMap<String, SharedPath>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<String, SharedPath>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shares one upstream subscription per path between all subscribers.
///
/// A subscriber joining an already attached path first receives the most
/// recent successful snapshot. The upstream subscription is dropped together with the
/// last subscriber stream.
pub struct FanoutSource {
    upstream: Arc<dyn DataSource>,
    shared: Registry,
    generation: AtomicU64,
}

impl FanoutSource {
    pub fn new(upstream: Arc<dyn DataSource>) -> Self {
        Self {
            upstream,
            shared: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Number of paths with a live upstream subscription.
    pub fn upstream_count(&self) -> usize {
        lock(&self.shared).len()
    }
}

#[async_trait]
impl DataSource for FanoutSource {
    async fn read_once(&self, path: &SourcePath) -> Result<Value, SourceError> {
        self.upstream.read_once(path).await
    }

    async fn subscribe(&self, path: &SourcePath) -> Result<ValueStream, SourceError> {
        let key = path.to_string();
        let (rx, last, generation) = {
            let mut shared = lock(&self.shared);
            match shared.get(&key) {
                Some(entry) => (entry.tx.subscribe(), entry.last.clone(), entry.generation),
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = broadcast::channel(FANOUT_CHANNEL_CAP);
                    let task = tokio::spawn(forward(
                        self.upstream.clone(),
                        path.clone(),
                        self.shared.clone(),
                        generation,
                    ));
                    shared.insert(
                        key.clone(),
                        SharedPath {
                            generation,
                            tx,
                            last: None,
                            task: task.abort_handle(),
                        },
                    );
                    tracing::debug!(%path, generation, "fanout_upstream_attached");
                    (rx, None, generation)
                }
            }
        };

        let watched = key.clone();
        let changes = BroadcastStream::new(rx).filter_map(move |item| {
            let out = match item {
                Ok(change) => Some(change),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(path = %watched, skipped, "fanout_subscriber_lagged");
                    None
                }
            };
            future::ready(out)
        });
        let replay = stream::iter(last.map(Ok));
        Ok(Box::pin(GuardedStream::new(
            Box::pin(replay.chain(changes)),
            Release {
                shared: self.shared.clone(),
                key,
                generation,
            },
        )))
    }
}

async fn forward(upstream: Arc<dyn DataSource>, path: SourcePath, shared: Registry, generation: u64) {
    let publish = |change: Change| {
        let mut map = lock(&shared);
        if let Some(entry) = map.get_mut(path.as_str()) {
            if entry.generation == generation {
                if let Ok(value) = &change {
                    entry.last = Some(value.clone());
                }
                let _ = entry.tx.send(change);
            }
        }
    };

    match upstream.subscribe(&path).await {
        Ok(mut changes) => {
            while let Some(change) = changes.next().await {
                publish(change);
            }
        }
        Err(e) => publish(Err(e)),
    }

    let mut map = lock(&shared);
    if map
        .get(path.as_str())
        .is_some_and(|entry| entry.generation == generation)
    {
        // Dropping the sender ends every subscriber stream.
        map.remove(path.as_str());
        tracing::debug!(%path, generation, "fanout_upstream_ended");
    }
}

struct Release {
    shared: Registry,
    key: String,
    generation: u64,
}

impl Drop for Release {
    fn drop(&mut self) {
        let mut map = lock(&self.shared);
        let idle = map
            .get(&self.key)
            .is_some_and(|e| e.generation == self.generation && e.tx.receiver_count() == 0);
        if idle {
            if let Some(entry) = map.remove(&self.key) {
                entry.task.abort();
                tracing::debug!(path = %self.key, generation = self.generation, "fanout_upstream_released");
            }
        }
    }
}
