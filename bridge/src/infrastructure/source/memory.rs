use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use async_trait::async_trait;
use futures_util::{StreamExt, future, stream};
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::guard::GuardedStream;
use crate::application::ports::data_source::{DataSource, SourceError, ValueStream};
use crate::domain::bridge::SourcePath;

const WATCH_CHANNEL_CAP: usize = 256;

type Change = Result<Value, SourceError>;

type Watchers = Arc<Mutex<HashMap<String, broadcast::Sender<Change>>>>;

fn lock(watchers: &Watchers) -> MutexGuard<'_, HashMap<String, broadcast::Sender<Change>>> {
    watchers.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct MemoryState {
    values: HashMap<String, Value>,
    failures: HashMap<String, String>,
    stalled: HashSet<String>,
}

/// Flat path → value store living in process memory.
///
/// Paths are exact keys: writing `item/1` does not change what `item` reads.
/// A path keeps a change channel only while it has subscribers.
#[derive(Default)]
pub struct MemorySource {
    state: RwLock<MemoryState>,
    // Only locked while `state` is held or from a stream's drop guard.
    watchers: Watchers,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a JSON object mapping paths to values.
    pub fn from_json(seed: Value) -> anyhow::Result<Self> {
        let Value::Object(entries) = seed else {
            anyhow::bail!("memory source seed must be a JSON object of path -> value");
        };
        let state = MemoryState {
            values: entries.into_iter().collect(),
            ..MemoryState::default()
        };
        Ok(Self {
            state: RwLock::new(state),
            watchers: Watchers::default(),
        })
    }

    pub async fn from_seed_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("read seed file {}", path.display()))?;
        let seed: Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse seed file {}", path.display()))?;
        Self::from_json(seed)
    }

    fn notify(&self, path: &str, change: Change) {
        if let Some(tx) = lock(&self.watchers).get(path) {
            let _ = tx.send(change);
        }
    }

    /// Stores `value` at `path` and notifies every subscriber of that path.
    pub async fn set(&self, path: &str, value: Value) {
        let mut state = self.state.write().await;
        state.values.insert(path.to_string(), value.clone());
        self.notify(path, Ok(value));
    }

    /// Removes the value at `path`; subscribers see `null`.
    pub async fn remove(&self, path: &str) -> Option<Value> {
        let mut state = self.state.write().await;
        let previous = state.values.remove(path);
        self.notify(path, Ok(Value::Null));
        previous
    }

    pub async fn get(&self, path: &str) -> Option<Value> {
        self.state.read().await.values.get(path).cloned()
    }

    /// Makes reads and new subscriptions at `path` fail as unavailable, and
    /// pushes the failure to current subscribers.
    pub async fn fail_path(&self, path: &str, detail: impl Into<String>) {
        let detail = detail.into();
        let mut state = self.state.write().await;
        self.notify(
            path,
            Err(SourceError::Unavailable {
                path: path.to_string(),
                detail: detail.clone(),
            }),
        );
        state.failures.insert(path.to_string(), detail);
    }

    pub async fn clear_failure(&self, path: &str) {
        self.state.write().await.failures.remove(path);
    }

    /// Reads at `path` never resolve until [`MemorySource::resume`] is called
    /// and a new read is issued.
    pub async fn stall(&self, path: &str) {
        self.state.write().await.stalled.insert(path.to_string());
    }

    pub async fn resume(&self, path: &str) {
        self.state.write().await.stalled.remove(path);
    }

    /// Ends every open subscription stream at `path`.
    pub async fn close_subscriptions(&self, path: &str) {
        let _state = self.state.write().await;
        lock(&self.watchers).remove(path);
    }

    /// Number of live subscription streams at `path`.
    pub async fn subscriber_count(&self, path: &str) -> usize {
        lock(&self.watchers)
            .get(path)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of paths that currently hold a change channel.
    pub fn watched_paths(&self) -> usize {
        lock(&self.watchers).len()
    }
}

/// Drops the change channel of a path once its last stream is gone.
struct Unwatch {
    watchers: Watchers,
    path: String,
}

impl Drop for Unwatch {
    fn drop(&mut self) {
        let mut watchers = lock(&self.watchers);
        if watchers
            .get(&self.path)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            watchers.remove(&self.path);
        }
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn read_once(&self, path: &SourcePath) -> Result<Value, SourceError> {
        {
            let state = self.state.read().await;
            if let Some(detail) = state.failures.get(path.as_str()) {
                return Err(SourceError::unavailable(path, detail.clone()));
            }
            if !state.stalled.contains(path.as_str()) {
                return Ok(state.values.get(path.as_str()).cloned().unwrap_or(Value::Null));
            }
        }
        future::pending().await
    }

    async fn subscribe(&self, path: &SourcePath) -> Result<ValueStream, SourceError> {
        // Holding `state` keeps writers out between reading the current value
        // and attaching the receiver.
        let state = self.state.read().await;
        if let Some(detail) = state.failures.get(path.as_str()) {
            return Err(SourceError::unavailable(path, detail.clone()));
        }
        let current = state
            .values
            .get(path.as_str())
            .cloned()
            .unwrap_or(Value::Null);
        let rx = lock(&self.watchers)
            .entry(path.to_string())
            .or_insert_with(|| broadcast::channel(WATCH_CHANNEL_CAP).0)
            .subscribe();
        drop(state);

        let watched = path.to_string();
        let changes = BroadcastStream::new(rx).filter_map(move |item| {
            let out = match item {
                Ok(change) => Some(change),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(path = %watched, skipped, "memory_subscriber_lagged");
                    None
                }
            };
            future::ready(out)
        });
        Ok(Box::pin(GuardedStream::new(
            Box::pin(stream::once(future::ready(Ok(current))).chain(changes)),
            Unwatch {
                watchers: self.watchers.clone(),
                path: path.to_string(),
            },
        )))
    }
}
