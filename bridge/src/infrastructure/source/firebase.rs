use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::sse::SseDecoder;
use super::tree;
use crate::application::ports::data_source::{DataSource, SourceError, ValueStream};
use crate::domain::bridge::SourcePath;

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Database origin, e.g. `https://hacker-news.firebaseio.com`.
    pub base_url: String,
    /// Location every path is resolved under, e.g. `v0`. May be empty.
    pub root: String,
    pub connect_timeout: Duration,
    /// Pause before re-opening an interrupted stream.
    pub reconnect_delay: Duration,
    /// A stream silent for this long counts as interrupted. The server sends
    /// `keep-alive` roughly every 30 s.
    pub idle_timeout: Duration,
}

/// Firebase Realtime Database over its REST API: `.json` reads and
/// `text/event-stream` subscriptions.
pub struct FirebaseSource {
    client: reqwest::Client,
    base_url: String,
    root: String,
    reconnect_delay: Duration,
    idle_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

enum StreamEnd {
    ReceiverGone,
    Cancelled(&'static str),
    Interrupted(String),
}

type Tx = mpsc::UnboundedSender<Result<Value, SourceError>>;

impl FirebaseSource {
    pub fn new(cfg: FirebaseConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(cfg.connect_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            root: cfg.root.trim_matches('/').to_string(),
            reconnect_delay: cfg.reconnect_delay,
            idle_timeout: cfg.idle_timeout,
        })
    }

    pub fn url_for(&self, path: &SourcePath) -> String {
        if self.root.is_empty() {
            format!("{}/{}.json", self.base_url, path)
        } else {
            format!("{}/{}/{}.json", self.base_url, self.root, path)
        }
    }
}

async fn connect(
    client: &reqwest::Client,
    url: &str,
    path: &SourcePath,
    streaming: bool,
) -> Result<reqwest::Response, SourceError> {
    let mut req = client.get(url);
    if streaming {
        req = req.header(reqwest::header::ACCEPT, "text/event-stream");
    }
    let resp = req
        .send()
        .await
        .map_err(|e| SourceError::unavailable(path, format!("request failed: {e}")))?;

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let detail = resp
        .json::<ErrorBody>()
        .await
        .map(|b| b.error)
        .unwrap_or_else(|_| format!("upstream returned status {status}"));
    if status == reqwest::StatusCode::BAD_REQUEST {
        Err(SourceError::invalid_path(path, detail))
    } else {
        Err(SourceError::unavailable(path, detail))
    }
}

#[async_trait]
impl DataSource for FirebaseSource {
    async fn read_once(&self, path: &SourcePath) -> Result<Value, SourceError> {
        let url = self.url_for(path);
        let resp = connect(&self.client, &url, path, false).await?;
        resp.json::<Value>()
            .await
            .map_err(|e| SourceError::unavailable(path, format!("malformed body: {e}")))
    }

    async fn subscribe(&self, path: &SourcePath) -> Result<ValueStream, SourceError> {
        let url = self.url_for(path);
        let first = connect(&self.client, &url, path, true).await?;
        tracing::debug!(%path, %url, "firebase_stream_opened");

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(pump(
            self.client.clone(),
            url,
            path.clone(),
            first,
            tx,
            self.reconnect_delay,
            self.idle_timeout,
        ));
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

async fn pump(
    client: reqwest::Client,
    url: String,
    path: SourcePath,
    first: reqwest::Response,
    tx: Tx,
    reconnect_delay: Duration,
    idle_timeout: Duration,
) {
    let mut snapshot = Value::Null;
    let mut next = Some(first);
    loop {
        let resp = match next.take() {
            Some(resp) => resp,
            None => {
                tokio::select! {
                    _ = tx.closed() => return,
                    _ = sleep(reconnect_delay) => {}
                }
                match connect(&client, &url, &path, true).await {
                    Ok(resp) => {
                        tracing::info!(%path, "firebase_stream_reconnected");
                        resp
                    }
                    Err(e @ SourceError::InvalidPath { .. }) => {
                        tracing::warn!(%path, error = %e, "firebase_stream_rejected");
                        let _ = tx.send(Err(e));
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(%path, error = %e, "firebase_stream_reconnect_failed");
                        continue;
                    }
                }
            }
        };

        match read_events(resp, &path, &mut snapshot, &tx, idle_timeout).await {
            StreamEnd::ReceiverGone => {
                tracing::debug!(%path, "firebase_stream_released");
                return;
            }
            StreamEnd::Cancelled(reason) => {
                tracing::warn!(%path, reason, "firebase_stream_cancelled");
                let _ = tx.send(Err(SourceError::unavailable(&path, reason)));
                return;
            }
            StreamEnd::Interrupted(detail) => {
                tracing::warn!(%path, error = %detail, "firebase_stream_interrupted");
                if tx.send(Err(SourceError::unavailable(&path, detail))).is_err() {
                    return;
                }
            }
        }
    }
}

async fn read_events(
    resp: reqwest::Response,
    path: &SourcePath,
    snapshot: &mut Value,
    tx: &Tx,
    idle_timeout: Duration,
) -> StreamEnd {
    let mut body = Box::pin(resp.bytes_stream());
    let mut decoder = SseDecoder::new();
    loop {
        let chunk = tokio::select! {
            _ = tx.closed() => return StreamEnd::ReceiverGone,
            chunk = timeout(idle_timeout, body.next()) => chunk,
        };
        let chunk = match chunk {
            Err(_) => {
                return StreamEnd::Interrupted(format!(
                    "no data for {} ms",
                    idle_timeout.as_millis()
                ));
            }
            Ok(chunk) => chunk,
        };
        let chunk = match chunk {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return StreamEnd::Interrupted(format!("stream read failed: {e}")),
            None => return StreamEnd::Interrupted("stream closed by server".to_string()),
        };

        for event in decoder.push(&chunk) {
            match event.event.as_str() {
                "put" | "patch" => {
                    let payload: StreamPayload = match serde_json::from_str(&event.data) {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(%path, error = %e, "firebase_event_malformed");
                            continue;
                        }
                    };
                    if event.event == "put" {
                        tree::put(snapshot, &payload.path, payload.data);
                    } else {
                        tree::patch(snapshot, &payload.path, payload.data);
                    }
                    if tx.send(Ok(snapshot.clone())).is_err() {
                        return StreamEnd::ReceiverGone;
                    }
                }
                "keep-alive" => {}
                "cancel" => return StreamEnd::Cancelled("subscription cancelled by server"),
                "auth_revoked" => return StreamEnd::Cancelled("credential revoked"),
                other => tracing::debug!(%path, event = other, "firebase_event_ignored"),
            }
        }
    }
}
