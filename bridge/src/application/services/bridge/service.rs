use std::collections::HashMap;
use std::sync::{Arc, Weak};

use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

use super::gate::DeliveryGate;
use super::policy::DeliveryPolicy;
use super::read::read_bounded;
use crate::application::ports::data_source::DataSource;
use crate::application::ports::response_publisher::ResponsePublisher;
use crate::domain::bridge::{
    DeliveryMode, Failure, OutboundEvent, Request, SourcePath, SubscriptionId,
};

struct ActiveSubscription {
    gate: Arc<DeliveryGate>,
    task: AbortHandle,
}

struct BridgeInner {
    source: Arc<dyn DataSource>,
    publisher: Arc<dyn ResponsePublisher>,
    policy: DeliveryPolicy,
    active: Mutex<HashMap<SubscriptionId, ActiveSubscription>>,
}

/// Turns inbound port requests into subscriptions on a [`DataSource`] and
/// relays every delivery to one [`ResponsePublisher`].
///
/// Each request gets its own task, so any number of requests can be in
/// flight; nothing is merged at this level.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

/// Returned for every accepted request.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    mode: DeliveryMode,
    bridge: Weak<BridgeInner>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Stops delivery. Returns `false` if the subscription had already ended.
    pub async fn detach(self) -> bool {
        match self.bridge.upgrade() {
            Some(inner) => inner.detach(self.id).await,
            None => false,
        }
    }
}

impl Bridge {
    pub fn new(
        source: Arc<dyn DataSource>,
        publisher: Arc<dyn ResponsePublisher>,
        policy: DeliveryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                source,
                publisher,
                policy,
                active: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.inner.policy
    }

    /// Accepts `request` with the mode the policy assigns to its kind.
    pub async fn request(&self, request: Request) -> SubscriptionHandle {
        let mode = self.inner.policy.mode_for(request.kind());
        self.request_with_mode(request, mode).await
    }

    /// Accepts `request`, publishes `Subscribed` and starts delivering.
    ///
    /// Failures (bad path, unreachable source, timeout) are published as
    /// failed responses for the returned subscription; they never surface here.
    pub async fn request_with_mode(&self, request: Request, mode: DeliveryMode) -> SubscriptionHandle {
        let id = SubscriptionId::new();
        let handle = SubscriptionHandle {
            id,
            mode,
            bridge: Arc::downgrade(&self.inner),
        };
        let gate = Arc::new(DeliveryGate::new());

        gate.deliver(
            self.inner.publisher.as_ref(),
            OutboundEvent::Subscribed {
                subscription: id,
                request: request.clone(),
                mode,
            },
        )
        .await;

        let path = match request.path() {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!(subscription = %id, error = %e, "request_rejected_invalid_path");
                let event = OutboundEvent::response(id, &request, Err(Failure::from(e)));
                gate.deliver(self.inner.publisher.as_ref(), event).await;
                if mode == DeliveryMode::Continuous {
                    gate.deliver(
                        self.inner.publisher.as_ref(),
                        OutboundEvent::Detached { subscription: id },
                    )
                    .await;
                }
                return handle;
            }
        };

        tracing::debug!(subscription = %id, %path, %mode, "subscription_attached");

        // The registry lock is held across the spawn so the task cannot
        // release its entry before it is inserted.
        let mut active = self.inner.active.lock().await;
        let inner = self.inner.clone();
        let task_gate = gate.clone();
        let task = tokio::spawn(async move {
            match mode {
                DeliveryMode::Once => inner.run_once(id, request, path, task_gate).await,
                DeliveryMode::Continuous => {
                    inner.run_continuous(id, request, path, task_gate).await
                }
            }
        });
        active.insert(
            id,
            ActiveSubscription {
                gate,
                task: task.abort_handle(),
            },
        );
        handle
    }

    /// Stops delivery for `id`. Once this returns no further response for the
    /// subscription is published.
    pub async fn detach(&self, id: SubscriptionId) -> bool {
        self.inner.detach(id).await
    }

    /// Detaches every active subscription, returning how many there were.
    pub async fn detach_all(&self) -> usize {
        let drained: Vec<(SubscriptionId, ActiveSubscription)> =
            self.inner.active.lock().await.drain().collect();
        let count = drained.len();
        for (id, sub) in drained {
            sub.gate.close().await;
            sub.task.abort();
            tracing::debug!(subscription = %id, "subscription_detached");
        }
        count
    }

    /// Number of subscriptions still attached to the source.
    pub async fn active_count(&self) -> usize {
        self.inner.active.lock().await.len()
    }

    pub async fn is_active(&self, id: SubscriptionId) -> bool {
        self.inner.active.lock().await.contains_key(&id)
    }
}

impl BridgeInner {
    async fn detach(&self, id: SubscriptionId) -> bool {
        let Some(sub) = self.active.lock().await.remove(&id) else {
            return false;
        };
        sub.gate.close().await;
        sub.task.abort();
        tracing::debug!(subscription = %id, "subscription_detached");
        true
    }

    /// Drops the registry entry. `false` means a detach got there first.
    async fn release(&self, id: SubscriptionId) -> bool {
        self.active.lock().await.remove(&id).is_some()
    }

    async fn run_once(
        self: Arc<Self>,
        id: SubscriptionId,
        request: Request,
        path: SourcePath,
        gate: Arc<DeliveryGate>,
    ) {
        let outcome = read_bounded(self.source.as_ref(), &path, self.policy.once_timeout).await;
        if let Err(failure) = &outcome {
            tracing::warn!(subscription = %id, %path, error = %failure, "once_read_failed");
        }
        gate.deliver(
            self.publisher.as_ref(),
            OutboundEvent::response(id, &request, outcome),
        )
        .await;
        gate.close().await;
        self.release(id).await;
    }

    async fn run_continuous(
        self: Arc<Self>,
        id: SubscriptionId,
        request: Request,
        path: SourcePath,
        gate: Arc<DeliveryGate>,
    ) {
        match self.source.subscribe(&path).await {
            Ok(mut stream) => {
                while let Some(item) = stream.next().await {
                    if let Err(e) = &item {
                        tracing::warn!(subscription = %id, %path, error = %e, "subscription_delivery_failed");
                    }
                    let event = OutboundEvent::response(id, &request, item.map_err(Failure::from));
                    if !gate.deliver(self.publisher.as_ref(), event).await {
                        break;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(subscription = %id, %path, error = %e, "source_subscribe_failed");
                let event = OutboundEvent::response(id, &request, Err(Failure::from(e)));
                gate.deliver(self.publisher.as_ref(), event).await;
            }
        }

        if self.release(id).await {
            tracing::debug!(subscription = %id, %path, "subscription_ended_by_source");
            gate.deliver(
                self.publisher.as_ref(),
                OutboundEvent::Detached { subscription: id },
            )
            .await;
            gate.close().await;
        }
    }
}
