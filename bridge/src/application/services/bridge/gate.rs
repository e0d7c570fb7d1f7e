use tokio::sync::Mutex;

use crate::application::ports::response_publisher::ResponsePublisher;
use crate::domain::bridge::OutboundEvent;

/// Serialises deliveries of one subscription against its detach.
///
/// Once [`DeliveryGate::close`] returns, `deliver` never publishes again.
#[derive(Debug)]
pub(crate) struct DeliveryGate {
    open: Mutex<bool>,
}

impl DeliveryGate {
    pub(crate) fn new() -> Self {
        Self {
            open: Mutex::new(true),
        }
    }

    /// Publishes `event` if the gate is still open. Returns `false` when the
    /// gate is closed or the publisher rejected the event.
    pub(crate) async fn deliver(
        &self,
        publisher: &dyn ResponsePublisher,
        event: OutboundEvent,
    ) -> bool {
        let open = self.open.lock().await;
        if !*open {
            return false;
        }
        let subscription = event.subscription();
        match publisher.publish(event).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%subscription, error = %e, "outbound_publish_failed");
                false
            }
        }
    }

    /// Closes the gate, waiting for an in-flight delivery. Returns whether
    /// the gate was open before.
    pub(crate) async fn close(&self) -> bool {
        let mut open = self.open.lock().await;
        std::mem::replace(&mut *open, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bridge::SubscriptionId;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl ResponsePublisher for Counting {
        async fn publish(&self, _event: OutboundEvent) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Rejecting;

    #[async_trait]
    impl ResponsePublisher for Rejecting {
        async fn publish(&self, _event: OutboundEvent) -> anyhow::Result<()> {
            anyhow::bail!("session gone")
        }
    }

    fn detached() -> OutboundEvent {
        OutboundEvent::Detached {
            subscription: SubscriptionId::new(),
        }
    }

    #[tokio::test]
    async fn closed_gate_drops_deliveries() {
        let gate = DeliveryGate::new();
        let publisher = Counting::default();

        assert!(gate.deliver(&publisher, detached()).await);
        assert!(gate.close().await);
        assert!(!gate.deliver(&publisher, detached()).await);
        assert!(!gate.close().await);
        assert_eq!(publisher.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn publisher_errors_report_failed_delivery() {
        let gate = DeliveryGate::new();
        assert!(!gate.deliver(&Rejecting, detached()).await);
    }
}
