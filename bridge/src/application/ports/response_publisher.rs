use async_trait::async_trait;

use crate::domain::bridge::OutboundEvent;

/// Outbound side of a port session.
#[async_trait]
pub trait ResponsePublisher: Send + Sync {
    async fn publish(&self, event: OutboundEvent) -> anyhow::Result<()>;
}
