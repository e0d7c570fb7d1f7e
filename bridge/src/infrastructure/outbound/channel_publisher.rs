use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::ports::response_publisher::ResponsePublisher;
use crate::domain::bridge::OutboundEvent;

/// Publishes outbound events into an in-process channel, in order,
/// converting them to `T` on the way.
pub struct ChannelResponsePublisher<T = OutboundEvent> {
    sender: mpsc::UnboundedSender<T>,
}

impl<T> Clone for ChannelResponsePublisher<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> ChannelResponsePublisher<T> {
    pub fn new(sender: mpsc::UnboundedSender<T>) -> Self {
        Self { sender }
    }

    /// A publisher together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Another handle onto the same channel, for messages that must stay
    /// ordered with the published events.
    pub fn sender(&self) -> mpsc::UnboundedSender<T> {
        self.sender.clone()
    }
}

#[async_trait]
impl<T> ResponsePublisher for ChannelResponsePublisher<T>
where
    T: From<OutboundEvent> + Send + 'static,
{
    async fn publish(&self, event: OutboundEvent) -> anyhow::Result<()> {
        self.sender
            .send(T::from(event))
            .map_err(|_| anyhow::anyhow!("outbound channel closed"))
    }
}
