use std::time::Duration;

use crate::domain::bridge::{DeliveryMode, RequestKind};

/// Which delivery mode each request kind gets unless a request overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub item: DeliveryMode,
    pub feed: DeliveryMode,
    /// Upper bound for a `Once` read. `None` waits forever.
    pub once_timeout: Option<Duration>,
}

impl DeliveryPolicy {
    pub fn mode_for(&self, kind: RequestKind) -> DeliveryMode {
        match kind {
            RequestKind::Item => self.item,
            RequestKind::Feed => self.feed,
        }
    }
}

impl Default for DeliveryPolicy {
    // Items follow live edits, feeds are read once per request.
    fn default() -> Self {
        Self {
            item: DeliveryMode::Continuous,
            feed: DeliveryMode::Once,
            once_timeout: Some(Duration::from_secs(10)),
        }
    }
}
