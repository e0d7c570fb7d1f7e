use std::sync::Arc;

use crate::application::ports::data_source::DataSource;
use crate::application::ports::response_publisher::ResponsePublisher;
use crate::application::services::bridge::{Bridge, DeliveryPolicy};
use crate::bootstrap::config::Config;

#[derive(Clone)]
pub struct AppContext {
    pub cfg: Config,
    services: Arc<AppServices>,
}

#[derive(Clone)]
pub struct AppServices {
    source: Arc<dyn DataSource>,
    policy: DeliveryPolicy,
}

impl AppServices {
    pub fn new(source: Arc<dyn DataSource>, policy: DeliveryPolicy) -> Self {
        Self { source, policy }
    }
}

impl AppContext {
    pub fn new(cfg: Config, services: AppServices) -> Self {
        Self {
            cfg,
            services: Arc::new(services),
        }
    }

    pub fn source(&self) -> Arc<dyn DataSource> {
        self.services.source.clone()
    }

    pub fn delivery_policy(&self) -> DeliveryPolicy {
        self.services.policy
    }

    /// A fresh bridge whose deliveries go to `publisher`. Each port session
    /// owns one and detaches it when the session ends.
    pub fn open_bridge(&self, publisher: Arc<dyn ResponsePublisher>) -> Bridge {
        Bridge::new(self.services.source.clone(), publisher, self.services.policy)
    }
}
