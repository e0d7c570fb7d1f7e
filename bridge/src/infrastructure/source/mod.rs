use std::sync::Arc;

use crate::application::ports::data_source::DataSource;
use crate::bootstrap::config::{Config, SourceBackend};

pub mod fanout;
pub mod firebase;
mod guard;
pub mod memory;
pub mod sse;
pub mod tree;

pub use fanout::FanoutSource;
pub use firebase::{FirebaseConfig, FirebaseSource};
pub use memory::MemorySource;

/// Builds the configured backend, wrapped in [`FanoutSource`] when
/// continuous subscriptions are deduplicated.
pub async fn build_data_source(cfg: &Config) -> anyhow::Result<Arc<dyn DataSource>> {
    let source: Arc<dyn DataSource> = match cfg.source_backend {
        SourceBackend::Firebase => Arc::new(FirebaseSource::new(cfg.firebase())?),
        SourceBackend::Memory => match &cfg.source_seed_file {
            Some(file) => Arc::new(MemorySource::from_seed_file(file).await?),
            None => Arc::new(MemorySource::new()),
        },
    };
    if cfg.dedupe_continuous {
        Ok(Arc::new(FanoutSource::new(source)))
    } else {
        Ok(source)
    }
}
