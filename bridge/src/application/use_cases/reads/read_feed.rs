use std::time::Duration;

use crate::application::ports::data_source::DataSource;
use crate::application::services::bridge::read_bounded;
use crate::domain::bridge::{Failure, Outcome, SourcePath};

pub struct ReadFeed<'a, S: DataSource + ?Sized> {
    pub source: &'a S,
    pub timeout: Option<Duration>,
}

impl<'a, S: DataSource + ?Sized> ReadFeed<'a, S> {
    pub async fn execute(&self, name: &str) -> Outcome {
        let path = SourcePath::feed(name).map_err(Failure::from)?;
        read_bounded(self.source, &path, self.timeout).await
    }
}
