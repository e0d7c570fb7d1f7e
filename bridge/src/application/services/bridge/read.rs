use std::time::Duration;

use crate::application::ports::data_source::DataSource;
use crate::domain::bridge::{Failure, Outcome, SourcePath};

/// One read of `path`, failing with `Timeout` if `limit` elapses first.
pub async fn read_bounded<S>(source: &S, path: &SourcePath, limit: Option<Duration>) -> Outcome
where
    S: DataSource + ?Sized,
{
    let read = source.read_once(path);
    match limit {
        Some(limit) => match tokio::time::timeout(limit, read).await {
            Ok(res) => res.map_err(Failure::from),
            Err(_) => Err(Failure::timeout(limit)),
        },
        None => read.await.map_err(Failure::from),
    }
}
