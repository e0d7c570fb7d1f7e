use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;

use crate::application::ports::data_source::ValueStream;

/// A value stream that keeps `guard` alive for as long as the stream.
///
/// The inner stream is dropped first, so a guard counting receivers in its
/// `Drop` no longer sees this one.
pub(crate) struct GuardedStream<G> {
    inner: ValueStream,
    _guard: G,
}

impl<G> GuardedStream<G> {
    pub(crate) fn new(inner: ValueStream, guard: G) -> Self {
        Self {
            inner,
            _guard: guard,
        }
    }
}

impl<G: Unpin> Stream for GuardedStream<G> {
    type Item = <ValueStream as Stream>::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
