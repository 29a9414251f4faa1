use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;

use super::inner::Core;
use crate::stream::StreamError;

/// The single consuming end of a stream
///
/// Yields items in write order, then `None` at end. An unrecovered error is
/// yielded once as `Some(Err(_))`, after which the reader is exhausted.
/// Dropping the reader before the stream finished cancels its producers.
pub struct Reader<T: Send + 'static> {
    core: Arc<Core<T>>,
}

impl<T: Send + 'static> Reader<T> {
    pub(crate) fn new(core: Arc<Core<T>>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Arc<Core<T>> {
        &self.core
    }
}

impl<T: Send + 'static> Stream for Reader<T> {
    type Item = Result<T, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.core.poll_read(cx)
    }
}

impl<T: Send + 'static> Drop for Reader<T> {
    fn drop(&mut self) {
        self.core.release_reader();
    }
}
