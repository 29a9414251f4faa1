use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Sink;

use super::inner::Core;
use crate::options::Options;
use crate::stream::StreamError;

/// Anything a stream can be piped into
#[async_trait]
pub trait Writable<T: Send + 'static>: Send + Sync {
    /// Deliver one item, suspending under backpressure
    async fn send(&self, item: T) -> Result<(), StreamError>;

    /// No more items will be delivered
    fn end(&self);

    /// Deliver an upstream error; `Ok(())` when the destination recovered
    async fn raise(&self, error: StreamError) -> Result<(), StreamError>;

    /// Link the destination's options to the upstream layer
    fn adopt_referrer(&self, _upstream: &Arc<Options>) {}

    /// The destination will accept nothing more
    fn is_closed(&self) -> bool {
        false
    }
}

/// `futures::Sink` view of a stream's writable end
///
/// `poll_ready` follows the channel's high/low water marks and
/// `poll_close` ends the stream.
pub struct Writer<T: Send + 'static> {
    core: Arc<Core<T>>,
}

impl<T: Send + 'static> Writer<T> {
    pub(crate) fn new(core: Arc<Core<T>>) -> Self {
        Self { core }
    }
}

impl<T: Send + 'static> Clone for Writer<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T: Send + 'static> Sink<T> for Writer<T> {
    type Error = StreamError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.core.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: T) -> Result<(), Self::Error> {
        self.core.write(item).map(|_| ())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.core.end();
        Poll::Ready(Ok(()))
    }
}
