use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Sink, SinkExt, StreamExt};
use tracing::{debug, trace};

use crate::channel::{Reader, Writable};
use crate::engine::Deferred;
use crate::options::Options;
use crate::stream::{DataStream, StreamError, Variant};

#[async_trait]
impl<T: Send + 'static, V: Variant> Writable<T> for DataStream<T, V> {
    async fn send(&self, item: T) -> Result<(), StreamError> {
        self.core.send(item).await
    }

    fn end(&self) {
        self.core.end();
    }

    async fn raise(&self, error: StreamError) -> Result<(), StreamError> {
        self.core.raise(error).await
    }

    fn adopt_referrer(&self, upstream: &Arc<Options>) {
        self.core.options().set_referrer(upstream);
    }

    fn is_closed(&self) -> bool {
        self.core.is_cancelled() || self.core.phase().is_terminal()
    }
}

impl<T: Send + 'static, V: Variant> DataStream<T, V> {
    /// Forward every item into `dest` and return it
    ///
    /// `dest` inherits options from this stream. An error this stream could
    /// not recover is raised on `dest` once; if `dest` recovers it, `dest`
    /// ends since nothing more can arrive.
    pub fn pipe<D>(&self, dest: D) -> D
    where
        D: Writable<T> + Clone + 'static,
    {
        dest.adopt_referrer(self.core.options());
        let target = dest.clone();

        match self.core.claim_reader() {
            Ok(reader) => {
                debug!(source = self.core.id(), "Pipe attached");
                tokio::spawn(forward(reader, target));
            }
            Err(err) => {
                tokio::spawn(async move {
                    let _ = target.raise(err).await;
                });
            }
        }
        dest
    }

    /// Forward every item into a `futures::Sink`
    ///
    /// Resolves once the sink was closed after the last item; rejects with
    /// the stream's error or the sink's error wrapped as a source error.
    pub fn pipe_to_sink<S>(&self, sink: S) -> Deferred<()>
    where
        S: Sink<T> + Send + 'static,
        S::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let claimed = self.core.claim_reader();
        Deferred::spawn(async move {
            let reader = claimed?;
            reader.forward(sink.sink_map_err(StreamError::source)).await
        })
    }
}

async fn forward<T, D>(mut reader: Reader<T>, dest: D)
where
    T: Send + 'static,
    D: Writable<T>,
{
    let source = reader.core().id();
    let mut forwarded: u64 = 0;

    while let Some(next) = reader.next().await {
        match next {
            Ok(item) => {
                if dest.is_closed() || dest.send(item).await.is_err() {
                    debug!(source, forwarded, "Pipe destination closed");
                    return;
                }
                forwarded += 1;
                trace!(source, forwarded, "Item piped");
            }
            Err(err) => {
                if dest.raise(err).await.is_ok() {
                    dest.end();
                }
                return;
            }
        }
    }

    debug!(source, forwarded, "Pipe finished");
    dest.end();
}
