use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;

use crate::stream::{DataStream, StreamError, Variant};

impl<T: Send + 'static, V: Variant> DataStream<T, V> {
    /// Append a recovery handler to this stream's catch chain
    ///
    /// Handlers run in the order they were added. `Ok(())` swallows the
    /// error; `Err(e)` passes `e` (the same error or a new one) on to the
    /// next handler. An error no handler recovers fails the stream.
    pub fn catch<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(StreamError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
    {
        self.core
            .add_handler(Arc::new(move |err: StreamError| handler(err).boxed()));
        self
    }
}
