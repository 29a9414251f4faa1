use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tokio::task::JoinHandle;

use crate::stream::StreamError;

pin_project! {
    /// Eagerly started result of a terminal operation
    ///
    /// The work runs on the runtime whether or not the value is awaited, so
    /// `stream.run()` alone consumes the stream. Awaiting yields the outcome;
    /// a panicked or aborted task surfaces as [`StreamError::Aborted`].
    #[must_use = "the outcome of the stream is only observable by awaiting it"]
    pub struct Deferred<T> {
        #[pin]
        handle: JoinHandle<Result<T, StreamError>>,
    }
}

impl<T: Send + 'static> Deferred<T> {
    pub(crate) fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = Result<T, StreamError>> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(work),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the underlying task; awaiting afterwards yields `Aborted`
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl<T> Future for Deferred<T> {
    type Output = Result<T, StreamError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().handle.poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(join)) => Poll::Ready(Err(join.into())),
            Poll::Pending => Poll::Pending,
        }
    }
}
