use std::future::{self, Future};

use futures::StreamExt;
use tracing::debug;

use super::deferred::Deferred;
use crate::stream::data::drain;
use crate::stream::{DataStream, StreamError, Variant};

impl<T: Send + 'static, V: Variant> DataStream<T, V> {
    /// Fold all items sequentially into an accumulator
    ///
    /// Resolves once the stream ended (after its end listeners ran). A
    /// failing reducer fails the stream directly: the accumulator moved into
    /// the failed call, so there is nothing left to recover into.
    pub fn reduce<A, F, Fut>(self, mut f: F, initial: A) -> Deferred<A>
    where
        A: Send + 'static,
        F: FnMut(A, T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<A, StreamError>> + Send + 'static,
    {
        let core = self.core.clone();
        let claimed = self.core.claim_reader();

        Deferred::spawn(async move {
            let mut reader = claimed?;
            let mut acc = initial;
            let mut folded: u64 = 0;

            while let Some(next) = reader.next().await {
                acc = match f(acc, next?).await {
                    Ok(acc) => acc,
                    Err(err) => {
                        core.fail(err.clone());
                        return Err(err);
                    }
                };
                folded += 1;
            }

            debug!(stream = core.id(), folded, "Reduce finished");
            Ok(acc)
        })
    }

    /// Collect every item in order
    pub fn to_array(self) -> Deferred<Vec<T>> {
        self.reduce(
            |mut items, item| {
                items.push(item);
                future::ready(Ok(items))
            },
            Vec::new(),
        )
    }

    /// Consume the stream, discarding items
    pub fn run(self) -> Deferred<()> {
        let claimed = self.core.claim_reader();
        Deferred::spawn(async move { drain(claimed?).await })
    }

    /// Resolve when the stream ended, reject on an unrecovered error
    ///
    /// A stream nobody consumes yet is resumed, so waiting on it cannot
    /// stall on a full buffer.
    pub fn when_end(&self) -> Deferred<()> {
        self.resume();
        let core = self.core.clone();
        Deferred::spawn(async move { core.terminated().await })
    }
}
