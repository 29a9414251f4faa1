use std::future::Future;

use futures::{FutureExt, TryFutureExt};
use tracing::warn;

use super::stage::{Invocation, Verdict, run_stage};
use crate::stream::{DataStream, StreamError, Variant};

impl<T: Send + 'static, V: Variant> DataStream<T, V> {
    /// Spawn a stage consuming this stream into a new derived stream
    ///
    /// Fails the returned stream when this one already has a consumer.
    pub(crate) fn attach<U, Op>(self, name: &'static str, op: Op) -> DataStream<U, V>
    where
        U: Send + 'static,
        Op: FnMut(T) -> Invocation<U> + Send + 'static,
    {
        let out = self.derive::<U>();
        match self.core.claim_reader() {
            Ok(reader) => {
                tokio::spawn(run_stage(name, reader, out.core.clone(), op));
            }
            Err(err) => {
                warn!(stage = name, stream = self.core.id(), "Operator attached to consumed stream");
                out.core.fail(err);
            }
        }
        out
    }

    /// Transform every item
    ///
    /// Up to `max_parallel` calls of `f` run concurrently; results are
    /// released in input order. A failing call raises its error on the
    /// returned stream.
    ///
    /// # Example
    /// ```rust,ignore
    /// let doubled = DataStream::from_array(vec![1, 2, 3])
    ///     .map(|n| async move { Ok(n * 2) });
    /// ```
    pub fn map<U, F, Fut>(self, f: F) -> DataStream<U, V>
    where
        U: Send + 'static,
        F: Fn(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U, StreamError>> + Send + 'static,
    {
        self.attach("map", move |item| f(item).map_ok(Verdict::Emit).boxed())
    }

    /// Keep only items for which `predicate` resolves to `true`
    pub fn filter<F, Fut>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<bool, StreamError>> + Send + 'static,
    {
        self.attach("filter", move |item| {
            let keep = predicate(&item);
            async move {
                Ok(if keep.await? {
                    Verdict::Emit(item)
                } else {
                    Verdict::Skip
                })
            }
            .boxed()
        })
    }

    /// Run a side effect per item, forwarding items unchanged
    pub fn each<F, Fut>(self, f: F) -> Self
    where
        F: Fn(&T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
    {
        self.attach("each", move |item| {
            let done = f(&item);
            async move {
                done.await?;
                Ok(Verdict::Emit(item))
            }
            .boxed()
        })
    }

    /// Forward items while `predicate` holds, then end
    ///
    /// Nothing past the first failing item is read from upstream.
    pub fn take_while<F, Fut>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<bool, StreamError>> + Send + 'static,
    {
        self.attach("while", move |item| {
            let holds = predicate(&item);
            async move {
                Ok(if holds.await? {
                    Verdict::Emit(item)
                } else {
                    Verdict::Stop
                })
            }
            .boxed()
        })
    }

    /// Forward items until `predicate` first holds, then end
    ///
    /// The matching item is not forwarded and nothing after it is read.
    pub fn until<F, Fut>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<bool, StreamError>> + Send + 'static,
    {
        self.attach("until", move |item| {
            let reached = predicate(&item);
            async move {
                Ok(if reached.await? {
                    Verdict::Stop
                } else {
                    Verdict::Emit(item)
                })
            }
            .boxed()
        })
    }

    /// Same stream under another variant
    pub fn into_variant<W: Variant>(self, variant: W) -> DataStream<T, W> {
        DataStream::from_parts(self.core.clone(), variant)
    }
}
