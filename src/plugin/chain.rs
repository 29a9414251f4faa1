use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::warn;

use crate::options::StreamOptions;
use crate::stream::{DataStream, StreamError, Variant};

type Step<R> = BoxFuture<'static, Result<R, StreamError>>;

enum Operator<T> {
    Map(Arc<dyn Fn(T) -> Step<T> + Send + Sync>),
    Filter(Arc<dyn Fn(&T) -> Step<bool> + Send + Sync>),
    Each(Arc<dyn Fn(&T) -> Step<()> + Send + Sync>),
    TakeWhile(Arc<dyn Fn(&T) -> Step<bool> + Send + Sync>),
    Until(Arc<dyn Fn(&T) -> Step<bool> + Send + Sync>),
    Options(StreamOptions),
}

impl<T> Clone for Operator<T> {
    fn clone(&self) -> Self {
        match self {
            Operator::Map(f) => Operator::Map(f.clone()),
            Operator::Filter(f) => Operator::Filter(f.clone()),
            Operator::Each(f) => Operator::Each(f.clone()),
            Operator::TakeWhile(f) => Operator::TakeWhile(f.clone()),
            Operator::Until(f) => Operator::Until(f.clone()),
            Operator::Options(options) => Operator::Options(options.clone()),
        }
    }
}

/// Reusable description of a sequence of item-preserving operators
///
/// A chain is data: it can be registered as a plugin and applied to any
/// number of streams of `T`, each application spawning its own stages.
pub struct OperatorChain<T> {
    operators: Vec<Operator<T>>,
}

impl<T> Clone for OperatorChain<T> {
    fn clone(&self) -> Self {
        Self {
            operators: self.operators.clone(),
        }
    }
}

impl<T: Send + 'static> Default for OperatorChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> OperatorChain<T> {
    pub fn new() -> Self {
        Self {
            operators: Vec::new(),
        }
    }

    pub fn map<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, StreamError>> + Send + 'static,
    {
        self.operators
            .push(Operator::Map(Arc::new(move |item: T| f(item).boxed())));
        self
    }

    pub fn filter<F, Fut>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, StreamError>> + Send + 'static,
    {
        self.operators
            .push(Operator::Filter(Arc::new(move |item: &T| predicate(item).boxed())));
        self
    }

    pub fn each<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
    {
        self.operators
            .push(Operator::Each(Arc::new(move |item: &T| f(item).boxed())));
        self
    }

    pub fn take_while<F, Fut>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, StreamError>> + Send + 'static,
    {
        self.operators
            .push(Operator::TakeWhile(Arc::new(move |item: &T| predicate(item).boxed())));
        self
    }

    pub fn until<F, Fut>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, StreamError>> + Send + 'static,
    {
        self.operators
            .push(Operator::Until(Arc::new(move |item: &T| predicate(item).boxed())));
        self
    }

    /// Options set on the stream produced by the preceding operator
    pub fn with_options(mut self, options: StreamOptions) -> Self {
        self.operators.push(Operator::Options(options));
        self
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Attach every operator to `stream`, in order
    pub fn apply<V: Variant>(&self, stream: DataStream<T, V>) -> DataStream<T, V> {
        self.operators
            .iter()
            .fold(stream, |stream, operator| match operator {
                Operator::Map(f) => {
                    let f = f.clone();
                    stream.map(move |item| f(item))
                }
                Operator::Filter(p) => {
                    let p = p.clone();
                    stream.filter(move |item| p(item))
                }
                Operator::Each(f) => {
                    let f = f.clone();
                    stream.each(move |item| f(item))
                }
                Operator::TakeWhile(p) => {
                    let p = p.clone();
                    stream.take_while(move |item| p(item))
                }
                Operator::Until(p) => {
                    let p = p.clone();
                    stream.until(move |item| p(item))
                }
                Operator::Options(options) => {
                    if let Err(err) = stream.set_options(options.clone()) {
                        warn!(stream = stream.id(), %err, "Operator chain carries invalid options");
                        stream.core.fail(err);
                    }
                    stream
                }
            })
    }
}
