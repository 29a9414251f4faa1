use std::convert::Infallible;
use std::error::Error as StdError;
use std::pin::pin;

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::channel::Core;
use crate::options::StreamOptions;
use crate::stream::{DataStream, Plain, StreamError, Variant};

impl<T: Send + 'static> DataStream<T> {
    /// Stream over a finite collection; written and ended synchronously
    pub fn from_array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::from_array_in(Plain, items)
    }

    /// Stream pulling lazily from an iterator on a spawned task
    ///
    /// One value is pulled per free buffer slot, so an infinite iterator is
    /// fine as long as something downstream stops reading. Must be called
    /// from within a tokio runtime.
    pub fn from_iterator<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::from_iterator_in(Plain, iter)
    }

    /// Like [`from_iterator`](Self::from_iterator) for fallible items
    ///
    /// An `Err` item is raised as a source error; if the catch chain
    /// recovers it, pulling continues with the next item.
    pub fn try_from_iterator<I, E>(iter: I) -> Self
    where
        I: IntoIterator<Item = Result<T, E>>,
        I::IntoIter: Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + Send + 'static,
    {
        Self::try_from_iterator_in(Plain, iter)
    }

    /// Adapt any `futures::Stream` of results
    pub fn from_stream<S, E>(source: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + Send + 'static,
    {
        Self::from_stream_in(Plain, source)
    }
}

impl<T: Send + 'static, V: Variant> DataStream<T, V> {
    fn source_of(variant: V) -> Self {
        Self::from_parts(Core::new(StreamOptions::new()), variant)
    }

    pub fn from_array_in<I>(variant: V, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let stream = Self::source_of(variant);
        for item in items {
            if stream.core.write(item).is_err() {
                break;
            }
        }
        stream.core.end();
        stream
    }

    pub fn from_iterator_in<I>(variant: V, iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::try_from_iterator_in(variant, iter.into_iter().map(Ok::<T, Infallible>))
    }

    pub fn try_from_iterator_in<I, E>(variant: V, iter: I) -> Self
    where
        I: IntoIterator<Item = Result<T, E>>,
        I::IntoIter: Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + Send + 'static,
    {
        let stream = Self::source_of(variant);
        let core = stream.core.clone();
        let mut iter = iter.into_iter();

        tokio::spawn(async move {
            let mut pulled: u64 = 0;
            loop {
                if core.is_cancelled() {
                    debug!(stream = core.id(), pulled, "Iterator source cancelled");
                    return;
                }
                let Some(next) = iter.next() else { break };
                pulled += 1;

                let delivered = match next {
                    Ok(item) => core.send(item).await,
                    Err(err) => core.raise(StreamError::source(err)).await,
                };
                if delivered.is_err() {
                    return;
                }
            }

            debug!(stream = core.id(), pulled, "Iterator source exhausted");
            core.end();
        });
        stream
    }

    pub fn from_stream_in<S, E>(variant: V, source: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + Send + 'static,
    {
        let stream = Self::source_of(variant);
        let core = stream.core.clone();

        tokio::spawn(async move {
            let mut source = pin!(source);
            loop {
                let next = tokio::select! {
                    biased;
                    _ = core.cancelled() => {
                        debug!(stream = core.id(), "Stream source cancelled");
                        return;
                    }
                    next = source.next() => next,
                };

                let delivered = match next {
                    Some(Ok(item)) => core.send(item).await,
                    Some(Err(err)) => core.raise(StreamError::source(err)).await,
                    None => break,
                };
                if delivered.is_err() {
                    return;
                }
            }
            core.end();
        });
        stream
    }
}

impl<T: Send + 'static, V: Variant + Default> FromIterator<T> for DataStream<T, V> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_array_in(V::default(), iter)
    }
}
