use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tracing::debug;

use super::error::StreamError;
use crate::channel::{Core, Phase, Reader, Writer};
use crate::options::{OptionValue, Options, StreamOptions};

/// A stream "kind" and its virtual constructor
///
/// Every stream derived from another one (operator outputs, tee branches,
/// adapted sources) is built through the variant of its origin, so methods
/// implemented for `DataStream<_, MyVariant>` stay available along the whole
/// chain.
pub trait Variant: Clone + Send + Sync + 'static {
    /// Directory that relative plugin specifiers resolve against
    fn origin(&self) -> &Path;

    /// Variant value for a stream derived from this one
    fn derive(&self) -> Self {
        self.clone()
    }
}

/// The default variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Plain;

impl Variant for Plain {
    fn origin(&self) -> &Path {
        module_dir(file!())
    }
}

/// Directory part of a `file!()` path
pub fn module_dir(file: &'static str) -> &'static Path {
    Path::new(file).parent().unwrap_or(Path::new(""))
}

/// Handle to an ordered asynchronous stream of `T`
///
/// Handles are cheap to clone and all clones address the same stream. A
/// stream has exactly one consumer: the first operator, pipe or terminal
/// accessor attached to it. The write side (`write`, `send`, `end`,
/// `raise`) stays usable from any handle. Dropping the last handle before a
/// consumer was attached counts as the consumer going away.
pub struct DataStream<T: Send + 'static, V: Variant = Plain> {
    pub(crate) core: Arc<Core<T>>,
    pub(crate) variant: V,
}

impl<T: Send + 'static, V: Variant> Clone for DataStream<T, V> {
    fn clone(&self) -> Self {
        Self::from_parts(self.core.clone(), self.variant.clone())
    }
}

impl<T: Send + 'static, V: Variant> Drop for DataStream<T, V> {
    fn drop(&mut self) {
        self.core.release_handle();
    }
}

impl<T: Send + 'static, V: Variant> fmt::Debug for DataStream<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStream")
            .field("id", &self.core.id())
            .field("phase", &self.core.phase())
            .field("buffered", &self.core.buffered())
            .finish()
    }
}

impl<T: Send + 'static> DataStream<T> {
    /// Create an empty stream with default options
    pub fn new() -> Self {
        Self::from_parts(Core::new(StreamOptions::new()), Plain)
    }

    /// Create an empty stream with the given options
    pub fn with_options(options: StreamOptions) -> Result<Self, StreamError> {
        Self::with_variant(Plain, options)
    }
}

impl<T: Send + 'static, V: Variant + Default> Default for DataStream<T, V> {
    fn default() -> Self {
        Self::from_parts(Core::new(StreamOptions::new()), V::default())
    }
}

impl<T: Send + 'static, V: Variant> DataStream<T, V> {
    /// Create an empty stream of an explicit variant value
    pub fn with_variant(variant: V, options: StreamOptions) -> Result<Self, StreamError> {
        options.validate()?;
        Ok(Self::from_parts(Core::new(options), variant))
    }

    pub(crate) fn from_parts(core: Arc<Core<T>>, variant: V) -> Self {
        core.acquire_handle();
        Self { core, variant }
    }

    /// New empty stream of the same variant, inheriting options from this one
    pub fn derive<U: Send + 'static>(&self) -> DataStream<U, V> {
        let core = Core::new(StreamOptions::new());
        core.options().set_referrer(self.core.options());
        DataStream::from_parts(core, self.variant.derive())
    }

    pub fn variant(&self) -> &V {
        &self.variant
    }

    pub fn id(&self) -> u64 {
        self.core.id()
    }

    pub fn phase(&self) -> Phase {
        self.core.phase()
    }

    /// Number of items waiting to be consumed
    pub fn buffered(&self) -> usize {
        self.core.buffered()
    }

    /// True if both handles address the same stream
    pub fn same_stream<U: Send + 'static, W: Variant>(&self, other: &DataStream<U, W>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.core), Arc::as_ptr(&other.core))
    }

    /// This stream's options layer
    pub fn options(&self) -> &Arc<Options> {
        self.core.options()
    }

    /// Effective value of an option key
    pub fn option(&self, key: &str) -> Option<OptionValue> {
        self.core.options().get(key)
    }

    /// Overlay own option values; invalid values are rejected as a whole
    pub fn set_options(&self, options: StreamOptions) -> Result<(), StreamError> {
        self.core.options().set(options)?;
        Ok(())
    }

    /// Enqueue an item without suspending
    ///
    /// Returns `Ok(false)` once the buffer reached its high-water mark; the
    /// item is still accepted. Fails after `end` or an unrecovered error.
    pub fn write(&self, item: T) -> Result<bool, StreamError> {
        self.core.write(item)
    }

    /// Enqueue an item, suspending while the buffer is above its high-water mark
    pub async fn send(&self, item: T) -> Result<(), StreamError> {
        self.core.send(item).await
    }

    /// Mark the end of the stream
    pub fn end(&self) {
        self.core.end();
    }

    /// Write a last item, then end the stream
    pub fn end_with(&self, item: T) -> Result<(), StreamError> {
        self.core.write(item)?;
        self.core.end();
        Ok(())
    }

    /// Raise an error on this stream
    ///
    /// The error is offered to the `catch` chain first. `Ok(())` means a
    /// handler recovered; otherwise the stream fails and the final error is
    /// returned after every observer has been notified.
    pub async fn raise(&self, error: StreamError) -> Result<(), StreamError> {
        self.core.raise(error).await
    }

    /// Call `f` for every item as it is consumed
    pub fn on_data<F>(self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.core.on_data(Arc::new(f));
        self
    }

    /// Call `f` once when the consumer reached the end
    pub fn on_end<F>(self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.core.on_end(Box::new(f));
        self
    }

    /// Call `f` when the stream fails with an unrecovered error
    pub fn on_error<F>(self, f: F) -> Self
    where
        F: Fn(&StreamError) + Send + Sync + 'static,
    {
        self.core.on_error(Arc::new(f));
        self
    }

    /// Take the single consuming end as a `futures::Stream`
    pub fn into_stream(self) -> Result<Reader<T>, StreamError> {
        self.core.claim_reader()
    }

    /// `futures::Sink` view of the writable end
    pub fn writer(&self) -> Writer<T> {
        Writer::new(self.core.clone())
    }

    /// Start consuming if nothing consumes the stream yet
    ///
    /// Items are discarded after `on_data` listeners saw them. Does nothing
    /// when a consumer is already attached.
    pub fn resume(&self) {
        if self.core.is_claimed() {
            return;
        }
        if let Ok(reader) = self.core.claim_reader() {
            debug!(stream = self.core.id(), "Resuming stream without consumer");
            tokio::spawn(drain(reader));
        }
    }
}

/// Read a stream to its end, discarding items
pub(crate) async fn drain<T: Send + 'static>(mut reader: Reader<T>) -> Result<(), StreamError> {
    while let Some(next) = reader.next().await {
        next?;
    }
    Ok(())
}
