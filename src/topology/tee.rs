use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tracing::debug;

use crate::channel::{Core, Mirror};
use crate::stream::{DataStream, StreamError, Variant};

/// Tee branch fed by its upstream channel at write time
struct Branch<T: Send + 'static> {
    core: Arc<Core<T>>,
}

#[async_trait]
impl<T: Clone + Send + 'static> Mirror<T> for Branch<T> {
    fn push(&self, item: &T) {
        self.core.push_mirrored(item.clone());
    }

    fn end(&self) {
        self.core.end();
    }

    async fn raise(&self, error: StreamError) {
        // A recovering branch can still get nothing more from upstream
        if self.core.raise(error).await.is_ok() {
            self.core.end();
        }
    }

    fn fail(&self, error: StreamError) {
        self.core.fail(error);
    }

    fn poll_capacity(&self, cx: &mut Context<'_>) -> Poll<()> {
        // Only a branch that is being read pushes back; a closed one never does
        if !self.core.is_claimed() {
            return Poll::Ready(());
        }
        self.core.poll_ready(cx).map(|_| ())
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}

impl<T: Clone + Send + 'static, V: Variant> DataStream<T, V> {
    /// Hand a copy of this stream to `f` and keep going with the original
    ///
    /// The branch starts with everything currently buffered here and then
    /// receives every later item, the end and any unrecovered error. Once
    /// the branch has a consumer, writes into this stream suspend while the
    /// branch is above its high-water mark. A branch dropped without a
    /// consumer is detached. If this stream's own consumer stops early, the
    /// producers keep feeding the branch.
    ///
    /// # Example
    /// ```rust,ignore
    /// let numbers = DataStream::from_array(0..10).tee(|copy| {
    ///     tokio::spawn(copy.run());
    /// });
    /// ```
    pub fn tee<F>(self, f: F) -> Self
    where
        F: FnOnce(DataStream<T, V>),
    {
        let branch = self.derive::<T>();
        debug!(source = self.core.id(), branch = branch.core.id(), "Tee attached");

        self.core.attach_mirror(Arc::new(Branch {
            core: branch.core.clone(),
        }));
        f(branch);
        self
    }
}
