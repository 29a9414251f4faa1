use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use async_trait::async_trait;
use futures::future::{BoxFuture, poll_fn};
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, error, trace, warn};

use super::reader::Reader;
use crate::options::{Options, StreamOptions};
use crate::stream::StreamError;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) type DataListener<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub(crate) type EndListener = Box<dyn FnOnce() + Send>;
pub(crate) type ErrorListener = Arc<dyn Fn(&StreamError) + Send + Sync>;
pub(crate) type Handler =
    Arc<dyn Fn(StreamError) -> BoxFuture<'static, Result<(), StreamError>> + Send + Sync>;

/// Lifecycle state of a stream
#[derive(Debug, Clone)]
pub enum Phase {
    Created,
    Flowing,
    Ended,
    Errored(StreamError),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Ended | Phase::Errored(_))
    }
}

/// A downstream copy of every item written into a channel (tee branch)
#[async_trait]
pub(crate) trait Mirror<T>: Send + Sync {
    /// Non-blocking copy of one item
    fn push(&self, item: &T);

    fn end(&self);

    /// Offer an upstream error to the mirror's own catch chain
    async fn raise(&self, error: StreamError);

    /// Fail the mirror without consulting its catch chain
    fn fail(&self, error: StreamError);

    /// Ready once the mirror is below its high-water mark
    fn poll_capacity(&self, cx: &mut Context<'_>) -> Poll<()>;

    /// The mirror accepts nothing more and can be detached
    fn is_closed(&self) -> bool;
}

enum Marker {
    Open,
    Ended,
    Failed(StreamError),
}

struct ChannelState<T> {
    queue: VecDeque<T>,
    marker: Marker,
    error_delivered: bool,
    // Set when the queue reached the high-water mark, cleared at the low one
    draining: bool,
    // The local consumer is gone; writes only feed the mirrors
    detached: bool,
    reader: Option<Waker>,
    writers: Vec<Waker>,
    mirrors: Vec<Arc<dyn Mirror<T>>>,
}

impl<T> ChannelState<T> {
    /// Drop closed mirrors; true if a detached channel has no reader left at all
    fn prune_mirrors(&mut self) -> bool {
        self.mirrors.retain(|mirror| !mirror.is_closed());
        self.detached && self.mirrors.is_empty()
    }
}

struct Listeners<T> {
    data: Vec<DataListener<T>>,
    end: Vec<EndListener>,
    error: Vec<ErrorListener>,
}

/// Shared state behind every stream handle
///
/// Holds the ordered item queue with its end/error marker, the options
/// layer, the catch chain and the event listeners. All terminal transitions
/// go through [`Core::finish`], which notifies every observer exactly once.
pub(crate) struct Core<T> {
    id: u64,
    state: Mutex<ChannelState<T>>,
    options: Arc<Options>,
    phase: watch::Sender<Phase>,
    listeners: Mutex<Listeners<T>>,
    handlers: Mutex<Vec<Handler>>,
    reader_claimed: AtomicBool,
    handles: AtomicUsize,
    cancel: CancellationToken,
}

fn lock<S>(mutex: &Mutex<S>) -> MutexGuard<'_, S> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Send + 'static> Core<T> {
    pub(crate) fn new(options: StreamOptions) -> Arc<Self> {
        let id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
        trace!(stream = id, "Stream created");

        Arc::new(Self {
            id,
            state: Mutex::new(ChannelState {
                queue: VecDeque::new(),
                marker: Marker::Open,
                error_delivered: false,
                draining: false,
                detached: false,
                reader: None,
                writers: Vec::new(),
                mirrors: Vec::new(),
            }),
            options: Options::new(options),
            phase: watch::Sender::new(Phase::Created),
            listeners: Mutex::new(Listeners {
                data: Vec::new(),
                end: Vec::new(),
                error: Vec::new(),
            }),
            handlers: Mutex::new(Vec::new()),
            reader_claimed: AtomicBool::new(false),
            handles: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn options(&self) -> &Arc<Options> {
        &self.options
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase.borrow().clone()
    }

    pub(crate) fn buffered(&self) -> usize {
        lock(&self.state).queue.len()
    }

    /// Enqueue without suspending
    ///
    /// Returns whether the queue is still below the high-water mark, so a
    /// producer can decide to wait before writing more.
    pub(crate) fn write(&self, item: T) -> Result<bool, StreamError> {
        let high = self.options.high_water_mark();
        let mut state = lock(&self.state);

        match state.marker {
            Marker::Open => {}
            Marker::Ended => {
                drop(state);
                warn!(stream = self.id, "Write after end");
                self.fail(StreamError::WriteAfterEnd);
                return Err(StreamError::WriteAfterEnd);
            }
            Marker::Failed(_) => return Err(StreamError::WriteAfterEnd),
        }
        if self.cancel.is_cancelled() {
            return Err(StreamError::Closed);
        }
        if state.prune_mirrors() {
            drop(state);
            self.cancel_producers();
            return Err(StreamError::Closed);
        }

        for mirror in &state.mirrors {
            mirror.push(&item);
        }
        if state.detached {
            return Ok(true);
        }
        state.queue.push_back(item);
        let below = state.queue.len() < high;
        let reader = state.reader.take();
        drop(state);

        if let Some(waker) = reader {
            waker.wake();
        }
        Ok(below)
    }

    /// Enqueue a copy coming from an upstream tee; dropped once closed
    pub(crate) fn push_mirrored(&self, item: T) {
        let mut state = lock(&self.state);
        if !matches!(state.marker, Marker::Open) || self.cancel.is_cancelled() {
            return;
        }
        if state.prune_mirrors() {
            drop(state);
            self.cancel_producers();
            return;
        }
        for mirror in &state.mirrors {
            mirror.push(&item);
        }
        if state.detached {
            return;
        }
        state.queue.push_back(item);
        let reader = state.reader.take();
        drop(state);

        if let Some(waker) = reader {
            waker.wake();
        }
    }

    /// Ready when a producer may write without exceeding the high-water mark
    pub(crate) fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), StreamError>> {
        let high = self.options.high_water_mark();
        let mut state = lock(&self.state);

        match state.marker {
            Marker::Open => {}
            Marker::Ended => return Poll::Ready(Err(StreamError::WriteAfterEnd)),
            Marker::Failed(_) => return Poll::Ready(Err(StreamError::Closed)),
        }
        if self.cancel.is_cancelled() {
            return Poll::Ready(Err(StreamError::Closed));
        }
        if state.prune_mirrors() {
            drop(state);
            self.cancel_producers();
            return Poll::Ready(Err(StreamError::Closed));
        }

        if !state.detached && state.queue.len() >= high {
            state.draining = true;
        }
        if state.draining {
            if !state.writers.iter().any(|w| w.will_wake(cx.waker())) {
                state.writers.push(cx.waker().clone());
            }
            return Poll::Pending;
        }

        let mirrors = state.mirrors.clone();
        drop(state);

        for mirror in mirrors {
            if mirror.poll_capacity(cx).is_pending() {
                return Poll::Pending;
            }
        }
        Poll::Ready(Ok(()))
    }

    /// Enqueue, suspending first while the channel is above its high-water mark
    pub(crate) async fn send(&self, item: T) -> Result<(), StreamError> {
        poll_fn(|cx| self.poll_ready(cx)).await?;
        self.write(item).map(|_| ())
    }

    /// Mark that no more items follow; idempotent
    pub(crate) fn end(&self) {
        let mut state = lock(&self.state);
        if !matches!(state.marker, Marker::Open) {
            return;
        }
        state.marker = Marker::Ended;
        let reader = state.reader.take();
        let mirrors = state.mirrors.clone();
        let detached = state.detached;
        drop(state);

        debug!(stream = self.id, "Stream end marked");
        if let Some(waker) = reader {
            waker.wake();
        }
        for mirror in mirrors {
            mirror.end();
        }
        if detached {
            self.finish(Phase::Ended);
        }
    }

    /// Offer `error` to the catch chain; fail the stream if no handler recovers
    ///
    /// Returns `Ok(())` when a handler recovered, or the final error.
    pub(crate) async fn raise(&self, error: StreamError) -> Result<(), StreamError> {
        if self.phase.borrow().is_terminal() {
            return Err(error);
        }
        debug!(stream = self.id, %error, "Raising error");

        let handlers = lock(&self.handlers).clone();
        let mut error = error;
        for handler in handlers {
            match handler(error.clone()).await {
                Ok(()) => {
                    debug!(stream = self.id, "Error recovered by catch handler");
                    return Ok(());
                }
                Err(next) => error = next,
            }
        }

        if let Some(mirrors) = self.close_with(error.clone()) {
            for mirror in mirrors {
                mirror.raise(error.clone()).await;
            }
        }
        Err(error)
    }

    /// Fail the stream immediately, bypassing the catch chain
    pub(crate) fn fail(&self, error: StreamError) {
        if let Some(mirrors) = self.close_with(error.clone()) {
            for mirror in mirrors {
                mirror.fail(error.clone());
            }
        }
    }

    fn close_with(&self, error: StreamError) -> Option<Vec<Arc<dyn Mirror<T>>>> {
        if self.phase.borrow().is_terminal() {
            return None;
        }

        let mut state = lock(&self.state);
        if matches!(state.marker, Marker::Failed(_)) {
            return None;
        }
        state.marker = Marker::Failed(error.clone());
        let reader = state.reader.take();
        let writers = mem::take(&mut state.writers);
        let mirrors = mem::take(&mut state.mirrors);
        drop(state);

        if let Some(waker) = reader {
            waker.wake();
        }
        for waker in writers {
            waker.wake();
        }
        self.finish(Phase::Errored(error));
        Some(mirrors)
    }

    /// The single terminal transition
    fn finish(&self, outcome: Phase) {
        let transitioned = self.phase.send_if_modified(|phase| {
            if phase.is_terminal() {
                false
            } else {
                *phase = outcome.clone();
                true
            }
        });
        if !transitioned {
            return;
        }

        let mut listeners = lock(&self.listeners);
        let end = mem::take(&mut listeners.end);
        let on_error = listeners.error.clone();
        drop(listeners);

        match outcome {
            Phase::Ended => {
                debug!(stream = self.id, "Stream ended");
                for listener in end {
                    listener();
                }
            }
            Phase::Errored(err) => {
                let observed = !on_error.is_empty()
                    || self.phase.receiver_count() > 0
                    || self.reader_claimed.load(Ordering::Acquire);
                if !observed {
                    error!(stream = self.id, error = %err, "Unhandled stream error");
                }
                for listener in on_error {
                    listener(&err);
                }
            }
            Phase::Created | Phase::Flowing => {}
        }
    }

    /// Pop the next item for the single reader
    pub(crate) fn poll_read(&self, cx: &mut Context<'_>) -> Poll<Option<Result<T, StreamError>>> {
        let low = self.options.low_water_mark();
        let mut state = lock(&self.state);

        if let Some(item) = state.queue.pop_front() {
            let writers = if state.draining && state.queue.len() <= low {
                state.draining = false;
                mem::take(&mut state.writers)
            } else {
                Vec::new()
            };
            drop(state);

            for waker in writers {
                waker.wake();
            }
            self.phase.send_if_modified(|phase| {
                if matches!(phase, Phase::Created) {
                    *phase = Phase::Flowing;
                    true
                } else {
                    false
                }
            });

            let data = lock(&self.listeners).data.clone();
            for listener in data {
                listener(&item);
            }
            return Poll::Ready(Some(Ok(item)));
        }

        if matches!(state.marker, Marker::Ended) {
            drop(state);
            self.finish(Phase::Ended);
            return Poll::Ready(None);
        }
        if let Marker::Failed(err) = &state.marker {
            if state.error_delivered {
                return Poll::Ready(None);
            }
            // Buffered items went out first
            let err = err.clone();
            state.error_delivered = true;
            return Poll::Ready(Some(Err(err)));
        }

        state.reader = Some(cx.waker().clone());
        Poll::Pending
    }

    /// Take the single reader of this channel
    pub(crate) fn claim_reader(self: &Arc<Self>) -> Result<Reader<T>, StreamError> {
        self.reader_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StreamError::AlreadyConsumed)?;
        Ok(Reader::new(self.clone()))
    }

    pub(crate) fn is_claimed(&self) -> bool {
        self.reader_claimed.load(Ordering::Acquire)
    }

    /// Called when the reader goes away before a terminal state
    pub(crate) fn release_reader(&self) {
        self.consumer_gone();
    }

    pub(crate) fn acquire_handle(&self) {
        self.handles.fetch_add(1, Ordering::AcqRel);
    }

    /// A stream handle was dropped; without handles nobody can claim the reader
    pub(crate) fn release_handle(&self) {
        if self.handles.fetch_sub(1, Ordering::AcqRel) == 1 && !self.is_claimed() {
            trace!(stream = self.id, "Last handle dropped without a consumer");
            self.consumer_gone();
        }
    }

    /// Nothing reads this channel locally any more
    ///
    /// Live tee branches keep the producers going, with writes feeding the
    /// branches only. Without branches the producers are cancelled.
    fn consumer_gone(&self) {
        if self.phase.borrow().is_terminal() {
            return;
        }

        let mut state = lock(&self.state);
        state.mirrors.retain(|mirror| !mirror.is_closed());
        if state.mirrors.is_empty() {
            drop(state);
            self.cancel_producers();
            return;
        }

        state.detached = true;
        state.draining = false;
        state.queue.clear();
        let writers = mem::take(&mut state.writers);
        let ended = matches!(state.marker, Marker::Ended);
        drop(state);

        debug!(stream = self.id, "Consumer gone, feeding tee branches only");
        for waker in writers {
            waker.wake();
        }
        if ended {
            self.finish(Phase::Ended);
        }
    }

    fn cancel_producers(&self) {
        let writers = mem::take(&mut lock(&self.state).writers);

        debug!(stream = self.id, "Consumer gone, cancelling producers");
        self.cancel.cancel();
        for waker in writers {
            waker.wake();
        }
    }

    /// True once the channel accepts no more items
    pub(crate) fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || !matches!(lock(&self.state).marker, Marker::Open)
    }

    pub(crate) fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the terminal transition
    pub(crate) async fn terminated(&self) -> Result<(), StreamError> {
        let mut rx = self.phase.subscribe();
        let phase = rx
            .wait_for(Phase::is_terminal)
            .await
            .map_err(|_| StreamError::Closed)?;

        match &*phase {
            Phase::Errored(err) => Err(err.clone()),
            _ => Ok(()),
        }
    }

    /// Register a tee branch, seeding it with the current buffer and marker
    pub(crate) fn attach_mirror(&self, mirror: Arc<dyn Mirror<T>>) {
        let mut state = lock(&self.state);
        for item in &state.queue {
            mirror.push(item);
        }
        match &state.marker {
            Marker::Open => state.mirrors.push(mirror),
            Marker::Ended => mirror.end(),
            Marker::Failed(err) => mirror.fail(err.clone()),
        }
    }

    pub(crate) fn add_handler(&self, handler: Handler) {
        lock(&self.handlers).push(handler);
    }

    pub(crate) fn on_data(&self, listener: DataListener<T>) {
        lock(&self.listeners).data.push(listener);
    }

    /// Register an end listener; runs at once if the stream already ended
    pub(crate) fn on_end(&self, listener: EndListener) {
        let mut listeners = lock(&self.listeners);
        match self.phase() {
            Phase::Ended => {
                drop(listeners);
                listener();
            }
            Phase::Errored(_) => {}
            Phase::Created | Phase::Flowing => listeners.end.push(listener),
        }
    }

    /// Register an error listener; runs at once if the stream already failed
    pub(crate) fn on_error(&self, listener: ErrorListener) {
        let mut listeners = lock(&self.listeners);
        listeners.error.push(listener.clone());
        drop(listeners);

        if let Phase::Errored(err) = self.phase() {
            listener(&err);
        }
    }
}
