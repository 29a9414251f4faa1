use std::sync::Arc;

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesOrdered;
use tracing::{debug, trace};

use crate::channel::{Core, Reader};
use crate::stream::StreamError;

/// Outcome of one operator invocation
pub(crate) enum Verdict<U> {
    /// Forward a value downstream
    Emit(U),
    /// Drop the item
    Skip,
    /// End the output here and stop reading upstream
    Stop,
}

pub(crate) type Invocation<U> = BoxFuture<'static, Result<Verdict<U>, StreamError>>;

/// Drive one operator between an upstream reader and a downstream channel
///
/// Up to `max_parallel` invocations (re-read from the output's options
/// before each admission) are in flight at once. Results leave in input
/// order: a finished invocation waits until every earlier one was flushed.
pub(crate) async fn run_stage<T, U, Op>(
    name: &'static str,
    mut reader: Reader<T>,
    out: Arc<Core<U>>,
    mut op: Op,
) where
    T: Send + 'static,
    U: Send + 'static,
    Op: FnMut(T) -> Invocation<U> + Send,
{
    let source = reader.core().id();
    debug!(stage = name, source, output = out.id(), "Stage started");

    let mut in_flight = FuturesOrdered::new();
    let mut upstream_done = false;
    let mut admitted: u64 = 0;

    loop {
        if upstream_done && in_flight.is_empty() {
            out.end();
            break;
        }
        let limit = out.options().max_parallel();

        tokio::select! {
            biased;

            _ = out.cancelled() => {
                debug!(stage = name, output = out.id(), "Output cancelled");
                break;
            }

            Some(result) = in_flight.next(), if !in_flight.is_empty() => match result {
                Ok(Verdict::Emit(value)) => {
                    if out.send(value).await.is_err() {
                        break;
                    }
                }
                Ok(Verdict::Skip) => {}
                Ok(Verdict::Stop) => {
                    debug!(stage = name, output = out.id(), "Stage terminated early");
                    out.end();
                    break;
                }
                Err(err) => {
                    // Recovered item errors drop the item and keep going
                    if out.raise(err).await.is_err() {
                        break;
                    }
                }
            },

            next = reader.next(), if !upstream_done && in_flight.len() < limit => match next {
                Some(Ok(item)) => {
                    trace!(stage = name, seq = admitted, "Item admitted");
                    admitted += 1;
                    in_flight.push_back(op(item));
                }
                Some(Err(err)) => {
                    if out.raise(err).await.is_ok() {
                        out.end();
                    }
                    break;
                }
                None => upstream_done = true,
            },
        }
    }

    debug!(stage = name, source, output = out.id(), admitted, "Stage finished");
}
