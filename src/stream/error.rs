use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

use crate::options::OptionsError;
use crate::plugin::PluginError;

/// Shared, clonable error cause
pub type BoxError = Arc<dyn StdError + Send + Sync>;

/// Broad classification of a [`StreamError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A user callback failed for a specific item
    Item,
    /// An upstream iterator or external source failed
    Source,
    /// Invalid option value or plugin resolution failure
    Config,
    /// Misuse of the stream contract (write after end, second consumer, ...)
    Protocol,
}

/// Top-level stream error unifying all layer errors
///
/// Errors are clonable so a single failure can be delivered to every
/// observer of a stream (event listeners, pending futures, tee branches and
/// piped destinations) without losing its identity.
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    #[error("Operator callback failed: {0}")]
    Item(BoxError),

    #[error("Source failed: {0}")]
    Source(BoxError),

    #[error("Options error: {0}")]
    Options(#[from] OptionsError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Write after end")]
    WriteAfterEnd,

    #[error("Stream already has a consumer")]
    AlreadyConsumed,

    #[error("Stream closed")]
    Closed,

    #[error("Task aborted: {0}")]
    Aborted(String),
}

impl StreamError {
    /// Wrap a callback failure
    pub fn item<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        StreamError::Item(Arc::from(err.into()))
    }

    /// Wrap a source failure; a `StreamError` is passed through unchanged
    pub fn source<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        match err.into().downcast::<StreamError>() {
            Ok(err) => *err,
            Err(other) => StreamError::Source(Arc::from(other)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::Item(_) => ErrorKind::Item,
            StreamError::Source(_) => ErrorKind::Source,
            StreamError::Options(_) | StreamError::Plugin(_) => ErrorKind::Config,
            StreamError::WriteAfterEnd
            | StreamError::AlreadyConsumed
            | StreamError::Closed
            | StreamError::Aborted(_) => ErrorKind::Protocol,
        }
    }

    /// True when both errors carry the very same cause
    pub fn ptr_eq(&self, other: &StreamError) -> bool {
        match (self, other) {
            (StreamError::Item(a), StreamError::Item(b))
            | (StreamError::Source(a), StreamError::Source(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<tokio::task::JoinError> for StreamError {
    fn from(err: tokio::task::JoinError) -> Self {
        StreamError::Aborted(err.to_string())
    }
}
