//! Ordered asynchronous data streams with chainable operators
//!
//! A [`DataStream`] is a handle to a backpressured channel of items. Operators
//! (`map`, `filter`, `take_while`, ...) consume a stream and return a derived
//! one, each driven by its own tokio task; terminal operations (`to_array`,
//! `reduce`, `run`, `when_end`) return a [`Deferred`] future.
//!
//! ```rust,ignore
//! use datastream::prelude::*;
//!
//! let evens = DataStream::from_array(0..10)
//!     .filter(|n| futures::future::ready(Ok(n % 2 == 0)))
//!     .map(|n| async move { Ok(n * 10) })
//!     .to_array()
//!     .await?;
//! ```

pub mod channel;
pub mod engine;
pub mod options;
pub mod plugin;
pub mod prelude;
pub mod source;
pub mod stream;
pub mod topology;

pub use engine::Deferred;
pub use stream::{DataStream, StreamError, StringStream};
