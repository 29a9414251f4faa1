//! Prelude module for convenient imports
//!
//! Import everything you need with: `use datastream::prelude::*;`

// Stream types
pub use crate::stream::{
    BoxError, DataStream, ErrorKind, Plain, StreamError, StringStream, Text, Variant, module_dir,
};

// Channel types
pub use crate::channel::{Phase, Reader, Writable, Writer};

// Engine types
pub use crate::engine::Deferred;

// Options types
pub use crate::options::{OptionValue, Options, OptionsError, StreamOptions};

// Plugin types
pub use crate::plugin::{OperatorChain, Plugin, PluginError, PluginLoader, Registry};
