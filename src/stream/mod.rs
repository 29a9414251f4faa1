pub mod data;
pub mod error;
pub mod string;

// Re-export commonly used types
pub use data::{DataStream, Plain, Variant, module_dir};
pub use error::{BoxError, ErrorKind, StreamError};
pub use string::{StringStream, Text};
