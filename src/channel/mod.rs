pub mod inner;
pub mod reader;
pub mod writer;

// Re-export commonly used types
pub use inner::Phase;
pub(crate) use inner::{Core, Mirror};
pub use reader::Reader;
pub use writer::{Writable, Writer};
