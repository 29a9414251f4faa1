pub mod error;
pub mod resolver;
pub mod value;

// Re-export commonly used types
pub use error::OptionsError;
pub use resolver::Options;
pub use value::{
    DEFAULT_HIGH_WATER_MARK, DEFAULT_LOW_WATER_MARK, DEFAULT_MAX_PARALLEL, HIGH_WATER_MARK,
    LOW_WATER_MARK, MAX_PARALLEL, OptionValue, StreamOptions,
};
