pub mod deferred;
pub mod operators;
pub(crate) mod stage;
pub mod terminal;

// Re-export commonly used types
pub use deferred::Deferred;
