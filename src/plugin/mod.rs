pub mod chain;
pub mod error;
pub mod loader;
pub mod resolve;

// Re-export commonly used types
pub use chain::OperatorChain;
pub use error::PluginError;
pub use loader::{Plugin, PluginLoader, Registry, Transform};
pub use resolve::{normalize, resolve};
