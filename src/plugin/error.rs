use std::path::PathBuf;
use thiserror::Error;

/// Plugin resolution and loading errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("Plugin not found: '{specifier}' (resolved to {})", resolved.display())]
    NotFound { specifier: String, resolved: PathBuf },

    #[error("Plugin '{0}' was registered for a different stream type")]
    TypeMismatch(String),

    #[error("Invalid plugin specifier: '{0}'")]
    InvalidSpecifier(String),
}
