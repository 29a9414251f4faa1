use thiserror::Error;

/// Option validation and loading errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptionsError {
    #[error("Invalid value for option '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Malformed options document: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for OptionsError {
    fn from(err: serde_json::Error) -> Self {
        OptionsError::Malformed(err.to_string())
    }
}
