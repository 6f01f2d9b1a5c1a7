//! Engine error type
//!
//! Byte-stream problems never surface here; they are counted in
//! [`crate::Diagnostics`]. These errors cover the API boundary only.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("session index {0} out of range")]
    InvalidSession(usize),

    #[error("config error in '{field}': {message}")]
    Config { field: String, message: String },

    #[error("failed to parse config file: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn config(field: &str, message: impl Into<String>) -> Self {
        Error::Config {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = Error::config("rows", "must be at least 1");
        assert_eq!(err.to_string(), "config error in 'rows': must be at least 1");
    }

    #[test]
    fn test_invalid_session_display() {
        assert_eq!(Error::InvalidSession(7).to_string(), "session index 7 out of range");
    }
}
