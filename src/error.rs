use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid {what} shape: expected {expected:?}, got {actual:?}")]
    InvalidShape {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config Error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid skeleton topology: {0}")]
    InvalidTopology(String),
}
