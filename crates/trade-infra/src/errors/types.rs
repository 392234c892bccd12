use thiserror::Error;

/// Crate-wide error type for the infrastructure layer: configuration
/// loading, logging setup, and anything that needs a contextualized
/// message on the way out of a binary's `main`.
#[derive(Debug, Error, Clone)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, Error>;
