use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("username must not be empty")]
    InvalidInput,
    #[error("origin is not allowed: {0}")]
    InvalidOrigin(String),
    #[error("no valid secret available")]
    NoSecretAvailable,
    #[error("invalid secret key")]
    InvalidKey,
    #[error("source returned no values")]
    EmptySource,
}
