//! Cache error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("operation error: {0}")]
    Operation(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
            CacheError::Connection(e.to_string())
        } else {
            CacheError::Operation(e.to_string())
        }
    }
}
