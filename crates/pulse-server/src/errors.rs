//! Status server errors.

use thiserror::Error;

/// Failure to start the status server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Any other socket error.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}
