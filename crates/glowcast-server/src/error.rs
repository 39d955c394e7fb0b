//! Server runtime errors.

use thiserror::Error;

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket setup or I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An allow-list host did not resolve to any address
    #[error("cannot resolve allow-list host '{host}'")]
    Resolve {
        /// Host from the command line
        host: String,
    },

    /// Unknown board name on the command line
    #[error("unknown board '{name}'")]
    UnknownBoard {
        /// Requested board name
        name: String,
    },

    /// The render loop terminated abnormally
    #[error("render loop failed: {0}")]
    Render(String),
}
