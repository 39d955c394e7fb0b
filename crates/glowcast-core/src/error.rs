//! Error types for the Glowcast core.
//!
//! The taxonomy follows the failure surfaces, not the modules: transport
//! errors never reach this crate (the driver closes the connection),
//! protocol errors come from `glowcast-proto`, and the types here cover
//! HTTP framing, frame submission, and script execution.
//! `SubmitError::Busy` is soft and maps to a 200 with a busy body so
//! producers simply retry; validation and script failures map to 400
//! responses carrying the message.

use thiserror::Error;

/// Errors raised while framing an HTTP request from the byte stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// Request line could not be parsed into method and target
    #[error("malformed request line")]
    BadRequestLine,

    /// Receive buffer exceeded the per-connection cap
    #[error("request exceeds {max} byte limit")]
    RequestTooLarge {
        /// Per-connection receive cap
        max: usize,
    },
}

/// Errors raised when submitting a frame into the exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// A frame is already pending; the producer must drop this one
    #[error("previous frame not yet consumed")]
    Busy,

    /// The payload failed wire-format validation
    #[error(transparent)]
    Protocol(#[from] glowcast_proto::ProtocolError),
}

/// Errors raised by the script engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// No program is currently loaded
    #[error("no script loaded")]
    NotLoaded,

    /// Source failed to parse
    #[error("parse error: {0}")]
    Parse(String),

    /// Chunk executed but raised while defining the program
    #[error("load error: {0}")]
    Load(String),

    /// Source defines neither entry point
    #[error("no 'shader' or 'render_frame' function defined")]
    NoEntryPoint,

    /// A render call raised
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A render call exceeded the wall-clock budget
    #[error("render took {elapsed_ms} ms, budget is {budget_ms} ms")]
    BudgetExceeded {
        /// Measured wall-clock duration
        elapsed_ms: u64,
        /// Configured budget
        budget_ms: u64,
    },

    /// Requested built-in index does not exist
    #[error("no built-in script at index {0}")]
    UnknownBuiltin(usize),
}
