//! Error types for wire-format parsing.
//!
//! Every decode failure carries the expected and observed quantity so the
//! server can surface a useful diagnostic in its JSON error body. Nothing
//! here panics on untrusted input; all parsing is bounds-checked.

use thiserror::Error;

/// Convenience alias used throughout the codec.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding frame payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Full-frame body does not match the board's pixel count
    #[error("bad frame size: expected {expected} bytes, got {actual}")]
    BadFrameSize {
        /// `width * height * 3` for the active board
        expected: usize,
        /// Observed body length
        actual: usize,
    },

    /// Delta body too short to hold its own entry count
    #[error("delta truncated: need at least 2 bytes, got {actual}")]
    DeltaTruncated {
        /// Observed body length
        actual: usize,
    },

    /// Delta body length disagrees with the declared entry count
    #[error("bad delta length: {count} entries need {expected} bytes, got {actual}")]
    BadDeltaLength {
        /// Declared entry count
        count: u16,
        /// `2 + 5 * count`
        expected: usize,
        /// Observed body length
        actual: usize,
    },

    /// Declared entry count exceeds the board's pixel count
    #[error("delta count {count} exceeds panel pixel count {max}")]
    DeltaCountTooLarge {
        /// Declared entry count
        count: u16,
        /// Pixel count of the active board
        max: usize,
    },
}
