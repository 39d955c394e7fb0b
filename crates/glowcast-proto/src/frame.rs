//! Full-frame payload validation.

use crate::{
    Board,
    errors::{ProtocolError, Result},
};

/// Validate a full-frame body against the active board.
///
/// A full frame is exactly `width * height * 3` bytes of row-major RGB.
/// Short and oversized bodies are both rejected so a misconfigured client
/// (wrong board) fails loudly instead of displaying garbage.
///
/// # Errors
///
/// - `ProtocolError::BadFrameSize` if the length does not match
pub fn validate_full_frame(board: &Board, body: &[u8]) -> Result<()> {
    let expected = board.frame_len();
    if body.len() != expected {
        return Err(ProtocolError::BadFrameSize { expected, actual: body.len() });
    }
    Ok(())
}
