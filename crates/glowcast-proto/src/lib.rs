//! Wire formats for Glowcast frame delivery.
//!
//! A display frame travels in one of two encodings:
//!
//! - **Full frame**: exactly `width * height * 3` bytes of row-major RGB.
//! - **Delta frame**: a sparse overlay naming only the pixels that changed
//!   since the previously displayed frame.
//!
//! This crate is pure: decoding and encoding never touch I/O or shared
//! state, so every function here is trivially testable. All pixel bounds
//! derive from a [`Board`] descriptor rather than a hardcoded panel size.

pub mod board;
pub mod delta;
pub mod encoder;
pub mod errors;
pub mod frame;

pub use board::Board;
pub use delta::{DeltaEntry, DeltaUpdate};
pub use encoder::{EncodedFrame, EncoderPolicy, FrameEncoder};
pub use errors::{ProtocolError, Result};
pub use frame::validate_full_frame;
