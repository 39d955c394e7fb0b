//! Delta-frame payload codec.
//!
//! Wire layout, little-endian:
//!
//! ```text
//! [count: u16] + count * [index: u16, r: u8, g: u8, b: u8]
//! ```
//!
//! The body length must equal `2 + 5 * count` exactly, and `count` may not
//! exceed the board's pixel count. Entries whose index falls outside the
//! panel are dropped during decode without failing the whole update — a
//! stale client aimed at a smaller board degrades instead of erroring.

use bytes::BufMut;

use crate::{
    Board,
    errors::{ProtocolError, Result},
};

/// Bytes occupied by one delta entry on the wire.
pub const ENTRY_WIRE_LEN: usize = 5;

/// One changed pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaEntry {
    /// Row-major pixel index, `y * width + x`
    pub index: u16,
    /// New color value
    pub rgb: [u8; 3],
}

/// A decoded sparse update.
///
/// # Invariants
///
/// - Every entry index is in range for the board the update was decoded
///   against ([`DeltaUpdate::decode`] drops out-of-range entries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaUpdate {
    /// In-range changed pixels, in wire order
    pub entries: Vec<DeltaEntry>,
    /// Entries discarded because their index was out of range
    pub dropped: u16,
}

impl DeltaUpdate {
    /// Decode a delta body against the active board.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::DeltaTruncated` if the body cannot hold the count
    /// - `ProtocolError::DeltaCountTooLarge` if `count` exceeds the panel
    /// - `ProtocolError::BadDeltaLength` if the length is not `2 + 5*count`
    pub fn decode(board: &Board, body: &[u8]) -> Result<Self> {
        let Some(count_bytes) = body.get(0..2) else {
            return Err(ProtocolError::DeltaTruncated { actual: body.len() });
        };
        let count = u16::from_le_bytes([count_bytes[0], count_bytes[1]]);

        let max = board.pixel_count();
        if usize::from(count) > max {
            return Err(ProtocolError::DeltaCountTooLarge { count, max });
        }

        let expected = 2 + usize::from(count) * ENTRY_WIRE_LEN;
        if body.len() != expected {
            return Err(ProtocolError::BadDeltaLength { count, expected, actual: body.len() });
        }

        let mut entries = Vec::with_capacity(usize::from(count));
        let mut dropped = 0u16;
        for chunk in body[2..].chunks_exact(ENTRY_WIRE_LEN) {
            let index = u16::from_le_bytes([chunk[0], chunk[1]]);
            if usize::from(index) < max {
                entries.push(DeltaEntry { index, rgb: [chunk[2], chunk[3], chunk[4]] });
            } else {
                dropped += 1;
            }
        }

        debug_assert_eq!(entries.len() + usize::from(dropped), usize::from(count));

        Ok(Self { entries, dropped })
    }

    /// Encode entries into the wire layout.
    ///
    /// The caller is responsible for keeping `entries.len()` within the
    /// target board's pixel count; [`FrameEncoder`](crate::FrameEncoder)
    /// does so by construction.
    pub fn encode(entries: &[DeltaEntry], dst: &mut impl BufMut) {
        debug_assert!(entries.len() <= usize::from(u16::MAX));

        dst.put_u16_le(entries.len() as u16);
        for entry in entries {
            dst.put_u16_le(entry.index);
            dst.put_slice(&entry.rgb);
        }
    }

    /// Wire length of an update with `count` entries.
    #[must_use]
    pub fn wire_len(count: usize) -> usize {
        2 + count * ENTRY_WIRE_LEN
    }
}
