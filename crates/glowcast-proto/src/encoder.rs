//! Producer-side frame encoding policy.
//!
//! Capture clients do not send every frame verbatim. The encoder compares a
//! CRC32 of the new frame against the previous one and skips identical
//! frames entirely; otherwise it computes the changed-pixel set and chooses
//! between a delta and a full frame.
//!
//! One deliberate quirk is preserved from the reference clients: changed
//! counts of 1 to `min_delta_pixels` (default 5) are skipped rather than
//! sent as a tiny delta, on the theory that they are capture noise. The
//! policy is configurable so a client that wants pixel-perfect output can
//! set `min_delta_pixels = 0`.

use bytes::Bytes;

use crate::{
    Board,
    delta::{DeltaEntry, DeltaUpdate},
};

/// Tunable knobs for [`FrameEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderPolicy {
    /// Changed-pixel count above which a full frame is cheaper to send.
    ///
    /// The wire break-even for a 32×32 panel is ~614 pixels, but measured
    /// apply cost on the device favors full frames much earlier.
    pub delta_threshold: usize,
    /// Changed counts in `1..=min_delta_pixels` are skipped entirely.
    pub min_delta_pixels: usize,
}

impl Default for EncoderPolicy {
    fn default() -> Self {
        Self { delta_threshold: 150, min_delta_pixels: 5 }
    }
}

/// Encoding decision for one captured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedFrame {
    /// Nothing worth sending (identical or below the noise floor)
    Skip,
    /// Sparse update body for the delta route
    Delta(Bytes),
    /// Full RGB body for the frame route
    Full(Bytes),
}

/// Stateful encoder tracking the previously sent frame.
///
/// # Invariants
///
/// - `prev`, when set, is always exactly `board.frame_len()` bytes.
/// - `prev` only advances on `Delta`/`Full` decisions, so a skipped frame
///   is still diffed against the last frame actually sent.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    board: Board,
    policy: EncoderPolicy,
    prev: Option<Vec<u8>>,
    prev_crc: u32,
}

impl FrameEncoder {
    /// Create an encoder for the given board.
    #[must_use]
    pub fn new(board: Board, policy: EncoderPolicy) -> Self {
        Self { board, policy, prev: None, prev_crc: 0 }
    }

    /// Decide how to send one captured frame.
    ///
    /// Frames whose length does not match the board are passed through as
    /// `Full` so the server rejects them with a proper diagnostic instead
    /// of the encoder guessing.
    pub fn encode(&mut self, frame: &[u8]) -> EncodedFrame {
        if frame.len() != self.board.frame_len() {
            return EncodedFrame::Full(Bytes::copy_from_slice(frame));
        }

        let crc = crc32fast::hash(frame);

        let Some(prev) = &self.prev else {
            self.remember(frame, crc);
            return EncodedFrame::Full(Bytes::copy_from_slice(frame));
        };

        if crc == self.prev_crc {
            return EncodedFrame::Skip;
        }

        let mut changed = Vec::new();
        for (index, (new, old)) in frame.chunks_exact(3).zip(prev.chunks_exact(3)).enumerate() {
            if new != old {
                changed.push(DeltaEntry {
                    index: index as u16,
                    rgb: [new[0], new[1], new[2]],
                });
                if changed.len() > self.policy.delta_threshold {
                    self.remember(frame, crc);
                    return EncodedFrame::Full(Bytes::copy_from_slice(frame));
                }
            }
        }

        // CRC said the frames differ, so an empty changed set means a CRC
        // collision; resend in full rather than silently skipping.
        if changed.is_empty() {
            self.remember(frame, crc);
            return EncodedFrame::Full(Bytes::copy_from_slice(frame));
        }

        if changed.len() <= self.policy.min_delta_pixels {
            return EncodedFrame::Skip;
        }

        let mut body = Vec::with_capacity(DeltaUpdate::wire_len(changed.len()));
        DeltaUpdate::encode(&changed, &mut body);
        self.remember(frame, crc);
        EncodedFrame::Delta(Bytes::from(body))
    }

    /// Forget the previous frame, forcing the next encode to be `Full`.
    pub fn reset(&mut self) {
        self.prev = None;
        self.prev_crc = 0;
    }

    fn remember(&mut self, frame: &[u8], crc: u32) {
        match &mut self.prev {
            Some(prev) => prev.copy_from_slice(frame),
            None => self.prev = Some(frame.to_vec()),
        }
        self.prev_crc = crc;
    }
}
