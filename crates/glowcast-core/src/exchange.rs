//! Cross-context frame hand-off.
//!
//! A single-slot exchange between the network producer and the render
//! consumer. The producer merges a validated payload into the ready buffer
//! under the lock, marks the slot pending, and bumps the sequence; the
//! consumer checks `pending` with a plain atomic read, applies the ready
//! buffer (or only the recorded delta indices) under the lock, then clears
//! `pending`.
//!
//! # Invariants
//!
//! - At most one frame is pending at a time. A producer that observes
//!   `pending == true` gets [`SubmitError::Busy`] and the slot, including
//!   its sequence number, is untouched.
//! - The consumer never observes a partially written ready buffer: all
//!   merging happens inside the critical section.
//! - Critical sections are copy-only. No I/O, no script calls, nothing
//!   that can block while the lock is held.
//!
//! Under sustained overload producers drop frames rather than queueing —
//! the consumer drains within one render tick, so a rejected frame is
//! superseded by a fresher one almost immediately.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use glowcast_proto::{Board, DeltaUpdate, validate_full_frame};

use crate::error::SubmitError;

/// Ready-side slot contents. Guarded by the exchange mutex.
#[derive(Debug)]
struct ReadySlot {
    /// Last merged frame, `width * height * 3` bytes
    buffer: Vec<u8>,
    /// Changed pixel indices for the pending frame; empty means full frame
    delta: Vec<u16>,
}

/// Frame data captured by [`FrameExchange::consume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedFrame {
    /// Sequence number of the applied frame
    pub sequence: u64,
    /// Pixel indices touched by this frame
    pub touched: Vec<u16>,
}

/// Single-slot frame exchange between producer and consumer contexts.
#[derive(Debug)]
pub struct FrameExchange {
    board: Board,
    ready: Mutex<ReadySlot>,
    pending: AtomicBool,
    sequence: AtomicU64,
}

impl FrameExchange {
    /// Create an exchange sized for the given board.
    #[must_use]
    pub fn new(board: Board) -> Self {
        Self {
            board,
            ready: Mutex::new(ReadySlot { buffer: vec![0; board.frame_len()], delta: Vec::new() }),
            pending: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
        }
    }

    /// Board this exchange was sized for.
    #[must_use]
    pub fn board(&self) -> Board {
        self.board
    }

    /// Whether a frame is waiting for the consumer.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Sequence number of the most recently accepted frame.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Submit a full frame.
    ///
    /// The payload arrives in the caller's private buffer, which serves as
    /// the staging copy: the only work under the lock is one memcpy.
    ///
    /// # Errors
    ///
    /// - `SubmitError::Busy` if a frame is already pending
    /// - `SubmitError::Protocol` if the body length does not match the board
    pub fn submit_full(&self, body: &[u8]) -> Result<u64, SubmitError> {
        validate_full_frame(&self.board, body)?;
        if self.is_pending() {
            return Err(SubmitError::Busy);
        }

        let mut slot = self.lock_ready();
        // Re-check under the lock: two producers may both pass the fast
        // check, and the slot must never be overwritten while pending.
        if self.pending.load(Ordering::Relaxed) {
            return Err(SubmitError::Busy);
        }
        slot.buffer.copy_from_slice(body);
        slot.delta.clear();
        let seq = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        self.pending.store(true, Ordering::Release);
        Ok(seq)
    }

    /// Submit a decoded delta update.
    ///
    /// Entries are merged into the ready buffer and their indices recorded
    /// so the consumer can apply only the changed pixels.
    ///
    /// # Errors
    ///
    /// - `SubmitError::Busy` if a frame is already pending
    pub fn submit_delta(&self, update: &DeltaUpdate) -> Result<u64, SubmitError> {
        if self.is_pending() {
            return Err(SubmitError::Busy);
        }

        let mut slot = self.lock_ready();
        if self.pending.load(Ordering::Relaxed) {
            return Err(SubmitError::Busy);
        }
        slot.delta.clear();
        for entry in &update.entries {
            // INVARIANT: decode already dropped out-of-range indices
            let at = usize::from(entry.index) * 3;
            debug_assert!(at + 3 <= slot.buffer.len());
            if let Some(px) = slot.buffer.get_mut(at..at + 3) {
                px.copy_from_slice(&entry.rgb);
            }
        }
        slot.delta.extend(update.entries.iter().map(|entry| entry.index));
        let seq = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        self.pending.store(true, Ordering::Release);
        Ok(seq)
    }

    /// Apply the pending frame, if any, to a display target.
    ///
    /// `set_pixel` is called once per touched pixel with `(x, y, rgb)`.
    /// Returns `None` without taking the lock when nothing is pending.
    pub fn consume<F>(&self, mut set_pixel: F) -> Option<ConsumedFrame>
    where
        F: FnMut(u16, u16, [u8; 3]),
    {
        if !self.is_pending() {
            return None;
        }

        let touched;
        {
            let slot = self.lock_ready();
            let width = self.board.width;
            if slot.delta.is_empty() {
                for (index, px) in slot.buffer.chunks_exact(3).enumerate() {
                    let index = index as u16;
                    set_pixel(index % width, index / width, [px[0], px[1], px[2]]);
                }
                touched = (0..self.board.pixel_count() as u16).collect();
            } else {
                for &index in &slot.delta {
                    let at = usize::from(index) * 3;
                    if let Some(px) = slot.buffer.get(at..at + 3) {
                        set_pixel(index % width, index / width, [px[0], px[1], px[2]]);
                    }
                }
                touched = slot.delta.clone();
            }
        }
        self.pending.store(false, Ordering::Release);

        Some(ConsumedFrame { sequence: self.sequence(), touched })
    }

    fn lock_ready(&self) -> std::sync::MutexGuard<'_, ReadySlot> {
        // A poisoned lock means a panic inside a copy-only section, which
        // cannot leave the buffer in a state worth preserving.
        match self.ready.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
