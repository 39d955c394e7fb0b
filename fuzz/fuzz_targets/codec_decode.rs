//! Fuzz target for the wire codec
//!
//! # Strategy
//!
//! - Arbitrary bytes through full-frame validation and delta decoding
//! - Board chosen from the known panels so bounds vary between runs
//!
//! # Invariants
//!
//! - Decoding never panics and never over-allocates from claimed counts
//! - Every accepted delta satisfies its own framing equation

#![no_main]

use arbitrary::Arbitrary;
use glowcast_proto::{Board, DeltaUpdate, validate_full_frame};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    board: u8,
    body: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let board = match input.board % 4 {
        0 => Board::COSMIC,
        1 => Board::GALACTIC,
        2 => Board::HD,
        _ => Board::PACK,
    };

    let _ = validate_full_frame(&board, &input.body);

    if let Ok(update) = DeltaUpdate::decode(&board, &input.body) {
        // Framing equation holds for everything that decodes
        assert_eq!(
            input.body.len(),
            2 + (update.entries.len() + usize::from(update.dropped)) * 5
        );
        for entry in &update.entries {
            assert!(usize::from(entry.index) < board.pixel_count());
        }
    }
});
