//! Property-based tests for the frame codecs.
//!
//! The decoder must never panic on arbitrary input, and encode/decode must
//! round-trip for every in-range update.

use glowcast_proto::{Board, DeltaEntry, DeltaUpdate, EncodedFrame, EncoderPolicy, FrameEncoder};
use proptest::prelude::*;

fn arb_entry(board: Board) -> impl Strategy<Value = DeltaEntry> {
    (0..board.pixel_count() as u16, any::<[u8; 3]>())
        .prop_map(|(index, rgb)| DeltaEntry { index, rgb })
}

proptest! {
    #[test]
    fn delta_round_trip(entries in prop::collection::vec(arb_entry(Board::COSMIC), 0..64)) {
        let mut body = Vec::new();
        DeltaUpdate::encode(&entries, &mut body);

        let decoded = DeltaUpdate::decode(&Board::COSMIC, &body).expect("should decode");
        prop_assert_eq!(decoded.entries, entries);
        prop_assert_eq!(decoded.dropped, 0);
    }

    #[test]
    fn delta_decode_never_panics(body in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = DeltaUpdate::decode(&Board::COSMIC, &body);
        let _ = DeltaUpdate::decode(&Board::PACK, &body);
    }

    #[test]
    fn encoder_output_always_decodes(
        frames in prop::collection::vec(
            prop::collection::vec(any::<u8>(), Board::PACK.frame_len()),
            1..8,
        ),
    ) {
        let mut enc = FrameEncoder::new(Board::PACK, EncoderPolicy::default());
        for frame in &frames {
            match enc.encode(frame) {
                EncodedFrame::Skip => {},
                EncodedFrame::Full(body) => prop_assert_eq!(body.len(), frame.len()),
                EncodedFrame::Delta(body) => {
                    let update = DeltaUpdate::decode(&Board::PACK, &body).expect("should decode");
                    prop_assert_eq!(update.dropped, 0);
                    prop_assert!(!update.entries.is_empty());
                },
            }
        }
    }
}

#[test]
fn full_then_delta_reconstructs_frame() {
    let board = Board::PACK;
    let mut enc = FrameEncoder::new(board, EncoderPolicy { min_delta_pixels: 0, delta_threshold: 150 });

    let mut display = vec![0u8; board.frame_len()];

    let first = vec![10u8; board.frame_len()];
    let EncodedFrame::Full(body) = enc.encode(&first) else {
        panic!("first frame must be full");
    };
    display.copy_from_slice(&body);

    let mut second = first.clone();
    second[0..3].copy_from_slice(&[200, 100, 50]);
    let EncodedFrame::Delta(body) = enc.encode(&second) else {
        panic!("single-pixel change must be a delta");
    };
    for entry in DeltaUpdate::decode(&board, &body).unwrap().entries {
        let at = usize::from(entry.index) * 3;
        display[at..at + 3].copy_from_slice(&entry.rgb);
    }

    assert_eq!(display, second);
}
