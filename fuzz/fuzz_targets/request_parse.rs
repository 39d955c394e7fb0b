//! Fuzz target for HTTP request-head parsing
//!
//! # Invariants
//!
//! - Parsing arbitrary bytes never panics
//! - Accepted heads always carry a non-empty target

#![no_main]

use glowcast_core::http::RequestHead;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(head) = RequestHead::parse(data) {
        assert!(!head.path.is_empty());
    }
});
