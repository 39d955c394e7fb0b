//! Fuzz target for the connection state machine
//!
//! # Strategy
//!
//! - Arbitrary event sequences (data, ticks, window, transport error)
//! - Every emitted action list is consumed as a driver would
//!
//! # Invariants
//!
//! - The machine never panics regardless of event ordering
//! - No actions are emitted after the machine reports closed

#![no_main]

use std::net::{IpAddr, Ipv4Addr};

use arbitrary::Arbitrary;
use bytes::Bytes;
use glowcast_core::{
    Allowlist, Context,
    http::{ConnEvent, HttpConn},
};
use glowcast_proto::Board;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Event {
    Data(Vec<u8>),
    Window,
    Tick,
    Error,
}

fuzz_target!(|events: Vec<Event>| {
    let ctx = Context::new(Board::PACK, Allowlist::default(), false);
    let mut conn = HttpConn::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
    conn.handle_event(&ctx, ConnEvent::Accepted);

    for event in events {
        let was_closed = conn.is_closed();
        let actions = conn.handle_event(
            &ctx,
            match event {
                Event::Data(bytes) => ConnEvent::DataReceived(Bytes::from(bytes)),
                Event::Window => ConnEvent::SendWindowAvailable,
                Event::Tick => ConnEvent::PollTick,
                Event::Error => ConnEvent::TransportError,
            },
        );
        if was_closed {
            assert!(actions.is_empty());
        }
    }
});
