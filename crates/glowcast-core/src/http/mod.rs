//! Event-driven HTTP/1.1 subset.
//!
//! The connection layer is a sans-io state machine: the driver feeds
//! [`ConnEvent`]s in and executes the [`ConnAction`]s that come back.
//! Parsing, routing, and response serialization are internal.

mod conn;
mod request;
mod response;
mod routes;

pub use conn::{
    ConnAction, ConnEvent, HttpConn, MAX_IDLE_POLLS, MAX_REQUEST_LEN, STREAM_CHUNK_LEN,
};
pub use request::{Method, RequestHead};
