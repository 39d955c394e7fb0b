//! Per-connection state machine.
//!
//! Uses the action pattern: the driver feeds transport events in and
//! executes the returned actions. No I/O happens here, which keeps
//! connection handling testable without sockets.
//!
//! A connection accumulates bytes until a full request (head plus
//! `Content-Length` body) is buffered, dispatches it, and queues the
//! response. Large bodies are streamed in fixed-size chunks, one per
//! send-window event, and force the connection closed afterwards.

use std::net::IpAddr;

use bytes::{Bytes, BytesMut};

use crate::{
    error::HttpError,
    http::{
        request::{Method, RequestHead},
        response,
        routes::{self, Reply},
    },
    state::Context,
};

/// Hard cap on buffered request bytes (head plus body).
pub const MAX_REQUEST_LEN: usize = 16 * 1024;

/// Poll ticks without traffic before the connection is dropped.
pub const MAX_IDLE_POLLS: u32 = 10;

/// Streamed responses are cut into chunks of this many bytes.
pub const STREAM_CHUNK_LEN: usize = 2048;

/// Transport events fed into the state machine.
#[derive(Debug, Clone)]
pub enum ConnEvent {
    /// Connection established
    Accepted,
    /// Bytes arrived from the peer
    DataReceived(Bytes),
    /// Previously queued sends were flushed; more may be queued
    SendWindowAvailable,
    /// The transport failed; the connection is gone
    TransportError,
    /// Periodic tick for idle tracking
    PollTick,
}

/// Actions for the driver to execute, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnAction {
    /// Queue these bytes for sending
    Send(Bytes),
    /// Drop the connection immediately
    Close,
    /// Flush queued sends, then drop the connection
    CloseAfterSend,
}

/// In-progress streamed response.
#[derive(Debug)]
struct StreamState {
    body: Bytes,
    offset: usize,
}

/// State machine for one client connection.
#[derive(Debug)]
pub struct HttpConn {
    peer: IpAddr,
    buf: BytesMut,
    idle_polls: u32,
    stream: Option<StreamState>,
    closed: bool,
}

impl HttpConn {
    /// New connection from `peer`.
    #[must_use]
    pub fn new(peer: IpAddr) -> Self {
        Self {
            peer,
            buf: BytesMut::new(),
            idle_polls: 0,
            stream: None,
            closed: false,
        }
    }

    /// Peer address, used for privileged-route gating.
    #[must_use]
    pub fn peer(&self) -> IpAddr {
        self.peer
    }

    /// Whether the machine has decided the connection is done.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Advance the machine with one event.
    pub fn handle_event(&mut self, ctx: &Context, event: ConnEvent) -> Vec<ConnAction> {
        if self.closed {
            return Vec::new();
        }
        match event {
            ConnEvent::Accepted => {
                self.idle_polls = 0;
                Vec::new()
            }
            ConnEvent::DataReceived(data) => self.handle_data(ctx, &data),
            ConnEvent::SendWindowAvailable => self.continue_stream(),
            ConnEvent::TransportError => {
                self.closed = true;
                vec![ConnAction::Close]
            }
            ConnEvent::PollTick => {
                self.idle_polls += 1;
                if self.idle_polls > MAX_IDLE_POLLS {
                    self.closed = true;
                    vec![ConnAction::Close]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn handle_data(&mut self, ctx: &Context, data: &[u8]) -> Vec<ConnAction> {
        self.idle_polls = 0;
        self.buf.extend_from_slice(data);

        let mut actions = Vec::new();
        if let Err(_err @ HttpError::RequestTooLarge { .. }) = self.check_capacity() {
            self.reject(&mut actions);
            return actions;
        }

        // Drain every complete request (pipelining) until the buffer runs
        // dry or a response decides the connection's fate.
        while !self.closed && self.stream.is_none() {
            let Some(head_end) = find_head_end(&self.buf) else {
                break;
            };
            let head = match RequestHead::parse(&self.buf[..head_end]) {
                Ok(head) => head,
                Err(_) => {
                    self.reject(&mut actions);
                    return actions;
                }
            };
            if head.content_length > MAX_REQUEST_LEN {
                self.reject(&mut actions);
                return actions;
            }
            let total = head_end + 4 + head.content_length;
            if self.buf.len() < total {
                break;
            }
            let request = self.buf.split_to(total).freeze();
            let body = &request[head_end + 4..];
            self.dispatch(ctx, &head, body, &mut actions);
        }
        actions
    }

    fn dispatch(
        &mut self,
        ctx: &Context,
        head: &RequestHead,
        body: &[u8],
        actions: &mut Vec<ConnAction>,
    ) {
        // Preflight is answered uniformly, no route lookup.
        if head.method == Method::Options {
            actions.push(ConnAction::Send(response::no_content(head.keep_alive)));
            if !head.keep_alive {
                self.closed = true;
                actions.push(ConnAction::CloseAfterSend);
            }
            return;
        }

        match routes::dispatch(ctx, self.peer, head, body) {
            Reply::Full { bytes, close } => {
                actions.push(ConnAction::Send(bytes));
                if close {
                    self.closed = true;
                    actions.push(ConnAction::CloseAfterSend);
                }
            }
            Reply::Stream { head, body } => {
                actions.push(ConnAction::Send(head));
                self.stream = Some(StreamState { body, offset: 0 });
                // First chunk goes out with the header.
                actions.extend(self.continue_stream());
            }
        }
    }

    /// Send the next chunk of an in-progress stream, closing at the end.
    fn continue_stream(&mut self) -> Vec<ConnAction> {
        let Some(stream) = self.stream.as_mut() else {
            return Vec::new();
        };
        let mut actions = Vec::new();
        let remaining = stream.body.len() - stream.offset;
        if remaining > 0 {
            let len = remaining.min(STREAM_CHUNK_LEN);
            let chunk = stream.body.slice(stream.offset..stream.offset + len);
            stream.offset += len;
            actions.push(ConnAction::Send(chunk));
        }
        if stream.offset == stream.body.len() {
            self.stream = None;
            self.closed = true;
            actions.push(ConnAction::CloseAfterSend);
        }
        actions
    }

    /// 400 and drop, for requests broken at the framing level.
    fn reject(&mut self, actions: &mut Vec<ConnAction>) {
        self.closed = true;
        actions.push(ConnAction::Send(response::bad_request()));
        actions.push(ConnAction::CloseAfterSend);
    }

    fn check_capacity(&self) -> Result<(), HttpError> {
        if self.buf.len() > MAX_REQUEST_LEN {
            return Err(HttpError::RequestTooLarge {
                max: MAX_REQUEST_LEN,
            });
        }
        Ok(())
    }
}

/// Offset of the `\r\n\r\n` head terminator, if buffered.
fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowlist::Allowlist;
    use glowcast_proto::Board;
    use std::net::Ipv4Addr;

    fn context() -> Context {
        Context::new(Board::PACK, Allowlist::default(), false)
    }

    fn conn() -> HttpConn {
        HttpConn::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)))
    }

    fn data(bytes: &[u8]) -> ConnEvent {
        ConnEvent::DataReceived(Bytes::copy_from_slice(bytes))
    }

    fn sent_text(actions: &[ConnAction]) -> String {
        let mut out = Vec::new();
        for action in actions {
            if let ConnAction::Send(bytes) = action {
                out.extend_from_slice(bytes);
            }
        }
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn two_keep_alive_requests_on_one_connection() {
        let ctx = context();
        let mut conn = conn();
        conn.handle_event(&ctx, ConnEvent::Accepted);

        let first = conn.handle_event(&ctx, data(b"GET /api/status HTTP/1.1\r\n\r\n"));
        assert!(sent_text(&first).contains(r#""status":"running""#));
        assert!(!first.contains(&ConnAction::CloseAfterSend));
        assert!(!conn.is_closed());

        let second = conn.handle_event(&ctx, data(b"GET /api/brightness HTTP/1.1\r\n\r\n"));
        assert!(sent_text(&second).contains("brightness"));
        assert!(!conn.is_closed());
    }

    #[test]
    fn malformed_request_line_is_400_and_close() {
        let ctx = context();
        let mut conn = conn();
        let actions = conn.handle_event(&ctx, data(b"NONSENSE\r\n\r\n"));
        assert!(sent_text(&actions).starts_with("HTTP/1.1 400"));
        assert!(actions.contains(&ConnAction::CloseAfterSend));
        assert!(conn.is_closed());
    }

    #[test]
    fn request_spread_over_several_reads() {
        let ctx = context();
        let mut conn = conn();
        assert!(conn.handle_event(&ctx, data(b"GET /api/st")).is_empty());
        assert!(conn.handle_event(&ctx, data(b"atus HTTP/1.1\r\n")).is_empty());
        let actions = conn.handle_event(&ctx, data(b"\r\n"));
        assert!(sent_text(&actions).contains(r#""status":"running""#));
    }

    #[test]
    fn body_waits_for_content_length() {
        let ctx = context();
        let mut conn = conn();
        let head = b"POST /api/brightness HTTP/1.1\r\nContent-Length: 14\r\n\r\n";
        assert!(conn.handle_event(&ctx, data(head)).is_empty());
        let actions = conn.handle_event(&ctx, data(br#"{"value":0.75}"#));
        assert!(sent_text(&actions).contains(r#""status":"ok""#));
        assert_eq!(ctx.take_pending_brightness(), Some(0.75));
    }

    #[test]
    fn pipelined_requests_answered_in_order() {
        let ctx = context();
        let mut conn = conn();
        let actions = conn.handle_event(
            &ctx,
            data(b"GET /api/status HTTP/1.1\r\n\r\nGET /api/brightness HTTP/1.1\r\n\r\n"),
        );
        let text = sent_text(&actions);
        let status_at = text.find(r#""status":"running""#).expect("status reply");
        let brightness_at = text.find("brightness").expect("brightness reply");
        assert!(status_at < brightness_at);
    }

    #[test]
    fn options_preflight_is_uniform_204() {
        let ctx = context();
        let mut conn = conn();
        let actions = conn.handle_event(&ctx, data(b"OPTIONS /anything HTTP/1.1\r\n\r\n"));
        let text = sent_text(&actions);
        assert!(text.starts_with("HTTP/1.1 204"));
        assert!(text.contains("Access-Control-Allow-Origin: *"));
        assert!(!conn.is_closed());
    }

    #[test]
    fn oversized_request_is_rejected() {
        let ctx = context();
        let mut conn = conn();
        let huge = vec![b'a'; MAX_REQUEST_LEN + 1];
        let actions = conn.handle_event(&ctx, data(&huge));
        assert!(sent_text(&actions).starts_with("HTTP/1.1 400"));
        assert!(conn.is_closed());
    }

    #[test]
    fn oversized_declared_body_is_rejected() {
        let ctx = context();
        let mut conn = conn();
        let head = format!(
            "POST /api/frame HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_REQUEST_LEN + 1
        );
        let actions = conn.handle_event(&ctx, data(head.as_bytes()));
        assert!(sent_text(&actions).starts_with("HTTP/1.1 400"));
        assert!(conn.is_closed());
    }

    #[test]
    fn idle_connection_closed_after_poll_budget() {
        let ctx = context();
        let mut conn = conn();
        conn.handle_event(&ctx, ConnEvent::Accepted);
        for _ in 0..MAX_IDLE_POLLS {
            assert!(conn.handle_event(&ctx, ConnEvent::PollTick).is_empty());
        }
        let actions = conn.handle_event(&ctx, ConnEvent::PollTick);
        assert_eq!(actions, vec![ConnAction::Close]);
        assert!(conn.is_closed());
    }

    #[test]
    fn traffic_resets_idle_counter() {
        let ctx = context();
        let mut conn = conn();
        for _ in 0..MAX_IDLE_POLLS {
            conn.handle_event(&ctx, ConnEvent::PollTick);
        }
        conn.handle_event(&ctx, data(b"GET /api/status HTTP/1.1\r\n\r\n"));
        let actions = conn.handle_event(&ctx, ConnEvent::PollTick);
        assert!(actions.is_empty());
    }

    #[test]
    fn transport_error_closes_immediately() {
        let ctx = context();
        let mut conn = conn();
        let actions = conn.handle_event(&ctx, ConnEvent::TransportError);
        assert_eq!(actions, vec![ConnAction::Close]);
        assert!(conn.handle_event(&ctx, ConnEvent::PollTick).is_empty());
    }

    #[test]
    fn index_page_streams_in_chunks_then_closes() {
        let ctx = context();
        let mut conn = conn();
        let mut actions = conn.handle_event(&ctx, data(b"GET / HTTP/1.1\r\n\r\n"));
        // Header plus first chunk
        assert!(matches!(actions[0], ConnAction::Send(_)));
        let ConnAction::Send(first_chunk) = &actions[1] else {
            panic!("expected first chunk");
        };
        assert_eq!(first_chunk.len(), STREAM_CHUNK_LEN);

        let mut total = first_chunk.len();
        while !conn.is_closed() {
            actions = conn.handle_event(&ctx, ConnEvent::SendWindowAvailable);
            for action in &actions {
                match action {
                    ConnAction::Send(chunk) => {
                        assert!(chunk.len() <= STREAM_CHUNK_LEN);
                        total += chunk.len();
                    }
                    ConnAction::CloseAfterSend => {}
                    ConnAction::Close => panic!("stream should close after send"),
                }
            }
        }
        assert_eq!(actions.last(), Some(&ConnAction::CloseAfterSend));
        // Everything declared in Content-Length went out.
        let declared = {
            let head_actions = HttpConn::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
                .handle_event(&ctx, data(b"GET / HTTP/1.1\r\n\r\n"));
            let text = sent_text(&head_actions);
            let marker = "Content-Length: ";
            let start = text.find(marker).expect("length header") + marker.len();
            let end = start + text[start..].find('\r').expect("header end");
            text[start..end].parse::<usize>().expect("length value")
        };
        assert_eq!(total, declared);
    }

    #[test]
    fn non_keep_alive_request_closes_after_response() {
        let ctx = context();
        let mut conn = conn();
        let actions = conn.handle_event(
            &ctx,
            data(b"GET /api/status HTTP/1.1\r\nConnection: close\r\n\r\n"),
        );
        assert!(sent_text(&actions).contains("Connection: close"));
        assert_eq!(actions.last(), Some(&ConnAction::CloseAfterSend));
        assert!(conn.is_closed());
    }
}
