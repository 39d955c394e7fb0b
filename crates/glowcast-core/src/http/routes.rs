//! Request routing.
//!
//! Pure dispatch from a parsed request to a reply. The connection layer
//! handles framing, OPTIONS preflight, and streaming; handlers here only
//! read and mutate shared state.

use std::net::IpAddr;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use glowcast_proto::DeltaUpdate;

use crate::{
    error::SubmitError,
    http::{
        request::{Method, RequestHead},
        response,
    },
    script,
    state::{Context, RebootMode},
};

/// Crate version reported by `/api/status`.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Embedded control page served at `/`.
const INDEX_PAGE: &str = include_str!("index.html");

/// A handler's answer, before wire framing.
#[derive(Debug)]
pub(crate) enum Reply {
    /// One complete response; `close` overrides keep-alive
    Full {
        /// Serialized response
        bytes: Bytes,
        /// Close after the response is flushed
        close: bool,
    },
    /// Header now, body streamed in chunks, then close
    Stream {
        /// Serialized header block
        head: Bytes,
        /// Complete body to stream
        body: Bytes,
    },
}

impl Reply {
    fn full(bytes: Bytes, keep_alive: bool) -> Self {
        Self::Full {
            bytes,
            close: !keep_alive,
        }
    }

    fn stream(content_type: &str, body: Bytes) -> Self {
        Self::Stream {
            head: response::stream_head(content_type, body.len()),
            body,
        }
    }

    fn not_found() -> Self {
        Self::Full {
            bytes: response::not_found(),
            close: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BrightnessBody {
    value: f32,
}

#[derive(Debug, Deserialize)]
struct ParamBody {
    name: String,
    value: i64,
}

/// Route one complete request.
pub(crate) fn dispatch(
    ctx: &Context,
    peer: IpAddr,
    head: &RequestHead,
    body: &[u8],
) -> Reply {
    let ka = head.keep_alive;
    match (head.method, head.path.as_str()) {
        (Method::Get, "/") => Reply::stream("text/html", Bytes::from_static(INDEX_PAGE.as_bytes())),
        (Method::Get, "/api/status") => {
            let reply = json!({
                "status": "running",
                "version": VERSION,
                "board": ctx.board.name,
                "width": ctx.board.width,
                "height": ctx.board.height,
                "sequence": ctx.exchange.sequence(),
            });
            Reply::full(response::json_ok(&reply.to_string(), ka), ka)
        }
        (Method::Get, "/api/brightness") => {
            let reply = json!({ "status": "ok", "brightness": ctx.brightness() });
            Reply::full(response::json_ok(&reply.to_string(), ka), ka)
        }
        (Method::Post, "/api/brightness") => match serde_json::from_slice::<BrightnessBody>(body) {
            Ok(req) => {
                ctx.set_brightness(req.value);
                Reply::full(response::json_ok(r#"{"status":"ok"}"#, ka), ka)
            }
            Err(err) => bad_body(&err.to_string(), ka),
        },
        (Method::Post, "/api/frame") => submit_reply(ctx.exchange.submit_full(body), ka),
        (Method::Post, "/api/delta") => match DeltaUpdate::decode(&ctx.board, body) {
            Ok(update) => submit_reply(ctx.exchange.submit_delta(&update), ka),
            Err(err) => bad_body(&err.to_string(), ka),
        },
        (Method::Post, "/api/script") => match std::str::from_utf8(body) {
            Ok(source) => match ctx.script.load("upload", source) {
                Ok(()) => Reply::full(response::json_ok(r#"{"status":"ok"}"#, ka), ka),
                Err(err) => bad_body(&err.to_string(), ka),
            },
            Err(_) => bad_body("script source is not valid utf-8", ka),
        },
        (Method::Delete, "/api/script") => {
            ctx.script.unload();
            Reply::full(response::json_ok(r#"{"status":"ok"}"#, ka), ka)
        }
        (Method::Post, "/api/script/param") => match serde_json::from_slice::<ParamBody>(body) {
            Ok(req) => match ctx.script.set_param(&req.name, req.value) {
                Ok(()) => Reply::full(response::json_ok(r#"{"status":"ok"}"#, ka), ka),
                Err(err) => bad_body(&err.to_string(), ka),
            },
            Err(err) => bad_body(&err.to_string(), ka),
        },
        (Method::Get, "/api/script/status") => {
            let status = ctx.script.status();
            let reply = json!({
                "status": "ok",
                "loaded": status.loaded,
                "loading": status.loading,
                "name": status.name,
                "error": status.error,
            });
            Reply::full(response::json_ok(&reply.to_string(), ka), ka)
        }
        (Method::Get, "/api/scripts") => {
            let list: Vec<_> = script::BUILTINS
                .iter()
                .enumerate()
                .map(|(index, builtin)| json!({ "index": index, "name": builtin.name }))
                .collect();
            let reply = json!({ "status": "ok", "scripts": list });
            Reply::full(response::json_ok(&reply.to_string(), ka), ka)
        }
        (method, path) if path.starts_with("/api/script/") => {
            let Ok(index) = path["/api/script/".len()..].parse::<usize>() else {
                return Reply::not_found();
            };
            let Ok(builtin) = script::builtin_by_index(index) else {
                return Reply::not_found();
            };
            match method {
                Method::Get => {
                    Reply::stream("text/plain", Bytes::from_static(builtin.source.as_bytes()))
                }
                Method::Post => match ctx.script.load_builtin(index) {
                    Ok(()) => Reply::full(response::json_ok(r#"{"status":"ok"}"#, ka), ka),
                    Err(err) => bad_body(&err.to_string(), ka),
                },
                _ => Reply::not_found(),
            }
        }
        (Method::Post, "/api/reboot") => {
            ctx.request_reboot(RebootMode::Normal);
            Reply::full(
                response::json_ok(r#"{"status":"ok","action":"reboot"}"#, ka),
                ka,
            )
        }
        (Method::Post, "/api/reboot-bootloader") => {
            if !ctx.transport_present() {
                return forbidden("update transport not attached", ka);
            }
            if !ctx.allowlist.is_allowed(peer) {
                return forbidden("client not allowed", ka);
            }
            ctx.request_reboot(RebootMode::Bootloader);
            Reply::full(
                response::json_ok(r#"{"status":"ok","action":"reboot-bootloader"}"#, ka),
                ka,
            )
        }
        _ => Reply::not_found(),
    }
}

/// Frame/delta submit outcome to wire reply. `Busy` is a soft condition
/// the producer is expected to retry, so it stays a 200.
fn submit_reply(result: Result<u64, SubmitError>, keep_alive: bool) -> Reply {
    match result {
        Ok(sequence) => {
            let reply = json!({ "status": "ok", "sequence": sequence });
            Reply::full(response::json_ok(&reply.to_string(), keep_alive), keep_alive)
        }
        Err(SubmitError::Busy) => Reply::full(
            response::json_ok(r#"{"status":"busy"}"#, keep_alive),
            keep_alive,
        ),
        Err(SubmitError::Protocol(err)) => bad_body(&err.to_string(), keep_alive),
    }
}

fn bad_body(message: &str, keep_alive: bool) -> Reply {
    let reply = json!({ "status": "error", "error": message });
    Reply::full(
        response::json_bad_request(&reply.to_string(), keep_alive),
        keep_alive,
    )
}

fn forbidden(message: &str, keep_alive: bool) -> Reply {
    let reply = json!({ "status": "error", "error": message });
    Reply::full(
        response::forbidden(&reply.to_string(), keep_alive),
        keep_alive,
    )
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

    fn peer() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))
    }

    fn get(path: &str) -> RequestHead {
        RequestHead {
            method: Method::Get,
            path: path.to_owned(),
            version_11: true,
            content_length: 0,
            keep_alive: true,
        }
    }

    fn post(path: &str) -> RequestHead {
        RequestHead {
            method: Method::Post,
            ..get(path)
        }
    }

    fn body_text(reply: &Reply) -> String {
        match reply {
            Reply::Full { bytes, .. } => String::from_utf8(bytes.to_vec()).expect("utf8"),
            Reply::Stream { .. } => panic!("expected full reply"),
        }
    }

    #[test]
    fn status_reports_board() {
        let ctx = context();
        let text = body_text(&dispatch(&ctx, peer(), &get("/api/status"), b""));
        assert!(text.contains(r#""status":"running""#));
        assert!(text.contains(r#""board":"Pack""#));
    }

    #[test]
    fn brightness_round_trip() {
        let ctx = context();
        let reply = dispatch(&ctx, peer(), &post("/api/brightness"), br#"{"value":0.25}"#);
        assert!(body_text(&reply).contains(r#""status":"ok""#));
        assert_eq!(ctx.take_pending_brightness(), Some(0.25));

        let text = body_text(&dispatch(&ctx, peer(), &get("/api/brightness"), b""));
        assert!(text.contains("0.25"));
    }

    #[test]
    fn frame_submit_and_busy() {
        let ctx = context();
        let frame = vec![7u8; Board::PACK.frame_len()];

        let first = body_text(&dispatch(&ctx, peer(), &post("/api/frame"), &frame));
        assert!(first.contains(r#""status":"ok""#));

        let second = body_text(&dispatch(&ctx, peer(), &post("/api/frame"), &frame));
        assert!(second.contains(r#""status":"busy""#));
    }

    #[test]
    fn wrong_size_frame_is_bad_request() {
        let ctx = context();
        let text = body_text(&dispatch(&ctx, peer(), &post("/api/frame"), &[0u8; 5]));
        assert!(text.starts_with("HTTP/1.1 400"));
    }

    #[test]
    fn script_upload_and_status() {
        let ctx = context();
        let source = b"function shader(x, y, t, frame, dt) return 1, 2, 3 end";
        let text = body_text(&dispatch(&ctx, peer(), &post("/api/script"), source));
        assert!(text.contains(r#""status":"ok""#));

        let status = body_text(&dispatch(&ctx, peer(), &get("/api/script/status"), b""));
        assert!(status.contains(r#""loaded":true"#));

        let head = RequestHead {
            method: Method::Delete,
            ..get("/api/script")
        };
        dispatch(&ctx, peer(), &head, b"");
        assert!(!ctx.script.is_loaded());
    }

    #[test]
    fn broken_script_reports_error() {
        let ctx = context();
        let text = body_text(&dispatch(&ctx, peer(), &post("/api/script"), b"function ("));
        assert!(text.starts_with("HTTP/1.1 400"));
        let status = body_text(&dispatch(&ctx, peer(), &get("/api/script/status"), b""));
        assert!(status.contains(r#""loaded":false"#));
    }

    #[test]
    fn builtin_listing_and_fetch() {
        let ctx = context();
        let list = body_text(&dispatch(&ctx, peer(), &get("/api/scripts"), b""));
        assert!(list.contains(r#""name":"plasma""#));

        let reply = dispatch(&ctx, peer(), &get("/api/script/0"), b"");
        assert!(matches!(reply, Reply::Stream { .. }));

        let missing = dispatch(&ctx, peer(), &get("/api/script/99"), b"");
        assert!(body_text(&missing).starts_with("HTTP/1.1 404"));
    }

    #[test]
    fn reboot_bootloader_gated() {
        // No transport attached
        let ctx = context();
        let text = body_text(&dispatch(&ctx, peer(), &post("/api/reboot-bootloader"), b""));
        assert!(text.starts_with("HTTP/1.1 403"));
        assert_eq!(ctx.reboot_requested(), None);

        // Transport attached but peer not allowed
        let ctx = Context::new(Board::PACK, Allowlist::default(), true);
        let text = body_text(&dispatch(&ctx, peer(), &post("/api/reboot-bootloader"), b""));
        assert!(text.starts_with("HTTP/1.1 403"));

        // Loopback is always allowed
        let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let text = body_text(&dispatch(&ctx, loopback, &post("/api/reboot-bootloader"), b""));
        assert!(text.contains(r#""status":"ok""#));
        assert_eq!(ctx.reboot_requested(), Some(RebootMode::Bootloader));
    }

    #[test]
    fn unknown_route_is_404_close() {
        let ctx = context();
        let reply = dispatch(&ctx, peer(), &get("/nope"), b"");
        match reply {
            Reply::Full { close, .. } => assert!(close),
            Reply::Stream { .. } => panic!("expected full reply"),
        }
    }
}
