//! Response serialization.
//!
//! Every response carries permissive CORS headers so browser control
//! pages can talk to the device from any origin.

use bytes::{BufMut, Bytes, BytesMut};

const CORS_HEADERS: &str = "Access-Control-Allow-Origin: *\r\n\
    Access-Control-Allow-Methods: GET, POST, DELETE, OPTIONS\r\n\
    Access-Control-Allow-Headers: Content-Type\r\n";

/// Serialize one complete response.
pub(crate) fn build(
    status: &str,
    content_type: &str,
    body: &[u8],
    keep_alive: bool,
) -> Bytes {
    let mut out = BytesMut::with_capacity(256 + body.len());
    write_head(&mut out, status, content_type, body.len(), keep_alive);
    out.put_slice(body);
    out.freeze()
}

/// Serialize only the header block, for responses streamed in chunks.
/// Streamed responses always close.
pub(crate) fn stream_head(content_type: &str, body_len: usize) -> Bytes {
    let mut out = BytesMut::with_capacity(256);
    write_head(&mut out, "200 OK", content_type, body_len, false);
    out.freeze()
}

/// 200 with a JSON body.
pub(crate) fn json_ok(body: &str, keep_alive: bool) -> Bytes {
    build("200 OK", "application/json", body.as_bytes(), keep_alive)
}

/// 400 with a JSON body, keeping the negotiated persistence.
pub(crate) fn json_bad_request(body: &str, keep_alive: bool) -> Bytes {
    build(
        "400 Bad Request",
        "application/json",
        body.as_bytes(),
        keep_alive,
    )
}

/// 204 CORS preflight answer.
pub(crate) fn no_content(keep_alive: bool) -> Bytes {
    build("204 No Content", "application/json", b"", keep_alive)
}

/// 400 for requests broken at the framing level. Always closes.
pub(crate) fn bad_request() -> Bytes {
    build(
        "400 Bad Request",
        "application/json",
        br#"{"status":"error","error":"bad request"}"#,
        false,
    )
}

/// 404 for unknown routes. Always closes.
pub(crate) fn not_found() -> Bytes {
    build(
        "404 Not Found",
        "application/json",
        br#"{"status":"error","error":"not found"}"#,
        false,
    )
}

/// 403 for privileged routes the caller may not use.
pub(crate) fn forbidden(body: &str, keep_alive: bool) -> Bytes {
    build("403 Forbidden", "application/json", body.as_bytes(), keep_alive)
}

fn write_head(
    out: &mut BytesMut,
    status: &str,
    content_type: &str,
    body_len: usize,
    keep_alive: bool,
) {
    let connection = if keep_alive { "keep-alive" } else { "close" };
    out.put_slice(
        format!(
            "HTTP/1.1 {status}\r\n\
             Content-Type: {content_type}\r\n\
             Content-Length: {body_len}\r\n\
             Connection: {connection}\r\n\
             {CORS_HEADERS}\r\n"
        )
        .as_bytes(),
    );
}
