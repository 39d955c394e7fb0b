//! HTTP/1.x request head parsing.
//!
//! Covers the slice of HTTP this device speaks: a request line, a handful
//! of case-insensitive headers, and `Content-Length` body framing. No
//! chunked transfer, no multi-line headers.

use crate::error::HttpError;

/// Request method. Anything unrecognized is carried as [`Method::Other`]
/// and rejected during routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// DELETE
    Delete,
    /// OPTIONS (CORS preflight)
    Options,
    /// Any other token
    Other,
}

/// Parsed request line and the headers this device acts on.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// Request method
    pub method: Method,
    /// Request target, query string stripped
    pub path: String,
    /// True for `HTTP/1.1`
    pub version_11: bool,
    /// Declared body length, zero when absent
    pub content_length: usize,
    /// Negotiated connection persistence
    pub keep_alive: bool,
}

impl RequestHead {
    /// Parse a complete header block (everything before the blank line).
    pub fn parse(head: &[u8]) -> Result<Self, HttpError> {
        let text = std::str::from_utf8(head).map_err(|_| HttpError::BadRequestLine)?;
        let mut lines = text.split("\r\n");

        let request_line = lines.next().ok_or(HttpError::BadRequestLine)?;
        let mut parts = request_line.split(' ');
        let method_token = parts.next().ok_or(HttpError::BadRequestLine)?;
        let target = parts.next().ok_or(HttpError::BadRequestLine)?;
        let version = parts.next().ok_or(HttpError::BadRequestLine)?;
        if parts.next().is_some() || method_token.is_empty() || target.is_empty() {
            return Err(HttpError::BadRequestLine);
        }
        if !version.starts_with("HTTP/") {
            return Err(HttpError::BadRequestLine);
        }

        let method = match method_token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            _ => Method::Other,
        };
        let version_11 = version == "HTTP/1.1";
        let path = target
            .split_once('?')
            .map_or(target, |(path, _)| path)
            .to_owned();

        let mut content_length = 0usize;
        // 1.1 persists by default, older versions must opt in.
        let mut keep_alive = version_11;
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().map_err(|_| HttpError::BadRequestLine)?;
            } else if name.eq_ignore_ascii_case("connection") {
                if value.eq_ignore_ascii_case("close") {
                    keep_alive = false;
                } else if value.eq_ignore_ascii_case("keep-alive") {
                    keep_alive = true;
                }
            }
        }

        Ok(Self {
            method,
            path,
            version_11,
            content_length,
            keep_alive,
        })
    }
}
