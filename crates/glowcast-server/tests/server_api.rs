//! End-to-end tests over real sockets.
//!
//! Each test boots a full server (network tasks plus render loop with a
//! null display) on an ephemeral port and talks to it like a client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use glowcast_core::Context;
use glowcast_proto::Board;
use glowcast_server::{NullDisplay, Server, ServerRuntimeConfig};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpStream, UdpSocket},
};

async fn start(board: Board) -> (SocketAddr, Arc<Context>) {
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_owned(),
        board,
        allow_hosts: Vec::new(),
        transport_present: false,
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let ctx = server.context();
    tokio::spawn(async move {
        let _ = server.run(Box::new(NullDisplay)).await;
    });
    (addr, ctx)
}

/// Read one complete response (head plus `Content-Length` body).
async fn read_response(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = std::str::from_utf8(&buf[..pos]).unwrap();
            let marker = "Content-Length: ";
            let start = head.find(marker).unwrap() + marker.len();
            let end = start + head[start..].find('\r').unwrap();
            let content_length: usize = head[start..end].parse().unwrap();
            let total = pos + 4 + content_length;
            while buf.len() < total {
                let n = stream.read(&mut tmp).await.unwrap();
                assert!(n > 0, "connection closed mid-body");
                buf.extend_from_slice(&tmp[..n]);
            }
            return String::from_utf8_lossy(&buf[..total]).into_owned();
        }
        let n = stream.read(&mut tmp).await.unwrap();
        assert!(n > 0, "connection closed before response");
        buf.extend_from_slice(&tmp[..n]);
    }
}

async fn request(stream: &mut TcpStream, text: &str) -> String {
    stream.write_all(text.as_bytes()).await.unwrap();
    read_response(stream).await
}

fn body_json(response: &str) -> serde_json::Value {
    let body_at = response.find("\r\n\r\n").unwrap() + 4;
    serde_json::from_str(&response[body_at..]).unwrap()
}

/// Wait until `check` passes or fail the test.
async fn poll_until<F: Fn() -> bool>(what: &str, check: F) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn status_and_brightness_share_a_keep_alive_connection() {
    let (addr, _ctx) = start(Board::PACK).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let status = request(&mut stream, "GET /api/status HTTP/1.1\r\n\r\n").await;
    let json = body_json(&status);
    assert_eq!(json["status"], "running");
    assert_eq!(json["board"], "Pack");

    // Same connection, second request
    let brightness = request(&mut stream, "GET /api/brightness HTTP/1.1\r\n\r\n").await;
    assert_eq!(body_json(&brightness)["status"], "ok");
}

#[tokio::test]
async fn malformed_request_gets_400_then_close() {
    let (addr, _ctx) = start(Board::PACK).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let response = request(&mut stream, "NONSENSE\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400"));

    let mut tmp = [0u8; 16];
    let n = stream.read(&mut tmp).await.unwrap();
    assert_eq!(n, 0, "server should close after a 400");
}

#[tokio::test]
async fn connection_close_honored() {
    let (addr, _ctx) = start(Board::PACK).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let response = request(
        &mut stream,
        "GET /api/status HTTP/1.1\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.contains("Connection: close"));

    let mut tmp = [0u8; 16];
    let n = stream.read(&mut tmp).await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn black_frame_then_single_pixel_delta() {
    let board = Board::PACK;
    let (addr, ctx) = start(board).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let frame = vec![0u8; board.frame_len()];
    let mut post = format!(
        "POST /api/frame HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
        frame.len()
    )
    .into_bytes();
    post.extend_from_slice(&frame);
    stream.write_all(&post).await.unwrap();
    let response = read_response(&mut stream).await;
    assert_eq!(body_json(&response)["status"], "ok");

    // Render loop drains the exchange between frames.
    poll_until("full frame consumed", || !ctx.exchange.is_pending()).await;

    // One red pixel at index 3
    let delta: &[u8] = &[1, 0, 3, 0, 255, 0, 0];
    let mut post = format!(
        "POST /api/delta HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
        delta.len()
    )
    .into_bytes();
    post.extend_from_slice(delta);
    stream.write_all(&post).await.unwrap();
    let response = read_response(&mut stream).await;
    let json = body_json(&response);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["sequence"], 2);
}

#[tokio::test]
async fn udp_full_frame_is_submitted_and_junk_ignored() {
    let board = Board::PACK;
    let (addr, ctx) = start(board).await;
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    // Mis-sized datagram first: dropped without a trace on the wire
    socket.send_to(&[1, 2, 3], addr).await.unwrap();

    let frame = vec![42u8; board.frame_len()];
    socket.send_to(&frame, addr).await.unwrap();
    poll_until("udp frame submitted", || ctx.exchange.sequence() == 1).await;
}

#[tokio::test]
async fn index_page_streams_completely_then_closes() {
    let (addr, _ctx) = start(Board::PACK).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let response = request(&mut stream, "GET / HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("</html>"));

    let mut tmp = [0u8; 16];
    let n = stream.read(&mut tmp).await.unwrap();
    assert_eq!(n, 0, "streamed responses force close");
}

#[tokio::test]
async fn runaway_script_is_auto_unloaded() {
    let (addr, ctx) = start(Board::PACK).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Burns well past the render budget in a single call.
    let source = r"
        function render_frame(width, height, t, frame, dt)
            local n = 0
            for i = 1, 400000000 do
                n = n + i % 7
            end
            return {}, {}, {}
        end
    ";
    let post = format!(
        "POST /api/script HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
        source.len(),
        source
    );
    let response = request(&mut stream, &post).await;
    assert_eq!(body_json(&response)["status"], "ok");

    poll_until("script auto-unloaded", || !ctx.script.is_loaded()).await;
    let status = ctx.script.status();
    assert!(status.error.is_some());
}
