//! Glowcast production server.
//!
//! Runtime glue around [`glowcast_core`]'s sans-io logic: Tokio sockets
//! feed transport events into the per-connection state machine and
//! execute the actions that come back, a UDP socket on the same port
//! accepts fire-and-forget full frames, and a blocking thread runs the
//! render loop against a [`Display`] target.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod display;
mod error;
mod render;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use glowcast_core::{
    Allowlist, Context, RebootMode,
    http::{ConnAction, ConnEvent, HttpConn},
};
use glowcast_proto::Board;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, UdpSocket},
};

pub use display::{Display, NullDisplay, TerminalDisplay};
pub use error::ServerError;
pub use render::TARGET_FPS;

/// Interval between idle-tracking poll ticks per connection.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address for both the TCP listener and the UDP socket
    pub bind_address: String,
    /// Panel to drive
    pub board: Board,
    /// Hostnames/addresses allowed to use privileged routes,
    /// resolved once at startup
    pub allow_hosts: Vec<String>,
    /// Whether the privileged physical transport is attached
    pub transport_present: bool,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8766".to_owned(),
            board: Board::COSMIC,
            allow_hosts: Vec::new(),
            transport_present: false,
        }
    }
}

/// Bound sockets plus shared state, ready to run.
pub struct Server {
    listener: TcpListener,
    udp: UdpSocket,
    ctx: Arc<Context>,
}

impl Server {
    /// Resolve the allow-list and bind the TCP and UDP sockets.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let mut allowed = Vec::new();
        for host in &config.allow_hosts {
            let addrs: Vec<IpAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map_err(|_| ServerError::Resolve { host: host.clone() })?
                .map(|addr| addr.ip())
                .collect();
            if addrs.is_empty() {
                return Err(ServerError::Resolve { host: host.clone() });
            }
            tracing::info!(host, ?addrs, "allow-list host resolved");
            allowed.extend(addrs);
        }

        let listener = TcpListener::bind(&config.bind_address).await?;
        let udp = UdpSocket::bind(listener.local_addr()?).await?;

        let ctx = Arc::new(Context::new(
            config.board,
            Allowlist::new(allowed),
            config.transport_present,
        ));
        Ok(Self { listener, udp, ctx })
    }

    /// Address the listener actually bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared state handle.
    #[must_use]
    pub fn context(&self) -> Arc<Context> {
        Arc::clone(&self.ctx)
    }

    /// Serve until the render loop reports a reboot request.
    pub async fn run(
        self,
        mut display: Box<dyn Display + Send>,
    ) -> Result<RebootMode, ServerError> {
        let Self { listener, udp, ctx } = self;

        tokio::spawn(serve_udp(Arc::clone(&ctx), udp));

        let render_ctx = Arc::clone(&ctx);
        let mut render =
            tokio::task::spawn_blocking(move || render::run(&render_ctx, display.as_mut()));

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        tracing::debug!(peer = %addr, "connection accepted");
                        tokio::spawn(serve_connection(Arc::clone(&ctx), stream, addr.ip()));
                    }
                    Err(err) => tracing::warn!(%err, "accept failed"),
                },
                mode = &mut render => {
                    return mode.map_err(|err| ServerError::Render(err.to_string()));
                }
            }
        }
    }
}

/// Outcome of executing one action batch.
enum Flow {
    Continue { sent: bool },
    Done,
}

/// Drive one client connection, translating socket I/O to machine events.
async fn serve_connection(ctx: Arc<Context>, mut stream: TcpStream, peer: IpAddr) {
    let mut conn = HttpConn::new(peer);
    let mut actions = conn.handle_event(&ctx, ConnEvent::Accepted);
    if matches!(
        execute(&mut stream, &actions).await,
        Ok(Flow::Done) | Err(_)
    ) {
        return;
    }

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        let event = tokio::select! {
            read = stream.read_buf(&mut buf) => match read {
                Ok(0) => {
                    tracing::debug!(peer = %peer, "peer closed");
                    return;
                }
                Ok(_) => ConnEvent::DataReceived(buf.split().freeze()),
                Err(err) => {
                    tracing::debug!(peer = %peer, %err, "read failed");
                    ConnEvent::TransportError
                }
            },
            _ = poll.tick() => ConnEvent::PollTick,
        };

        actions = conn.handle_event(&ctx, event);
        loop {
            match execute(&mut stream, &actions).await {
                Ok(Flow::Continue { sent: true }) => {
                    // Flushed; let a streaming response queue its next chunk.
                    actions = conn.handle_event(&ctx, ConnEvent::SendWindowAvailable);
                    if actions.is_empty() {
                        break;
                    }
                }
                Ok(Flow::Continue { sent: false }) => break,
                Ok(Flow::Done) => return,
                Err(err) => {
                    tracing::debug!(peer = %peer, %err, "write failed");
                    return;
                }
            }
        }
    }
}

/// Execute one action batch against the socket.
async fn execute(stream: &mut TcpStream, actions: &[ConnAction]) -> std::io::Result<Flow> {
    let mut sent = false;
    for action in actions {
        match action {
            ConnAction::Send(bytes) => {
                stream.write_all(bytes).await?;
                sent = true;
            }
            ConnAction::Close => return Ok(Flow::Done),
            ConnAction::CloseAfterSend => {
                stream.flush().await?;
                let _ = stream.shutdown().await;
                return Ok(Flow::Done);
            }
        }
    }
    Ok(Flow::Continue { sent })
}

/// Fire-and-forget full frames on the companion UDP socket. Anything
/// that is not exactly one frame, or arrives while a frame is pending,
/// is dropped silently.
async fn serve_udp(ctx: Arc<Context>, udp: UdpSocket) {
    let frame_len = ctx.board.frame_len();
    let mut buf = vec![0u8; frame_len + 1];
    loop {
        match udp.recv_from(&mut buf).await {
            Ok((len, from)) => {
                if len == frame_len {
                    if let Err(err) = ctx.exchange.submit_full(&buf[..len]) {
                        tracing::trace!(peer = %from, %err, "udp frame dropped");
                    }
                } else {
                    tracing::trace!(peer = %from, len, "mis-sized udp datagram dropped");
                }
            }
            Err(err) => {
                tracing::warn!(%err, "udp receive failed");
            }
        }
    }
}
