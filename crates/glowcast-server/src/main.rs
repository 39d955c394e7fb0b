//! Glowcast server binary.
//!
//! # Usage
//!
//! ```bash
//! # Drive a Cosmic panel in the terminal
//! glowcast-server --bind 0.0.0.0:8766 --display terminal
//!
//! # Headless, with a host allowed to trigger firmware-update reboots
//! glowcast-server --board galactic --display null --allow-host ops.example
//! ```
//!
//! Exits with code 0 on a normal reboot request and code 3 on a
//! bootloader reboot request, so a supervisor can tell them apart.

use clap::{Parser, ValueEnum};
use glowcast_proto::Board;
use glowcast_server::{
    Display, NullDisplay, Server, ServerError, ServerRuntimeConfig, TerminalDisplay,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use glowcast_core::RebootMode;

/// Exit code signalling a bootloader-mode restart to the supervisor.
const EXIT_BOOTLOADER: i32 = 3;

/// Where to draw frames.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DisplayKind {
    /// ANSI half-block rendering in the terminal
    Terminal,
    /// Discard frames (headless)
    Null,
}

/// Glowcast LED-matrix display server
#[derive(Parser, Debug)]
#[command(name = "glowcast-server")]
#[command(about = "Networked LED-matrix display server")]
#[command(version)]
struct Args {
    /// Address to bind (TCP and UDP)
    #[arg(short, long, default_value = "0.0.0.0:8766")]
    bind: String,

    /// Panel to drive (cosmic, galactic, hd, pack)
    #[arg(long, default_value = "cosmic")]
    board: String,

    /// Host allowed to use privileged routes (repeatable, resolved once)
    #[arg(long = "allow-host")]
    allow_hosts: Vec<String>,

    /// Display target
    #[arg(long, value_enum, default_value_t = DisplayKind::Terminal)]
    display: DisplayKind,

    /// Report the firmware-update transport as attached
    #[arg(long)]
    transport_present: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let board = Board::by_name(&args.board).ok_or(ServerError::UnknownBoard {
        name: args.board.clone(),
    })?;

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        board,
        allow_hosts: args.allow_hosts,
        transport_present: args.transport_present,
    };

    let server = Server::bind(config).await?;
    tracing::info!(
        board = board.name,
        addr = %server.local_addr()?,
        "glowcast server listening"
    );

    let display: Box<dyn Display + Send> = match args.display {
        DisplayKind::Terminal => Box::new(TerminalDisplay::new()),
        DisplayKind::Null => Box::new(NullDisplay),
    };

    match server.run(display).await? {
        RebootMode::Normal => {
            tracing::info!("restarting");
            Ok(())
        }
        RebootMode::Bootloader => {
            tracing::info!("restarting into bootloader mode");
            std::process::exit(EXIT_BOOTLOADER);
        }
    }
}
