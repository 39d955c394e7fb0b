//! Glowcast core logic.
//!
//! Everything in this crate is runtime-agnostic: the HTTP connection state
//! machine consumes transport events and returns actions for the driver to
//! execute (the same action pattern as a sans-io protocol core), the frame
//! exchange is a plain mutex-and-atomics cell, and the script engine wraps
//! the embedded Lua VM behind a narrow host interface. The production
//! server in `glowcast-server` supplies sockets, tasks, and timers.
//!
//! # Execution contexts
//!
//! Two cooperative contexts share state through this crate:
//!
//! - the **network context** dispatches one transport event at a time into
//!   [`http::HttpConn`], which may submit frames into [`FrameExchange`] or
//!   call the [`script::ScriptHost`] load/unload/status operations;
//! - the **render context** drains the exchange or ticks the script engine
//!   once per frame.
//!
//! The exchange's critical sections are copy-only; they never perform I/O
//! and never call into the script engine.

pub mod allowlist;
pub mod error;
pub mod exchange;
pub mod http;
pub mod script;
pub mod state;

pub use allowlist::Allowlist;
pub use error::{HttpError, ScriptError, SubmitError};
pub use exchange::{ConsumedFrame, FrameExchange};
pub use script::ScriptHost;
pub use state::{Context, RebootMode};
