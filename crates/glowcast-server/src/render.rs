//! Render loop.
//!
//! One sequential loop owns the panel contents: apply any queued
//! brightness change, drain the frame exchange, otherwise tick the
//! script engine, then hand the result to the display target. An
//! externally submitted frame always wins over a running script; the
//! script is unloaded the moment one arrives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use glowcast_core::{Context, RebootMode, error::ScriptError};

use crate::display::Display;

/// Frames per second the loop aims for while a script runs.
pub const TARGET_FPS: u32 = 30;

/// Run until a reboot is requested. Blocking; meant for its own thread.
pub fn run(ctx: &Arc<Context>, display: &mut dyn Display) -> RebootMode {
    let frame_len = ctx.board.frame_len();
    let mut held = vec![0u8; frame_len];
    let mut scratch = vec![0u8; frame_len];
    let mut brightness = ctx.brightness();
    let mut frame_no: u64 = 0;
    let started = Instant::now();
    let mut last_tick = started;
    let interval = Duration::from_secs(1) / TARGET_FPS;
    let width = usize::from(ctx.board.width);

    loop {
        let tick_start = Instant::now();
        if let Some(value) = ctx.take_pending_brightness() {
            tracing::info!(value, "brightness changed");
            brightness = value;
        }

        let mut dirty = false;
        if let Some(consumed) = ctx.exchange.consume(|x, y, rgb| {
            let at = (usize::from(y) * width + usize::from(x)) * 3;
            held[at..at + 3].copy_from_slice(&rgb);
        }) {
            tracing::debug!(
                sequence = consumed.sequence,
                pixels = consumed.touched.len(),
                "applied external frame"
            );
            // External frames take precedence over any running script.
            if ctx.script.is_loaded() {
                tracing::info!("external frame arrived, unloading script");
                ctx.script.unload();
            }
            dirty = true;
        } else if ctx.script.is_loaded() {
            let now = Instant::now();
            let t = started.elapsed().as_secs_f64();
            let dt = now.duration_since(last_tick).as_secs_f64();
            last_tick = now;
            match ctx.script.render(t, frame_no, dt, &mut scratch) {
                Ok(()) => {
                    held.copy_from_slice(&scratch);
                    frame_no += 1;
                    dirty = true;
                }
                Err(ScriptError::NotLoaded) => {}
                Err(err) => {
                    // The host already unloaded the script and kept the error.
                    tracing::warn!(%err, "script unloaded");
                }
            }
        }

        if dirty {
            if let Err(err) = display.render(&ctx.board, &held, brightness) {
                tracing::error!(%err, "display write failed");
            }
        }

        // Checked after the pass so a frame submitted alongside a reboot
        // request still reaches the panel.
        if let Some(mode) = ctx.reboot_requested() {
            tracing::info!(?mode, "reboot requested, leaving render loop");
            return mode;
        }

        if let Some(remaining) = interval.checked_sub(tick_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }
}
