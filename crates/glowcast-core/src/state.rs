//! Shared device state.
//!
//! One explicit context object replaces the firmware's free-standing
//! globals. HTTP handlers set small single-value flags here (brightness,
//! reboot requests); the render context consumes them between frames. The
//! heavyweight shared pieces — the frame exchange and the script host —
//! hang off the same object so both execution contexts share exactly one
//! handle.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use glowcast_proto::Board;

use crate::{allowlist::Allowlist, exchange::FrameExchange, script::ScriptHost};

/// Requested restart flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootMode {
    /// Plain restart
    Normal,
    /// Restart into the privileged firmware-update mode
    Bootloader,
}

/// Process-wide state shared by the network and render contexts.
#[derive(Debug)]
pub struct Context {
    /// Active panel description
    pub board: Board,
    /// Frame hand-off slot
    pub exchange: FrameExchange,
    /// Script engine host
    pub script: ScriptHost,
    /// Callers allowed to use privileged routes
    pub allowlist: Allowlist,
    /// Whether the privileged physical transport (USB) is attached
    transport_present: bool,
    /// Current brightness as f32 bits, `0.0..=1.0`
    brightness_bits: AtomicU32,
    /// Set when an HTTP brightness change awaits the render context
    brightness_dirty: AtomicBool,
    /// 0 = none, 1 = normal, 2 = bootloader
    reboot: AtomicU8,
}

impl Context {
    /// Create state for one device.
    #[must_use]
    pub fn new(board: Board, allowlist: Allowlist, transport_present: bool) -> Self {
        Self {
            board,
            exchange: FrameExchange::new(board),
            script: ScriptHost::new(board),
            allowlist,
            transport_present,
            brightness_bits: AtomicU32::new(0.5f32.to_bits()),
            brightness_dirty: AtomicBool::new(false),
            reboot: AtomicU8::new(0),
        }
    }

    /// Whether the privileged physical transport is attached.
    #[must_use]
    pub fn transport_present(&self) -> bool {
        self.transport_present
    }

    /// Current global brightness.
    #[must_use]
    pub fn brightness(&self) -> f32 {
        f32::from_bits(self.brightness_bits.load(Ordering::Acquire))
    }

    /// Queue a brightness change for the render context.
    pub fn set_brightness(&self, value: f32) {
        let clamped = value.clamp(0.0, 1.0);
        self.brightness_bits.store(clamped.to_bits(), Ordering::Release);
        self.brightness_dirty.store(true, Ordering::Release);
    }

    /// Take a queued brightness change, if any. Render context only.
    pub fn take_pending_brightness(&self) -> Option<f32> {
        if self.brightness_dirty.swap(false, Ordering::AcqRel) {
            Some(self.brightness())
        } else {
            None
        }
    }

    /// Request a device restart.
    pub fn request_reboot(&self, mode: RebootMode) {
        let code = match mode {
            RebootMode::Normal => 1,
            RebootMode::Bootloader => 2,
        };
        self.reboot.store(code, Ordering::Release);
    }

    /// Pending restart request, if any.
    #[must_use]
    pub fn reboot_requested(&self) -> Option<RebootMode> {
        match self.reboot.load(Ordering::Acquire) {
            1 => Some(RebootMode::Normal),
            2 => Some(RebootMode::Bootloader),
            _ => None,
        }
    }
}
