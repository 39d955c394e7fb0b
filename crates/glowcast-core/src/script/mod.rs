//! Script hosting.
//!
//! [`ScriptHost`] owns the Lua engine behind a mutex so the network
//! context can swap scripts while the render context keeps drawing.
//! Loading raises a flag and waits out a short grace period before
//! touching the engine, so a frame already being rendered finishes on
//! the old script. Scripts that blow the per-frame wall-clock budget
//! are unloaded rather than allowed to stall the panel.

mod builtins;
mod lua;

pub use builtins::{BUILTINS, Builtin, by_index as builtin_by_index};

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use glowcast_proto::Board;

use crate::error::ScriptError;
use lua::LuaEngine;

/// Longest a single scripted frame may take before the script is dropped.
pub const RENDER_BUDGET: Duration = Duration::from_millis(500);

/// Settle time between raising the loading flag and mutating the engine.
const LOAD_GRACE: Duration = Duration::from_millis(50);

/// Owns the scripting engine shared between both execution contexts.
#[derive(Debug)]
pub struct ScriptHost {
    board: Board,
    engine: Mutex<Option<LuaEngine>>,
    /// True while a load is replacing the engine
    loading: AtomicBool,
    /// True when an engine is installed and runnable
    loaded: AtomicBool,
    /// Name of the running script, and the last failure if any
    status: Mutex<HostStatus>,
}

#[derive(Debug, Default, Clone)]
struct HostStatus {
    name: Option<String>,
    error: Option<String>,
}

/// Snapshot of the host for status reporting.
#[derive(Debug, Clone)]
pub struct ScriptStatus {
    /// Whether a script is installed and runnable
    pub loaded: bool,
    /// Whether a load is currently in flight
    pub loading: bool,
    /// Name of the running script, if any
    pub name: Option<String>,
    /// Most recent load or runtime failure, if any
    pub error: Option<String>,
}

impl ScriptHost {
    /// Create an empty host for one panel.
    #[must_use]
    pub fn new(board: Board) -> Self {
        Self {
            board,
            engine: Mutex::new(None),
            loading: AtomicBool::new(false),
            loaded: AtomicBool::new(false),
            status: Mutex::new(HostStatus::default()),
        }
    }

    /// Whether a script is installed and not mid-replacement.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire) && !self.loading.load(Ordering::Acquire)
    }

    /// Compile `source` and install it, replacing any running script.
    ///
    /// On failure the previous script stays unloaded and the error is
    /// retained for status queries.
    pub fn load(&self, name: &str, source: &str) -> Result<(), ScriptError> {
        self.loading.store(true, Ordering::Release);
        if self.loaded.load(Ordering::Acquire) {
            // Let a frame already rendering on the old script finish.
            std::thread::sleep(LOAD_GRACE);
        }

        match LuaEngine::load(self.board, source) {
            Ok(engine) => {
                *self.lock_engine() = Some(engine);
                self.loaded.store(true, Ordering::Release);
                self.set_status(Some(name.to_owned()), None);
                self.loading.store(false, Ordering::Release);
                Ok(())
            }
            Err(err) => {
                *self.lock_engine() = None;
                self.loaded.store(false, Ordering::Release);
                self.set_status(None, Some(err.to_string()));
                self.loading.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    /// Load one of the shipped effects by index.
    pub fn load_builtin(&self, index: usize) -> Result<(), ScriptError> {
        let builtin = builtins::by_index(index)?;
        self.load(builtin.name, builtin.source)
    }

    /// Drop the running script, if any.
    pub fn unload(&self) {
        self.loading.store(true, Ordering::Release);
        *self.lock_engine() = None;
        self.loaded.store(false, Ordering::Release);
        self.set_status(None, None);
        self.loading.store(false, Ordering::Release);
    }

    /// Forward a named integer parameter to the running script.
    pub fn set_param(&self, name: &str, value: i64) -> Result<(), ScriptError> {
        let engine = self.lock_engine();
        engine
            .as_ref()
            .ok_or(ScriptError::NotLoaded)?
            .set_param(name, value)
    }

    /// Read a named integer parameter back from the running script.
    pub fn get_param(&self, name: &str) -> Result<Option<i64>, ScriptError> {
        let engine = self.lock_engine();
        engine
            .as_ref()
            .ok_or(ScriptError::NotLoaded)?
            .get_param(name)
    }

    /// Render one scripted frame into `out`.
    ///
    /// A runtime failure or a budget overrun unloads the script so the
    /// render loop falls back to the held frame.
    pub fn render(
        &self,
        t: f64,
        frame: u64,
        dt: f64,
        out: &mut [u8],
    ) -> Result<(), ScriptError> {
        if !self.is_loaded() {
            return Err(ScriptError::NotLoaded);
        }

        let started = Instant::now();
        let result = {
            let engine = self.lock_engine();
            match engine.as_ref() {
                Some(engine) => engine.render(t, frame, dt, out),
                None => return Err(ScriptError::NotLoaded),
            }
        };
        let elapsed = started.elapsed();

        if let Err(err) = result {
            self.fail(err.to_string());
            return Err(err);
        }

        if elapsed > RENDER_BUDGET {
            let err = ScriptError::BudgetExceeded {
                elapsed_ms: elapsed.as_millis() as u64,
                budget_ms: RENDER_BUDGET.as_millis() as u64,
            };
            self.fail(err.to_string());
            return Err(err);
        }

        Ok(())
    }

    /// Current host state for status reporting.
    #[must_use]
    pub fn status(&self) -> ScriptStatus {
        let status = self
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        ScriptStatus {
            loaded: self.loaded.load(Ordering::Acquire),
            loading: self.loading.load(Ordering::Acquire),
            name: status.name,
            error: status.error,
        }
    }

    fn fail(&self, message: String) {
        *self.lock_engine() = None;
        self.loaded.store(false, Ordering::Release);
        self.set_status(None, Some(message));
    }

    fn set_status(&self, name: Option<String>, error: Option<String>) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        status.name = name;
        status.error = error;
    }

    fn lock_engine(&self) -> std::sync::MutexGuard<'_, Option<LuaEngine>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
