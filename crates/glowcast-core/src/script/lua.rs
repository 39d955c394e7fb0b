//! Lua execution engine.
//!
//! Each loaded script gets a fresh interpreter with a small set of
//! intrinsics installed (`math.clamp`, a global `rgb` helper, and the
//! panel dimensions as `WIDTH`/`HEIGHT`). A script declares one of two
//! entry points:
//!
//! * `render_frame(width, height, t, frame, dt)` returning three tables
//!   mapping 0-based pixel index to a channel value, or
//! * `shader(x, y, t, frame, dt)` returning `(r, g, b)` for one pixel.
//!
//! Missing channel values are treated as zero; everything is clamped to
//! `0..=255` before it reaches the frame buffer.

use glowcast_proto::Board;
use mlua::{Function, Lua, Table};

use crate::error::ScriptError;

/// Which entry point the script declared.
enum EntryPoint {
    /// `render_frame` fills the whole frame at once
    WholeFrame(Function),
    /// `shader` is invoked once per pixel
    PerPixel(Function),
}

impl std::fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WholeFrame(_) => f.write_str("WholeFrame"),
            Self::PerPixel(_) => f.write_str("PerPixel"),
        }
    }
}

/// One compiled script bound to its interpreter.
pub(crate) struct LuaEngine {
    lua: Lua,
    entry: EntryPoint,
    board: Board,
}

impl std::fmt::Debug for LuaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaEngine")
            .field("entry", &self.entry)
            .field("board", &self.board)
            .finish_non_exhaustive()
    }
}

impl LuaEngine {
    /// Compile and run `source` to define its entry point.
    pub(crate) fn load(board: Board, source: &str) -> Result<Self, ScriptError> {
        let lua = Lua::new();
        install_intrinsics(&lua, board)?;

        match lua.load(source).set_name("script").exec() {
            Ok(()) => {}
            Err(mlua::Error::SyntaxError { message, .. }) => {
                return Err(ScriptError::Parse(message));
            }
            Err(err) => return Err(ScriptError::Load(err.to_string())),
        }

        let globals = lua.globals();
        let entry = if let Ok(func) = globals.get::<Function>("render_frame") {
            EntryPoint::WholeFrame(func)
        } else if let Ok(func) = globals.get::<Function>("shader") {
            EntryPoint::PerPixel(func)
        } else {
            return Err(ScriptError::NoEntryPoint);
        };

        Ok(Self { lua, entry, board })
    }

    /// Set a named integer global, e.g. an effect parameter.
    pub(crate) fn set_param(&self, name: &str, value: i64) -> Result<(), ScriptError> {
        self.lua
            .globals()
            .set(name, value)
            .map_err(|err| ScriptError::Runtime(err.to_string()))
    }

    /// Read a named integer global back, `None` when unset.
    pub(crate) fn get_param(&self, name: &str) -> Result<Option<i64>, ScriptError> {
        self.lua
            .globals()
            .get(name)
            .map_err(|err| ScriptError::Runtime(err.to_string()))
    }

    /// Render one frame into `out` (RGB, row-major).
    pub(crate) fn render(
        &self,
        t: f64,
        frame: u64,
        dt: f64,
        out: &mut [u8],
    ) -> Result<(), ScriptError> {
        let width = i64::from(self.board.width);
        let height = i64::from(self.board.height);
        let frame = frame as i64;

        match &self.entry {
            EntryPoint::WholeFrame(func) => {
                let (r_map, g_map, b_map) = func
                    .call::<(Table, Table, Table)>((width, height, t, frame, dt))
                    .map_err(|err| ScriptError::Runtime(err.to_string()))?;
                for index in 0..self.board.pixel_count() {
                    let key = index as i64;
                    let r = channel(&r_map, key)?;
                    let g = channel(&g_map, key)?;
                    let b = channel(&b_map, key)?;
                    let base = index * 3;
                    out[base] = r;
                    out[base + 1] = g;
                    out[base + 2] = b;
                }
            }
            EntryPoint::PerPixel(func) => {
                let mut base = 0;
                for y in 0..height {
                    for x in 0..width {
                        let (r, g, b) = func
                            .call::<(Option<f64>, Option<f64>, Option<f64>)>((
                                x, y, t, frame, dt,
                            ))
                            .map_err(|err| ScriptError::Runtime(err.to_string()))?;
                        out[base] = to_channel(r.unwrap_or(0.0));
                        out[base + 1] = to_channel(g.unwrap_or(0.0));
                        out[base + 2] = to_channel(b.unwrap_or(0.0));
                        base += 3;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Read one channel value from a 0-indexed map table, nil meaning zero.
fn channel(map: &Table, key: i64) -> Result<u8, ScriptError> {
    let value: Option<f64> = map
        .get(key)
        .map_err(|err| ScriptError::Runtime(err.to_string()))?;
    Ok(to_channel(value.unwrap_or(0.0)))
}

/// Clamp a script-provided channel value into `0..=255`.
fn to_channel(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

/// Install `math.clamp`, the `rgb` helper, and the panel dimensions.
fn install_intrinsics(lua: &Lua, board: Board) -> Result<(), ScriptError> {
    let wrap = |err: mlua::Error| ScriptError::Load(err.to_string());

    let globals = lua.globals();
    globals.set("WIDTH", i64::from(board.width)).map_err(wrap)?;
    globals
        .set("HEIGHT", i64::from(board.height))
        .map_err(wrap)?;

    let clamp = lua
        .create_function(|_, (value, lo, hi): (f64, f64, f64)| Ok(value.clamp(lo, hi)))
        .map_err(wrap)?;
    let math: Table = globals.get("math").map_err(wrap)?;
    math.set("clamp", clamp).map_err(wrap)?;

    let rgb = lua
        .create_function(|_, (r, g, b): (f64, f64, f64)| Ok((r, g, b)))
        .map_err(wrap)?;
    globals.set("rgb", rgb).map_err(wrap)?;

    Ok(())
}
