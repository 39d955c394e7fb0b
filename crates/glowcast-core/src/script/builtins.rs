//! Built-in effect scripts.
//!
//! These ship with the device so a panel shows something interesting
//! without any upload. They are ordinary scripts run through the same
//! engine as user uploads, selectable by index over HTTP.

use crate::error::ScriptError;

/// One shipped effect.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    /// Human-readable effect name
    pub name: &'static str,
    /// Lua source
    pub source: &'static str,
}

/// All shipped effects, index-addressable.
pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "plasma",
        source: PLASMA,
    },
    Builtin {
        name: "fire",
        source: FIRE,
    },
    Builtin {
        name: "gradient",
        source: GRADIENT,
    },
    Builtin {
        name: "sparkle",
        source: SPARKLE,
    },
    Builtin {
        name: "hypercube",
        source: HYPERCUBE,
    },
    Builtin {
        name: "scan",
        source: SCAN,
    },
];

/// Look up a shipped effect by index.
pub fn by_index(index: usize) -> Result<Builtin, ScriptError> {
    BUILTINS
        .get(index)
        .copied()
        .ok_or(ScriptError::UnknownBuiltin(index))
}

const PLASMA: &str = r"
    function shader(x, y, t, frame, dt)
        local v = math.sin(x / 4 + t)
            + math.sin(y / 3 - t * 0.7)
            + math.sin((x + y) / 5 + t * 1.3)
        local r = 128 + 127 * math.sin(v * math.pi)
        local g = 128 + 127 * math.sin(v * math.pi + 2)
        local b = 128 + 127 * math.sin(v * math.pi + 4)
        return r, g, b
    end
";

const FIRE: &str = r"
    function shader(x, y, t, frame, dt)
        local flicker = math.sin(x * 1.7 + t * 9) * math.sin(y * 0.9 - t * 6)
        local heat = (HEIGHT - y) / HEIGHT + 0.25 * flicker
        heat = math.clamp(heat, 0, 1)
        return 255 * heat, 110 * heat * heat, 12 * heat * heat * heat
    end
";

const GRADIENT: &str = r"
    function shader(x, y, t, frame, dt)
        local phase = (x / WIDTH + t * 0.1) % 1
        return rgb(255 * phase, 255 * (y / HEIGHT), 255 * (1 - phase))
    end
";

const SPARKLE: &str = r"
    function shader(x, y, t, frame, dt)
        local seed = math.sin(x * 127.1 + y * 311.7 + math.floor(t * 4)) * 43758.5453
        local n = seed - math.floor(seed)
        if n > 0.97 then
            return 255, 255, 255
        end
        return 8, 8, 24
    end
";

const HYPERCUBE: &str = r"
    rotation_mode = 0

    function shader(x, y, t, frame, dt)
        local cx = x - WIDTH / 2 + 0.5
        local cy = y - HEIGHT / 2 + 0.5
        local a = t * 0.6
        if rotation_mode == 1 then
            a = -a
        elseif rotation_mode == 2 then
            a = math.sin(t) * 1.5
        end
        local rx = cx * math.cos(a) - cy * math.sin(a)
        local ry = cx * math.sin(a) + cy * math.cos(a)
        local edge = math.max(math.abs(rx), math.abs(ry))
        local ring = math.abs(math.sin(edge - t * 2))
        if ring > 0.85 then
            return 64 + 191 * ring, 32, 255 * ring
        end
        return 4, 2, 16
    end
";

const SCAN: &str = r"
    function render_frame(width, height, t, frame, dt)
        local r, g, b = {}, {}, {}
        local row = frame % height
        for x = 0, width - 1 do
            local i = row * width + x
            r[i] = 40
            g[i] = 255
            b[i] = 90
        end
        return r, g, b
    end
";
