//! Display targets.
//!
//! The render loop hands finished frames to a [`Display`]. The terminal
//! target draws two pixel rows per text row with the upper-half-block
//! glyph and 24-bit ANSI colors; the null target discards frames and
//! exists for headless runs and tests.

use std::io::Write;

use glowcast_proto::Board;

/// Sink for rendered frames.
pub trait Display: Send {
    /// Present one frame. `pixels` is row-major RGB sized for `board`;
    /// `brightness` is `0.0..=1.0` and applied by the target.
    fn render(&mut self, board: &Board, pixels: &[u8], brightness: f32) -> std::io::Result<()>;
}

/// Draws frames into the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalDisplay {
    started: bool,
}

impl TerminalDisplay {
    /// New terminal target; takes over the screen on the first frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn scale(channel: u8, brightness: f32) -> u8 {
    (f32::from(channel) * brightness.clamp(0.0, 1.0)) as u8
}

impl Display for TerminalDisplay {
    fn render(&mut self, board: &Board, pixels: &[u8], brightness: f32) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();
        if !self.started {
            // Hide the cursor and clear once; later frames just repaint.
            out.write_all(b"\x1b[?25l\x1b[2J")?;
            self.started = true;
        }
        out.write_all(b"\x1b[H")?;

        let width = usize::from(board.width);
        let mut text = String::with_capacity(width * 40);
        let pixel = |x: usize, y: usize| -> [u8; 3] {
            let base = (y * width + x) * 3;
            [
                scale(pixels[base], brightness),
                scale(pixels[base + 1], brightness),
                scale(pixels[base + 2], brightness),
            ]
        };

        // Two pixel rows per text row via the upper-half block.
        for y in (0..usize::from(board.height)).step_by(2) {
            text.clear();
            for x in 0..width {
                let top = pixel(x, y);
                let bottom = if y + 1 < usize::from(board.height) {
                    pixel(x, y + 1)
                } else {
                    [0, 0, 0]
                };
                text.push_str(&format!(
                    "\x1b[38;2;{};{};{}m\x1b[48;2;{};{};{}m\u{2580}",
                    top[0], top[1], top[2], bottom[0], bottom[1], bottom[2]
                ));
            }
            text.push_str("\x1b[0m\r\n");
            out.write_all(text.as_bytes())?;
        }
        out.flush()
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        if self.started {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(b"\x1b[0m\x1b[?25h\n");
            let _ = out.flush();
        }
    }
}

/// Discards frames.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn render(&mut self, _board: &Board, _pixels: &[u8], _brightness: f32) -> std::io::Result<()> {
        Ok(())
    }
}
