//! Board descriptors.
//!
//! Every buffer size and index bound in the pipeline derives from the
//! active board's dimensions. Known panels range from 8×4 to 53×11 to
//! 32×32, so nothing may assume a square or a fixed 1024-pixel count.

/// Physical panel description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    /// Panel width in pixels
    pub width: u16,
    /// Panel height in pixels
    pub height: u16,
    /// Human-readable model name
    pub name: &'static str,
}

impl Board {
    /// 32×32 flagship panel.
    pub const COSMIC: Self = Self { width: 32, height: 32, name: "Cosmic" };
    /// 53×11 wide panel.
    pub const GALACTIC: Self = Self { width: 53, height: 11, name: "Galactic" };
    /// 16×16 panel.
    pub const HD: Self = Self { width: 16, height: 16, name: "HD" };
    /// 8×4 pack panel.
    pub const PACK: Self = Self { width: 8, height: 4, name: "Pack" };

    /// Total addressable pixels.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    /// Byte length of one full RGB frame.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        self.pixel_count() * 3
    }

    /// Look up a board by (case-insensitive) model name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cosmic" => Some(Self::COSMIC),
            "galactic" => Some(Self::GALACTIC),
            "hd" => Some(Self::HD),
            "pack" => Some(Self::PACK),
            _ => None,
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::COSMIC
    }
}
