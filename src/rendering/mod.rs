//! Rendering of the signature card: layout, display list and rasterization.

pub mod layout;
pub mod paint;
pub mod raster;

use crate::region::Region;
use crate::Result;

/// An 8-bit RGBA colour (straight alpha).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

impl Rgba {
    pub const WHITE: Rgba = Rgba(255, 255, 255, 255);

    /// Parse `#rgb` or `#rrggbb`.
    pub fn parse_hex(s: &str) -> Option<Rgba> {
        let hex = s.trim().strip_prefix('#')?;
        let digit = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
        match hex.len() {
            3 => Some(Rgba(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17, 255)),
            6 => {
                let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
                Some(Rgba(byte(0)?, byte(2)?, byte(4)?, 255))
            }
            _ => None,
        }
    }

    pub fn with_alpha(self, alpha: f32) -> Rgba {
        Rgba(self.0, self.1, self.2, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

/// How the rasterizer is asked to capture a region.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    /// Linear magnification relative to the displayed size
    pub scale: f32,
    /// Opaque fill behind the region
    pub background: Rgba,
    /// Honour `crossorigin` so CORS-approved images stay readable
    pub use_cors: bool,
    /// Draw images that would taint the canvas instead of failing
    pub allow_taint: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 8.0,
            background: Rgba::WHITE,
            use_cors: true,
            allow_taint: false,
        }
    }
}

/// An off-screen capture: straight RGBA rows, top to bottom.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        self.pixels.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }

    pub fn is_opaque(&self) -> bool {
        self.pixels.chunks_exact(4).all(|p| p[3] == 255)
    }
}

/// Encoded capture ready for delivery.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub png_data: Vec<u8>,
}

impl Screenshot {
    /// Hex SHA-256 of the encoded bytes.
    pub fn digest(&self) -> String {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(&self.png_data))
    }
}

/// Turns a region into a bitmap.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, region: &Region, options: &RasterOptions) -> Result<Bitmap>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colours() {
        assert_eq!(Rgba::parse_hex("#00b3e3"), Some(Rgba(0, 0xb3, 0xe3, 255)));
        assert_eq!(Rgba::parse_hex("#fff"), Some(Rgba::WHITE));
        assert_eq!(Rgba::parse_hex("00b3e3"), None);
        assert_eq!(Rgba::parse_hex("#zzzzzz"), None);
    }

    #[test]
    fn bitmap_opacity() {
        let mut b = Bitmap { width: 1, height: 2, pixels: vec![255; 8] };
        assert!(b.is_opaque());
        b.pixels[7] = 0;
        assert!(!b.is_opaque());
        assert_eq!(b.pixel(0, 1), Some([255, 255, 255, 0]));
        assert_eq!(b.pixel(1, 0), None);
    }
}
