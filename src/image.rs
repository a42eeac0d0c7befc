//! Grayscale image data consumed opaquely from the decode pipeline.
//!
//! The engine performs no pixel interpretation. Decoded images arrive as
//! packed sample rows plus their geometry and are stored verbatim inside
//! an image XObject stream.

use crate::error::Result;

/// Decoded image data handed over by an image collaborator.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bits per grayscale sample (1, 2, 4 or 8)
    pub bits_per_component: u8,
    /// Row-packed grayscale samples
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// Create image data from decoded pixels.
    pub fn new(width: u32, height: u32, bits_per_component: u8, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            bits_per_component,
            pixels,
        }
    }

    /// Display width in points, assuming the fixed 300 dpi scan scale.
    pub fn display_width(&self) -> i32 {
        (self.width as i64 * 1000 / 4166) as i32
    }

    /// Display height in points, assuming the fixed 300 dpi scan scale.
    pub fn display_height(&self) -> i32 {
        (self.height as i64 * 1000 / 4166) as i32
    }
}

/// Collaborator seam for loading and decoding picture files.
///
/// The text converter resolves inline image directives through this
/// trait; a failing load is logged and only that directive is skipped.
pub trait ImageSource {
    /// Load and decode the named picture into grayscale samples.
    fn load(&mut self, path: &str) -> Result<ImageData>;
}
