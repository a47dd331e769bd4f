//! # Camera frames and target detection

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single 8-bit grayscale camera frame.
///
/// Pixels are stored row-major, `pixels[y * width + x]`.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Sequence number assigned by the source
    pub seq: u64,

    pub width: u32,

    pub height: u32,

    pub pixels: Vec<u8>,
}

/// The target found in a frame.
///
/// The all-zero value ([`DetectionResult::NONE`]) means no target was found.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Centre of the target in pixels, `(x, y)` with the origin in the top
    /// left of the frame.
    pub center: (i32, i32),

    /// Area of the target's bounding box in pixels.
    pub area: i32,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Finds at most one target in a frame.
///
/// Detection never fails, if nothing is found the detector returns
/// [`DetectionResult::NONE`].
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> DetectionResult;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Frame {
    /// Create a black frame of the given size.
    pub fn blank(seq: u64, width: u32, height: u32) -> Self {
        Self {
            seq,
            width,
            height,
            pixels: vec![0; (width * height) as usize],
        }
    }

    /// Get the pixel at `(x, y)`, or `None` if outside the frame.
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }
}

impl DetectionResult {
    /// The "no target" sentinel.
    pub const NONE: DetectionResult = DetectionResult {
        center: (0, 0),
        area: 0,
    };

    pub fn new(x: i32, y: i32, area: i32) -> Self {
        Self {
            center: (x, y),
            area,
        }
    }

    /// True if this is the no target sentinel.
    pub fn is_none(&self) -> bool {
        self.area == 0
    }
}
