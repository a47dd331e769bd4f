//! # Blob detector
//!
//! A minimal target detector for grayscale frames: the target is the bounding
//! box of every pixel brighter than a threshold. Good enough for the
//! simulated vehicle, whose target is a bright square on a dark background,
//! and for bench testing with a light source.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use link_if::{DetectionResult, Detector, Frame};
use log::trace;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Brightness threshold detector.
#[derive(Debug, Clone)]
pub struct BlobDetector {
    /// Pixels strictly brighter than this belong to the target.
    threshold: u8,

    /// Fewer bright pixels than this is treated as no target.
    min_pixels: u32,
}

/// Bounding box accumulator, inclusive on both ends.
#[derive(Debug, Clone, Copy)]
struct BoundingBox {
    x_min: u32,
    y_min: u32,
    x_max: u32,
    y_max: u32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BlobDetector {
    pub fn new(threshold: u8, min_pixels: u32) -> Self {
        Self {
            threshold,
            min_pixels: min_pixels.max(1),
        }
    }
}

impl Detector for BlobDetector {
    fn detect(&mut self, frame: &Frame) -> DetectionResult {
        if frame.width == 0 {
            return DetectionResult::NONE;
        }

        let mut bbox: Option<BoundingBox> = None;
        let mut count = 0u32;

        for (i, p) in frame.pixels.iter().enumerate() {
            if *p <= self.threshold {
                continue;
            }

            let x = (i as u32) % frame.width;
            let y = (i as u32) / frame.width;
            count += 1;

            bbox = Some(match bbox {
                Some(b) => b.extend(x, y),
                None => BoundingBox::point(x, y),
            });
        }

        match bbox {
            Some(b) if count >= self.min_pixels => {
                let det = b.to_detection();
                trace!("Frame {}: {} bright pixels, {:?}", frame.seq, count, det);
                det
            }
            _ => DetectionResult::NONE,
        }
    }
}

impl BoundingBox {
    fn point(x: u32, y: u32) -> Self {
        Self {
            x_min: x,
            y_min: y,
            x_max: x,
            y_max: y,
        }
    }

    fn extend(self, x: u32, y: u32) -> Self {
        Self {
            x_min: self.x_min.min(x),
            y_min: self.y_min.min(y),
            x_max: self.x_max.max(x),
            y_max: self.y_max.max(y),
        }
    }

    /// Centre is `(x + w/2, y + h/2)` in integer pixels, area is `w * h`.
    fn to_detection(self) -> DetectionResult {
        let w = (self.x_max - self.x_min + 1) as i32;
        let h = (self.y_max - self.y_min + 1) as i32;

        DetectionResult::new(
            self.x_min as i32 + w / 2,
            self.y_min as i32 + h / 2,
            w * h,
        )
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
