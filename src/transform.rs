//! Conversion between the three coordinate systems a selection passes through.
//!
//! * local UI space: per display, origin top-left of the selection surface, Y down
//! * global capture space: what the platform capture primitive consumes. X is offset by the
//!   display origin, Y is flipped against the display height (bottom-left origin per display)
//!   and offset by the display origin.
//! * pixel space: the returned buffer, local points multiplied by `scale_factor`
//!
//! The capture primitive works in points, so `scale_factor` is never applied to the rectangle
//! handed to it. It only converts returned buffers back into point metadata.

use crate::display::DisplaySurface;
use crate::error::CaptureError;
use crate::types::{Rect, Region};

/// Selections narrower or shorter than this many points are unusable.
pub const DEFAULT_MIN_SELECTION: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    min_selection: f64,
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SELECTION)
    }
}

impl CoordinateTransform {
    pub fn new(min_selection: f64) -> Self {
        Self { min_selection }
    }

    /// Map a local UI rectangle drawn on `surface` into global capture space.
    pub fn to_global(&self, local: Rect, surface: &DisplaySurface) -> Result<Rect, CaptureError> {
        self.check_size(&local)?;
        let global = Rect {
            x: local.x + surface.x as f64,
            y: surface.height as f64 - local.y - local.height + surface.y as f64,
            width: local.width,
            height: local.height,
        };
        self.check_size(&global)?;
        Ok(global)
    }

    /// Inverse of [`to_global`](Self::to_global). Never fails.
    pub fn to_local(&self, global: Rect, surface: &DisplaySurface) -> Rect {
        Rect {
            x: global.x - surface.x as f64,
            y: surface.height as f64 - (global.y - surface.y as f64) - global.height,
            width: global.width,
            height: global.height,
        }
    }

    fn check_size(&self, rect: &Rect) -> Result<(), CaptureError> {
        let usable = rect.is_finite()
            && rect.width > 0.0
            && rect.height > 0.0
            && rect.width >= self.min_selection
            && rect.height >= self.min_selection;
        if usable {
            Ok(())
        } else {
            Err(CaptureError::DegenerateSelection {
                width: rect.width,
                height: rect.height,
            })
        }
    }
}

/// Pixel crop of a local rectangle inside that surface's captured buffer.
pub fn local_to_pixels(local: Rect, scale_factor: f64) -> Region {
    Rect {
        x: (local.x * scale_factor).max(0.0),
        y: (local.y * scale_factor).max(0.0),
        width: local.width * scale_factor,
        height: local.height * scale_factor,
    }
    .to_region()
}

/// Point-space size of a pixel buffer.
pub fn pixels_to_points(width: u32, height: u32, scale_factor: f64) -> (f64, f64) {
    (width as f64 / scale_factor, height as f64 / scale_factor)
}
