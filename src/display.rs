//! Display surfaces the selection affordance is presented on.

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::types::{Point, Rect};

/// One active display. `x`/`y` are the global-space top-left, size is in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplaySurface {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
}

impl DisplaySurface {
    pub fn new(id: u32, x: i32, y: i32, width: u32, height: u32, scale_factor: f64) -> Self {
        Self {
            id,
            x,
            y,
            width,
            height,
            scale_factor,
        }
    }

    /// Global-space bounds of this surface.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x as f64, self.y as f64, self.width as f64, self.height as f64)
    }
}

/// Snapshot of every active display, taken once at the start of a capture attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplaySurfaceSet {
    surfaces: Vec<DisplaySurface>,
}

impl DisplaySurfaceSet {
    /// Fails with `NoDisplays` when the list is empty or a surface has a
    /// non-positive scale factor.
    pub fn new(surfaces: Vec<DisplaySurface>) -> Result<Self, CaptureError> {
        if surfaces.is_empty() {
            return Err(CaptureError::NoDisplays);
        }
        if surfaces
            .iter()
            .any(|s| !(s.scale_factor.is_finite() && s.scale_factor > 0.0))
        {
            return Err(CaptureError::NoDisplays);
        }
        Ok(Self { surfaces })
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&DisplaySurface, CaptureError> {
        self.surfaces
            .get(index)
            .ok_or(CaptureError::InvalidSurface(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplaySurface> {
        self.surfaces.iter()
    }

    /// Index of the surface whose global bounds contain `point`.
    pub fn index_at(&self, point: Point) -> Option<usize> {
        self.surfaces.iter().position(|s| s.bounds().contains(point))
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn dual() -> DisplaySurfaceSet {
        DisplaySurfaceSet::new(vec![
            DisplaySurface::new(0, 0, 0, 1920, 1080, 1.0),
            DisplaySurface::new(1, 1920, 0, 1920, 1080, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_empty_and_bad_scale() {
        assert_eq!(DisplaySurfaceSet::new(vec![]), Err(CaptureError::NoDisplays));
        let bad = DisplaySurface::new(0, 0, 0, 100, 100, 0.0);
        assert_eq!(DisplaySurfaceSet::new(vec![bad]), Err(CaptureError::NoDisplays));
    }

    #[test]
    fn index_at_finds_second_monitor() {
        let set = dual();
        assert_eq!(set.index_at(Point::new(10.0, 10.0)), Some(0));
        assert_eq!(set.index_at(Point::new(1920.0, 500.0)), Some(1));
        assert_eq!(set.index_at(Point::new(3840.0, 500.0)), None);
    }

    #[test]
    fn get_out_of_range_is_invalid_surface() {
        assert_eq!(dual().get(2), Err(CaptureError::InvalidSurface(2)));
    }
}
