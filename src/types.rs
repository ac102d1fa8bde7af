use serde::{Deserialize, Serialize};

/// A point in some 2D pixel/point space. Which space is implied by context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned rectangle with a top-left origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Bounding rectangle of a drag between two points, independent of drag direction.
    pub fn from_points(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Round to the integer pixel grid.
    pub fn to_region(&self) -> Region {
        Region {
            x: self.x.round() as i32,
            y: self.y.round() as i32,
            width: self.width.round().max(0.0) as u32,
            height: self.height.round().max(0.0) as u32,
        }
    }
}

/// Integer pixel rectangle handed to the capture primitive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl From<Region> for Rect {
    fn from(r: Region) -> Self {
        Rect::new(r.x as f64, r.y as f64, r.width as f64, r.height as f64)
    }
}

/// Capture mode: drag a region, pick a window, grab the whole screen, or scroll-stitch a window
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    #[default]
    Area,
    Window,
    Fullscreen,
    Scrolling,
}

impl CaptureMode {
    /// Modes that need a window candidate list before the selection affordance appears.
    pub fn needs_candidates(self) -> bool {
        matches!(self, CaptureMode::Window | CaptureMode::Scrolling)
    }
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CaptureMode::Area => "area",
            CaptureMode::Window => "window",
            CaptureMode::Fullscreen => "fullscreen",
            CaptureMode::Scrolling => "scrolling",
        };
        f.write_str(name)
    }
}

/// Opaque RGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Rgb = Rgb(255, 59, 48);
    pub const YELLOW: Rgb = Rgb(255, 204, 0);
    pub const NEUTRAL_GRAY: Rgb = Rgb(128, 128, 128);

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.0, self.1, self.2, 255])
    }
}
