//! Flattens an annotation sequence onto a captured bitmap.
//!
//! Rendering is a pure function of `(base image, annotations)`: each call starts
//! from a fresh copy of the base and paints entries in sequence order, so the
//! same input always yields the same bytes.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use ab_glyph::{FontVec, PxScale, VariableFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut, draw_text_mut,
};
use imageproc::point::Point as PolyPoint;
use imageproc::rect::Rect as PixelRect;

use crate::annotation::{Annotation, AnnotationKind};
use crate::config::AppConfig;
use crate::screenshot::Screenshot;
use crate::types::{Point, Rect, Rgb};

/// Highlight opacity, in thousandths.
const HIGHLIGHT_ALPHA: u32 = 300;
/// Blur placeholder opacity, in thousandths.
const BLUR_ALPHA: u32 = 500;
const ARROW_HEAD_BASE: f64 = 15.0;
const ARROW_HEAD_ANGLE: f64 = std::f64::consts::PI / 6.0;
pub const DEFAULT_TEXT_SIZE: f32 = 20.0;
/// `wght` axis value applied to variable fonts.
const MEDIUM_WEIGHT: f32 = 500.0;
/// Half stroke widths are capped here so pixel coordinates stay well inside `i32`.
const MAX_HALF_STROKE: f64 = 65_536.0;

/// Font candidates tried when no font is configured. Medium and semibold faces
/// come first; regular faces are the fallback on systems that ship nothing heavier.
#[cfg(target_os = "macos")]
const SYSTEM_FONTS: &[&str] = &[
    "/System/Library/Fonts/SFNS.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/System/Library/Fonts/PingFang.ttc",
];
#[cfg(target_os = "windows")]
const SYSTEM_FONTS: &[&str] = &[
    "C:\\Windows\\Fonts\\seguisb.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/noto/NotoSans-Medium.ttf",
    "/usr/share/fonts/noto/NotoSans-Medium.ttf",
    "/usr/share/fonts/truetype/ubuntu/Ubuntu-M.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
];

/// Load the text font: `preferred` first, then the platform's system fonts.
/// Variable fonts (SF on macOS) are pinned to medium weight.
pub fn load_font(preferred: Option<&Path>) -> Option<FontVec> {
    let candidates = preferred
        .into_iter()
        .map(Path::to_path_buf)
        .chain(SYSTEM_FONTS.iter().map(|p| Path::new(p).to_path_buf()));

    for path in candidates {
        let Ok(data) = std::fs::read(&path) else {
            continue;
        };
        match FontVec::try_from_vec(data) {
            Ok(mut font) => {
                if font.set_variation(b"wght", MEDIUM_WEIGHT) {
                    log::debug!("[compose] pinned variable font to weight {}", MEDIUM_WEIGHT);
                }
                log::debug!("[compose] using font {:?}", path);
                return Some(font);
            }
            Err(e) => log::warn!("[compose] {:?} is not a usable font: {}", path, e),
        }
    }
    None
}

/// The two chevron leg endpoints of an arrow head at `end`.
///
/// Head length is `15 + stroke_width`; each leg is the reversed shaft direction
/// rotated by 30 degrees either way.
pub fn arrow_head(start: Point, end: Point, stroke_width: f32) -> [Point; 2] {
    let angle = (end.y - start.y).atan2(end.x - start.x);
    let length = ARROW_HEAD_BASE + stroke_width as f64;
    let leg = |theta: f64| {
        Point::new(
            end.x - length * theta.cos(),
            end.y - length * theta.sin(),
        )
    };
    [leg(angle - ARROW_HEAD_ANGLE), leg(angle + ARROW_HEAD_ANGLE)]
}

#[derive(Clone)]
pub struct CompositingEngine {
    font: Option<Arc<FontVec>>,
    text_size: f32,
}

impl std::fmt::Debug for CompositingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositingEngine")
            .field("has_font", &self.font.is_some())
            .field("text_size", &self.text_size)
            .finish()
    }
}

impl CompositingEngine {
    pub fn new(font: Option<FontVec>, text_size: f32) -> Self {
        Self {
            font: font.map(Arc::new),
            text_size,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let font = load_font(config.font_path.as_deref());
        if font.is_none() {
            log::warn!("[compose] no font found; text annotations will be skipped");
        }
        Self::new(font, config.text_size)
    }

    /// Engine that renders everything except text.
    pub fn without_font() -> Self {
        Self::new(None, DEFAULT_TEXT_SIZE)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Paint `annotations` in order onto a copy of `base`.
    pub fn render(&self, base: &RgbaImage, annotations: &[Annotation]) -> RgbaImage {
        let started = Instant::now();
        let mut canvas = base.clone();
        for annotation in annotations {
            self.paint(&mut canvas, annotation);
        }
        log::debug!(
            "[compose] rendered {} annotations in {}ms",
            annotations.len(),
            started.elapsed().as_millis()
        );
        canvas
    }

    pub fn render_screenshot(&self, screenshot: &Screenshot) -> RgbaImage {
        self.render(screenshot.image(), &screenshot.annotations)
    }

    /// Render on the blocking pool from a frozen snapshot.
    pub async fn render_async(
        &self,
        base: Arc<RgbaImage>,
        annotations: Arc<[Annotation]>,
    ) -> Result<RgbaImage, tokio::task::JoinError> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.render(&base, &annotations)).await
    }

    fn paint(&self, canvas: &mut RgbaImage, annotation: &Annotation) {
        let color = annotation.color();
        let width = annotation.stroke_width();
        let rgba = color.to_rgba();

        match annotation.kind() {
            AnnotationKind::Arrow { start, end } => {
                stroke_segment(canvas, *start, *end, width, rgba);
                for leg in arrow_head(*start, *end, width) {
                    stroke_segment(canvas, *end, leg, width, rgba);
                }
            }
            AnnotationKind::Line { start, end } => stroke_segment(canvas, *start, *end, width, rgba),
            AnnotationKind::Rectangle { start, end } => {
                stroke_rect(canvas, Rect::from_points(*start, *end), width, rgba)
            }
            AnnotationKind::Ellipse { start, end } => {
                stroke_ellipse(canvas, Rect::from_points(*start, *end), width, rgba)
            }
            AnnotationKind::Highlight { start, end } => {
                blend_rect(canvas, Rect::from_points(*start, *end), color, HIGHLIGHT_ALPHA)
            }
            AnnotationKind::Blur { start, end } => blend_rect(
                canvas,
                Rect::from_points(*start, *end),
                Rgb::NEUTRAL_GRAY,
                BLUR_ALPHA,
            ),
            AnnotationKind::Text { position, text } => match &self.font {
                Some(_) if !self.text_reaches_canvas(canvas, *position, text) => {}
                Some(font) => draw_text_mut(
                    canvas,
                    rgba,
                    position.x.round() as i32,
                    position.y.round() as i32,
                    PxScale::from(self.text_size),
                    &**font,
                    text,
                ),
                None => log::warn!("[compose] skipping text annotation {}: no font", annotation.id()),
            },
            AnnotationKind::Freehand { start, end, points } => {
                let path = freehand_path(*start, points, *end);
                match path.as_slice() {
                    [only] => stroke_segment(canvas, *only, *only, width, rgba),
                    path => {
                        for pair in path.windows(2) {
                            stroke_segment(canvas, pair[0], pair[1], width, rgba);
                        }
                    }
                }
            }
        }
    }

    /// Text is laid out right and down from `position`; anything starting past
    /// the canvas, or too far before it for its glyphs to reach, draws nothing.
    fn text_reaches_canvas(&self, canvas: &RgbaImage, position: Point, text: &str) -> bool {
        let reach = self.text_size as f64 * (text.chars().count() + 1) as f64;
        position.x <= canvas.width() as f64
            && position.y <= canvas.height() as f64
            && position.x >= -reach
            && position.y >= -(self.text_size as f64 * 2.0)
    }
}

/// `start`, the recorded points, then `end`, without consecutive repeats.
fn freehand_path(start: Point, points: &[Point], end: Point) -> Vec<Point> {
    let mut path: Vec<Point> = Vec::with_capacity(points.len() + 2);
    for p in std::iter::once(&start).chain(points).chain(std::iter::once(&end)) {
        if path.last() != Some(p) {
            path.push(*p);
        }
    }
    path
}

impl Default for CompositingEngine {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Filled disc around the pixel nearest `center`, scanned only where it meets the canvas.
fn dot(canvas: &mut RgbaImage, center: Point, radius: f64, color: Rgba<u8>) {
    let r = radius.round().clamp(1.0, MAX_HALF_STROKE);
    let (cx, cy) = (center.x.round(), center.y.round());
    let Some((x0, y0, x1, y1)) = clip(
        canvas,
        Rect::new(cx - r, cy - r, r * 2.0 + 1.0, r * 2.0 + 1.0),
    ) else {
        return;
    };
    for y in y0..y1 {
        for x in x0..x1 {
            let (dx, dy) = (x as f64 - cx, y as f64 - cy);
            if dx * dx + dy * dy <= r * r {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}

/// Liang-Barsky clip of `a`-`b` to the canvas grown by `margin` on every side.
fn clip_segment(canvas: &RgbaImage, a: Point, b: Point, margin: f64) -> Option<(Point, Point)> {
    let x_max = canvas.width() as f64 + margin;
    let y_max = canvas.height() as f64 + margin;
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);

    for (p, q) in [
        (-dx, a.x + margin),
        (dx, x_max - a.x),
        (-dy, a.y + margin),
        (dy, y_max - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }

    let at = |t: f64| Point::new(a.x + t * dx, a.y + t * dy);
    Some((at(t0), at(t1)))
}

/// A straight stroke `width` pixels thick with round caps.
fn stroke_segment(canvas: &mut RgbaImage, a: Point, b: Point, width: f32, color: Rgba<u8>) {
    let half = (width as f64 / 2.0).clamp(0.5, MAX_HALF_STROKE);
    // caps at a clipped end sit past the margin and stay off canvas
    let Some((a, b)) = clip_segment(canvas, a, b, half + 2.0) else {
        return;
    };
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length = dx.hypot(dy);
    if length < f64::EPSILON {
        dot(canvas, a, half, color);
        return;
    }

    let (nx, ny) = (-dy / length * half, dx / length * half);
    let corner = |p: Point, sign: f64| {
        PolyPoint::new(
            (p.x + sign * nx).round() as i32,
            (p.y + sign * ny).round() as i32,
        )
    };
    let quad = [corner(a, 1.0), corner(b, 1.0), corner(b, -1.0), corner(a, -1.0)];

    if quad[0] == quad[3] || quad[1] == quad[2] {
        // thinner than a pixel after rounding
        draw_line_segment_mut(
            canvas,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            color,
        );
    } else {
        draw_polygon_mut(canvas, &quad, color);
    }

    if half >= 1.0 {
        dot(canvas, a, half, color);
        dot(canvas, b, half, color);
    }
}

/// Outline centred on the rectangle's edges.
fn stroke_rect(canvas: &mut RgbaImage, rect: Rect, width: f32, color: Rgba<u8>) {
    let w = width as f64;
    let t = w.round().max(1.0);
    let left = (rect.x - w / 2.0).round();
    let top = (rect.y - w / 2.0).round();
    let outer_w = (rect.width + w).round().max(t);
    let outer_h = (rect.height + w).round().max(t);

    let edges = [
        (left, top, outer_w, t),
        (left, top + outer_h - t, outer_w, t),
        (left, top, t, outer_h),
        (left + outer_w - t, top, t, outer_h),
    ];
    for (x, y, edge_w, edge_h) in edges {
        if let Some((x0, y0, x1, y1)) = clip(canvas, Rect::new(x, y, edge_w, edge_h)) {
            let r = PixelRect::at(x0 as i32, y0 as i32).of_size(x1 - x0, y1 - y0);
            draw_filled_rect_mut(canvas, r, color);
        }
    }
}

/// Elliptical ring inscribed in `rect`, `width` pixels thick.
fn stroke_ellipse(canvas: &mut RgbaImage, rect: Rect, width: f32, color: Rgba<u8>) {
    let half = (width as f64 / 2.0).max(0.5);
    let (cx, cy) = (rect.x + rect.width / 2.0, rect.y + rect.height / 2.0);
    let (a, b) = (rect.width / 2.0, rect.height / 2.0);
    let (outer_a, outer_b) = (a + half, b + half);
    let inner = (a - half > 0.0 && b - half > 0.0).then(|| (a - half, b - half));

    let Some((x0, y0, x1, y1)) = clip(
        canvas,
        Rect::new(cx - outer_a, cy - outer_b, outer_a * 2.0, outer_b * 2.0),
    ) else {
        return;
    };

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            let outside_outer = (dx / outer_a).powi(2) + (dy / outer_b).powi(2) > 1.0;
            let inside_inner = inner
                .map(|(ia, ib)| (dx / ia).powi(2) + (dy / ib).powi(2) < 1.0)
                .unwrap_or(false);
            if !outside_outer && !inside_inner {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}

/// Alpha-over fill of `rect` with an opaque color at `alpha` thousandths.
fn blend_rect(canvas: &mut RgbaImage, rect: Rect, color: Rgb, alpha: u32) {
    let Some((x0, y0, x1, y1)) = clip(canvas, rect) else {
        return;
    };
    let src = [color.0, color.1, color.2, 255];
    for y in y0..y1 {
        for x in x0..x1 {
            let px = canvas.get_pixel_mut(x, y);
            for (dst, s) in px.0.iter_mut().zip(src) {
                *dst = blend_channel(*dst, s, alpha);
            }
        }
    }
}

fn blend_channel(dst: u8, src: u8, alpha: u32) -> u8 {
    ((dst as u32 * (1000 - alpha) + src as u32 * alpha + 500) / 1000) as u8
}

/// Pixel range `[x0, x1) x [y0, y1)` of `rect` inside the canvas.
fn clip(canvas: &RgbaImage, rect: Rect) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = (canvas.width() as f64, canvas.height() as f64);
    let x0 = rect.x.round().clamp(0.0, w);
    let y0 = rect.y.round().clamp(0.0, h);
    let x1 = rect.right().round().clamp(0.0, w);
    let y1 = rect.bottom().round().clamp(0.0, h);
    (x1 > x0 && y1 > y0).then(|| (x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}
