//! Annotation overlays and the per-screenshot editing session.
//!
//! Each annotation type carries only the payload it renders from. Order in the
//! model is z-order: index 0 is painted first.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AnnotationError;
use crate::screenshot::Screenshot;
use crate::types::{Point, Rgb};

/// Geometry and payload per overlay type. Coordinates are base-image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnnotationKind {
    Arrow { start: Point, end: Point },
    Rectangle { start: Point, end: Point },
    Ellipse { start: Point, end: Point },
    Line { start: Point, end: Point },
    Highlight { start: Point, end: Point },
    Blur { start: Point, end: Point },
    Text { position: Point, text: String },
    /// `points` holds the recorded path. Empty means a straight stroke from `start` to `end`.
    Freehand {
        start: Point,
        end: Point,
        #[serde(default)]
        points: Vec<Point>,
    },
}

impl AnnotationKind {
    fn points(&self) -> Vec<Point> {
        match self {
            AnnotationKind::Arrow { start, end }
            | AnnotationKind::Rectangle { start, end }
            | AnnotationKind::Ellipse { start, end }
            | AnnotationKind::Line { start, end }
            | AnnotationKind::Highlight { start, end }
            | AnnotationKind::Blur { start, end } => vec![*start, *end],
            AnnotationKind::Text { position, .. } => vec![*position],
            AnnotationKind::Freehand { start, end, points } => {
                let mut all = Vec::with_capacity(points.len() + 2);
                all.push(*start);
                all.push(*end);
                all.extend_from_slice(points);
                all
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnnotationKind::Arrow { .. } => "arrow",
            AnnotationKind::Rectangle { .. } => "rectangle",
            AnnotationKind::Ellipse { .. } => "ellipse",
            AnnotationKind::Line { .. } => "line",
            AnnotationKind::Highlight { .. } => "highlight",
            AnnotationKind::Blur { .. } => "blur",
            AnnotationKind::Text { .. } => "text",
            AnnotationKind::Freehand { .. } => "freehand",
        }
    }
}

/// One overlay instance. Build with [`Annotation::new`] or [`Annotation::from_json`];
/// both reject non-finite geometry so the compositor never sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    #[serde(flatten)]
    kind: AnnotationKind,
    color: Rgb,
    #[serde(rename = "strokeWidth", alias = "stroke_width")]
    stroke_width: f32,
}

impl Annotation {
    pub fn new(kind: AnnotationKind, color: Rgb, stroke_width: f32) -> Result<Self, AnnotationError> {
        let annotation = Self {
            id: Uuid::new_v4(),
            kind,
            color,
            stroke_width,
        };
        annotation.validate()?;
        Ok(annotation)
    }

    /// Parse an annotation sent by the editor UI.
    pub fn from_json(json: &str) -> Result<Self, AnnotationError> {
        let annotation: Annotation = serde_json::from_str(json)?;
        annotation.validate()?;
        Ok(annotation)
    }

    /// Parse a JSON array of annotations, in z-order.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, AnnotationError> {
        let annotations: Vec<Annotation> = serde_json::from_str(json)?;
        for annotation in &annotations {
            annotation.validate()?;
        }
        Ok(annotations)
    }

    fn validate(&self) -> Result<(), AnnotationError> {
        if !(self.stroke_width.is_finite() && self.stroke_width > 0.0) {
            return Err(AnnotationError::InvalidStrokeWidth(self.stroke_width));
        }
        if !self.kind.points().iter().all(Point::is_finite) {
            return Err(AnnotationError::NonFiniteGeometry);
        }
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &AnnotationKind {
        &self.kind
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn stroke_width(&self) -> f32 {
        self.stroke_width
    }
}

/// Ordered overlays for one screenshot. Append-only apart from undo and clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationModel {
    entries: Vec<Annotation>,
}

impl AnnotationModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, annotation: Annotation) {
        self.entries.push(annotation);
    }

    /// Remove the most recently appended entry. No-op when empty.
    pub fn undo(&mut self) -> Option<Annotation> {
        self.entries.pop()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.entries
    }
}

impl From<Vec<Annotation>> for AnnotationModel {
    fn from(entries: Vec<Annotation>) -> Self {
        Self { entries }
    }
}

/// Editing session for one screenshot.
///
/// Starts from the screenshot's committed annotations. Renders work on a
/// [`snapshot`](Self::snapshot), so later edits never race a render in flight.
#[derive(Debug)]
pub struct AnnotationSession {
    screenshot: Screenshot,
    model: AnnotationModel,
}

impl AnnotationSession {
    pub fn begin(screenshot: Screenshot) -> Self {
        let model = AnnotationModel::from(screenshot.annotations.clone());
        log::debug!(
            "[annotate] session opened for {} with {} existing annotations",
            screenshot.id(),
            model.len()
        );
        Self { screenshot, model }
    }

    pub fn append(&mut self, annotation: Annotation) {
        log::debug!("[annotate] append {}", annotation.kind().name());
        self.model.append(annotation);
    }

    pub fn undo(&mut self) -> Option<Annotation> {
        self.model.undo()
    }

    pub fn clear(&mut self) {
        self.model.clear();
    }

    pub fn screenshot(&self) -> &Screenshot {
        &self.screenshot
    }

    pub fn model(&self) -> &AnnotationModel {
        &self.model
    }

    /// Frozen copy of the current sequence for rendering.
    pub fn snapshot(&self) -> Arc<[Annotation]> {
        Arc::from(self.model.as_slice())
    }

    /// Close the session, writing the current sequence into the screenshot.
    pub fn commit(self) -> Screenshot {
        let mut screenshot = self.screenshot;
        screenshot.annotations = self.model.entries;
        screenshot
    }
}
