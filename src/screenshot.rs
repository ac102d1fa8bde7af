use std::sync::Arc;

use chrono::{DateTime, Local};
use image::RgbaImage;
use uuid::Uuid;

use crate::annotation::Annotation;
use crate::transform::pixels_to_points;
use crate::types::CaptureMode;

/// A completed capture.
///
/// The base image is shared and never mutated. Only `annotations` and the
/// derived text fields change after creation.
#[derive(Debug, Clone)]
pub struct Screenshot {
    id: Uuid,
    image: Arc<RgbaImage>,
    captured_at: DateTime<Local>,
    capture_type: CaptureMode,
    scale_factor: f64,
    pub annotations: Vec<Annotation>,
    pub extracted_text: Option<String>,
    pub ai_description: Option<String>,
}

impl Screenshot {
    pub fn new(image: RgbaImage, capture_type: CaptureMode, scale_factor: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            image: Arc::new(image),
            captured_at: Local::now(),
            capture_type,
            scale_factor,
            annotations: Vec::new(),
            extracted_text: None,
            ai_description: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Shared handle to the base image, for rendering off the owning thread.
    pub fn image_arc(&self) -> Arc<RgbaImage> {
        Arc::clone(&self.image)
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    pub fn capture_type(&self) -> CaptureMode {
        self.capture_type
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Pixel dimensions of the base image.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Size in points, for UI metadata.
    pub fn point_size(&self) -> (f64, f64) {
        let (w, h) = self.image.dimensions();
        pixels_to_points(w, h, self.scale_factor)
    }
}
