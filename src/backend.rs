//! Platform collaborators the capture core calls out to.

use async_trait::async_trait;
use image::RgbaImage;

use crate::display::DisplaySurfaceSet;
use crate::error::CaptureError;
use crate::state::CaptureTarget;
use crate::window_detect::WindowInfo;

/// OS services behind a capture attempt.
///
/// Implementations must not block the calling task; wrap blocking platform calls in
/// `tokio::task::spawn_blocking`.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Snapshot of the active displays, taken at the start of every attempt.
    fn displays(&self) -> Result<DisplaySurfaceSet, CaptureError>;

    /// Every window the window server knows about, front to back. Filtering is done by the caller.
    async fn windows(&self) -> Result<Vec<WindowInfo>, String>;

    /// Grab pixels for an area, a display or a window. `None` means nothing came back.
    async fn capture(&self, target: &CaptureTarget) -> Option<RgbaImage>;

    /// Scroll the window and return one already-stitched image.
    async fn stitch_scrolling(&self, window: &WindowInfo) -> Option<RgbaImage>;
}
