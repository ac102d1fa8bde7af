//! Screen capture backend using xcap
//!
//! Every xcap call blocks, so each one runs on the blocking pool.

use async_trait::async_trait;
use image::RgbaImage;
use xcap::{Monitor, Window};

use crate::backend::CaptureBackend;
use crate::display::{DisplaySurface, DisplaySurfaceSet};
use crate::error::CaptureError;
use crate::state::CaptureTarget;
use crate::transform::{local_to_pixels, CoordinateTransform};
use crate::types::Region;
use crate::window_detect::WindowInfo;

#[derive(Debug, Default, Clone, Copy)]
pub struct XcapBackend {
    transform: CoordinateTransform,
}

impl XcapBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn describe(monitor: &Monitor) -> Result<DisplaySurface, String> {
    let e = |e: xcap::XCapError| e.to_string();
    Ok(DisplaySurface::new(
        monitor.id().map_err(e)?,
        monitor.x().map_err(e)?,
        monitor.y().map_err(e)?,
        monitor.width().map_err(e)?,
        monitor.height().map_err(e)?,
        monitor.scale_factor().map_err(e)? as f64,
    ))
}

fn describe_window(window: &Window) -> Result<WindowInfo, String> {
    let e = |e: xcap::XCapError| e.to_string();
    Ok(WindowInfo {
        id: window.id().map_err(e)?,
        x: window.x().map_err(e)? as f64,
        y: window.y().map_err(e)? as f64,
        width: window.width().map_err(e)? as f64,
        height: window.height().map_err(e)? as f64,
        on_screen: !window.is_minimized().map_err(e)?,
        pid: window.pid().map_err(e)?,
        title: window.title().ok().filter(|t| !t.is_empty()),
    })
}

fn monitor_image(surface_id: u32) -> Result<RgbaImage, String> {
    let monitors = Monitor::all().map_err(|e| e.to_string())?;
    let monitor = monitors
        .into_iter()
        .find(|m| m.id().ok() == Some(surface_id))
        .ok_or_else(|| format!("display {} disappeared", surface_id))?;
    monitor.capture_image().map_err(|e| e.to_string())
}

fn window_image(window_id: u32) -> Result<RgbaImage, String> {
    let windows = Window::all().map_err(|e| e.to_string())?;
    let window = windows
        .into_iter()
        .find(|w| w.id().ok() == Some(window_id))
        .ok_or_else(|| format!("window {} disappeared", window_id))?;
    window.capture_image().map_err(|e| e.to_string())
}

/// Crop `region` out of a full display buffer, clamped to its bounds.
fn crop_to_region(full: &RgbaImage, region: Region) -> Option<RgbaImage> {
    let max_x = full.width().saturating_sub(1);
    let max_y = full.height().saturating_sub(1);
    let crop_x = (region.x.max(0) as u32).min(max_x);
    let crop_y = (region.y.max(0) as u32).min(max_y);
    let crop_w = region.width.min(full.width().saturating_sub(crop_x));
    let crop_h = region.height.min(full.height().saturating_sub(crop_y));

    if crop_w == 0 || crop_h == 0 {
        return None;
    }
    Some(image::imageops::crop_imm(full, crop_x, crop_y, crop_w, crop_h).to_image())
}

async fn blocking<T, F>(label: &'static str, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            log::error!("[xcap] {} failed: {}", label, e);
            None
        }
        Err(e) => {
            log::error!("[xcap] {} task failed: {}", label, e);
            None
        }
    }
}

#[async_trait]
impl CaptureBackend for XcapBackend {
    fn displays(&self) -> Result<DisplaySurfaceSet, CaptureError> {
        let monitors = Monitor::all().map_err(|e| {
            log::error!("[xcap] monitor enumeration failed: {}", e);
            CaptureError::NoDisplays
        })?;
        let surfaces = monitors
            .iter()
            .filter_map(|m| match describe(m) {
                Ok(surface) => Some(surface),
                Err(e) => {
                    log::warn!("[xcap] skipping monitor: {}", e);
                    None
                }
            })
            .collect();
        DisplaySurfaceSet::new(surfaces)
    }

    async fn windows(&self) -> Result<Vec<WindowInfo>, String> {
        tokio::task::spawn_blocking(|| {
            let windows = Window::all().map_err(|e| e.to_string())?;
            Ok(windows
                .iter()
                .filter_map(|w| describe_window(w).ok())
                .collect())
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn capture(&self, target: &CaptureTarget) -> Option<RgbaImage> {
        match target.clone() {
            CaptureTarget::Area { surface, global } => {
                let local = self.transform.to_local(global, &surface);
                let region = local_to_pixels(local, surface.scale_factor);
                log::debug!("[xcap] area {:?} -> pixel crop {:?}", global, region);
                blocking("area capture", move || {
                    let full = monitor_image(surface.id)?;
                    crop_to_region(&full, region)
                        .ok_or_else(|| format!("crop {:?} outside display", region))
                })
                .await
            }
            CaptureTarget::Display(surface) => {
                blocking("display capture", move || monitor_image(surface.id)).await
            }
            CaptureTarget::Window(window) | CaptureTarget::Scrolling(window) => {
                blocking("window capture", move || window_image(window.id)).await
            }
        }
    }

    async fn stitch_scrolling(&self, window: &WindowInfo) -> Option<RgbaImage> {
        log::warn!("[xcap] scroll stitching unavailable; capturing window {} once", window.id);
        let id = window.id;
        blocking("window capture", move || window_image(id)).await
    }
}
