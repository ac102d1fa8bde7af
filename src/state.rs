use uuid::Uuid;

use crate::display::{DisplaySurface, DisplaySurfaceSet};
use crate::error::CaptureError;
use crate::types::{CaptureMode, Point, Rect};
use crate::window_detect::WindowInfo;

/// Identifies one capture attempt. Completion events carrying an older id are stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(pub u64);

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transient data for the attempt in flight. Dropped when it ends.
#[derive(Clone, Debug)]
pub struct CaptureRequest {
    pub attempt: AttemptId,
    pub mode: CaptureMode,
    pub surfaces: DisplaySurfaceSet,
    pub target_surface: Option<usize>,
    pub raw_selection: Option<Rect>,
}

impl CaptureRequest {
    pub fn new(attempt: AttemptId, mode: CaptureMode, surfaces: DisplaySurfaceSet) -> Self {
        Self {
            attempt,
            mode,
            surfaces,
            target_surface: None,
            raw_selection: None,
        }
    }
}

/// What the capture primitive is asked to grab.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureTarget {
    /// `global` is in capture space; `surface` is the display it was drawn on.
    Area { surface: DisplaySurface, global: Rect },
    Display(DisplaySurface),
    Window(WindowInfo),
    Scrolling(WindowInfo),
}

impl CaptureTarget {
    /// Scale of the display the pixels come from. Windows use the display under their
    /// top-left corner, falling back to the first display.
    pub fn scale_factor(&self, surfaces: &DisplaySurfaceSet) -> f64 {
        match self {
            CaptureTarget::Area { surface, .. } | CaptureTarget::Display(surface) => {
                surface.scale_factor
            }
            CaptureTarget::Window(w) | CaptureTarget::Scrolling(w) => surfaces
                .index_at(Point::new(w.x, w.y))
                .or(Some(0))
                .and_then(|i| surfaces.get(i).ok())
                .map(|s| s.scale_factor)
                .unwrap_or(1.0),
        }
    }
}

/// Window candidates for the attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Candidates {
    NotNeeded,
    Pending,
    Ready(Vec<WindowInfo>),
}

#[derive(Clone, Debug)]
pub enum CaptureState {
    Idle,
    AwaitingSelection {
        request: CaptureRequest,
        candidates: Candidates,
    },
    Capturing {
        request: CaptureRequest,
        target: CaptureTarget,
    },
    Completed(Uuid),
    Cancelled,
    Failed(CaptureError),
}

impl CaptureState {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Idle => "Idle",
            CaptureState::AwaitingSelection { .. } => "AwaitingSelection",
            CaptureState::Capturing { .. } => "Capturing",
            CaptureState::Completed(_) => "Completed",
            CaptureState::Cancelled => "Cancelled",
            CaptureState::Failed(_) => "Failed",
        }
    }

    /// True while an attempt is in flight. Terminal states accept a new attempt.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            CaptureState::AwaitingSelection { .. } | CaptureState::Capturing { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaptureState::Completed(_) | CaptureState::Cancelled | CaptureState::Failed(_)
        )
    }

    pub fn request(&self) -> Option<&CaptureRequest> {
        match self {
            CaptureState::AwaitingSelection { request, .. }
            | CaptureState::Capturing { request, .. } => Some(request),
            _ => None,
        }
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::AwaitingSelection { request, .. } => {
                write!(f, "AwaitingSelection({})", request.mode)
            }
            CaptureState::Failed(e) => write!(f, "Failed({})", e),
            other => f.write_str(other.name()),
        }
    }
}
