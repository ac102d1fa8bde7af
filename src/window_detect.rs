use serde::{Deserialize, Serialize};

/// Windows narrower or shorter than this many points are never offered.
pub const DEFAULT_MIN_CANDIDATE_SIZE: f64 = 100.0;

/// A window reported by the window enumeration collaborator.
/// Frame is global, top-left origin, in points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub on_screen: bool,
    pub pid: u32,
    #[serde(default)]
    pub title: Option<String>,
}

/// Eligibility policy for Window and Scrolling capture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CandidateFilter {
    pub min_size: f64,
    pub own_pid: u32,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_CANDIDATE_SIZE,
            own_pid: std::process::id(),
        }
    }
}

impl CandidateFilter {
    pub fn is_eligible(&self, window: &WindowInfo) -> bool {
        window.on_screen
            && window.width > self.min_size
            && window.height > self.min_size
            && window.pid != self.own_pid
    }

    /// Keep eligible windows in the order the enumerator returned them.
    pub fn apply(&self, windows: Vec<WindowInfo>) -> Vec<WindowInfo> {
        let total = windows.len();
        let kept: Vec<WindowInfo> = windows.into_iter().filter(|w| self.is_eligible(w)).collect();
        log::debug!("[window_detect] {} of {} windows eligible", kept.len(), total);
        kept
    }
}
