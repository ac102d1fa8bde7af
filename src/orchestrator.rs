//! Capture attempt state machine.
//!
//! `Idle -> AwaitingSelection(mode) -> Capturing -> {Completed, Cancelled, Failed}`
//!
//! The machine is synchronous and owns no I/O. Asynchronous collaborator results
//! (window enumeration, pixel capture) come back in as events tagged with the
//! [`AttemptId`] they were started for; events for any other attempt are dropped.

use image::RgbaImage;

use crate::display::{DisplaySurface, DisplaySurfaceSet};
use crate::error::CaptureError;
use crate::history::CaptureHistory;
use crate::screenshot::Screenshot;
use crate::state::{AttemptId, Candidates, CaptureRequest, CaptureState, CaptureTarget};
use crate::transform::CoordinateTransform;
use crate::types::{CaptureMode, Rect};
use crate::window_detect::{CandidateFilter, WindowInfo};

/// UI-owned selection overlay, one per display.
pub trait SelectionAffordance: Send {
    fn present(&mut self, index: usize, surface: &DisplaySurface, candidates: &[WindowInfo]);
    fn dismiss(&mut self, index: usize);
}

/// Affordance for headless use: nothing is shown, selections come in programmatically.
#[derive(Debug, Default)]
pub struct Headless;

impl SelectionAffordance for Headless {
    fn present(&mut self, _index: usize, _surface: &DisplaySurface, _candidates: &[WindowInfo]) {}
    fn dismiss(&mut self, _index: usize) {}
}

/// Outcome of delivering a candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Applied,
    /// The attempt it belonged to is over (cancelled or superseded).
    Discarded,
}

pub struct CaptureOrchestrator {
    state: CaptureState,
    last_attempt: u64,
    transform: CoordinateTransform,
    filter: CandidateFilter,
    affordance: Box<dyn SelectionAffordance>,
    presented: Vec<usize>,
}

impl CaptureOrchestrator {
    pub fn new(
        transform: CoordinateTransform,
        filter: CandidateFilter,
        affordance: Box<dyn SelectionAffordance>,
    ) -> Self {
        Self {
            state: CaptureState::Idle,
            last_attempt: 0,
            transform,
            filter,
            affordance,
            presented: Vec::new(),
        }
    }

    pub fn headless() -> Self {
        Self::new(
            CoordinateTransform::default(),
            CandidateFilter::default(),
            Box::new(Headless),
        )
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.state.request().map(|r| r.attempt)
    }

    /// Start an attempt. Rejected while another one is in flight; never queued.
    pub fn begin(
        &mut self,
        mode: CaptureMode,
        surfaces: DisplaySurfaceSet,
    ) -> Result<AttemptId, CaptureError> {
        if self.state.is_active() {
            log::warn!("[orchestrator] rejecting {} capture: {} in progress", mode, self.state);
            return Err(CaptureError::CaptureInProgress);
        }

        self.last_attempt += 1;
        let attempt = AttemptId(self.last_attempt);
        let request = CaptureRequest::new(attempt, mode, surfaces);

        let candidates = if mode.needs_candidates() {
            Candidates::Pending
        } else {
            Candidates::NotNeeded
        };
        if mode == CaptureMode::Area {
            self.present_all(&request.surfaces, &[]);
        }
        self.transition(CaptureState::AwaitingSelection {
            request,
            candidates,
        });
        Ok(attempt)
    }

    /// Deliver the window enumeration result for `attempt`.
    pub fn candidates_ready(
        &mut self,
        attempt: AttemptId,
        result: Result<Vec<WindowInfo>, String>,
    ) -> Result<Delivery, CaptureError> {
        let surfaces = match &self.state {
            CaptureState::AwaitingSelection {
                request,
                candidates: Candidates::Pending,
            } if request.attempt == attempt => request.surfaces.clone(),
            _ => {
                log::warn!(
                    "[orchestrator] discarding window list for stale attempt {} (state {})",
                    attempt,
                    self.state
                );
                return Ok(Delivery::Discarded);
            }
        };

        match result {
            Ok(windows) => {
                let eligible = self.filter.apply(windows);
                self.present_all(&surfaces, &eligible);
                if let CaptureState::AwaitingSelection { candidates, .. } = &mut self.state {
                    *candidates = Candidates::Ready(eligible);
                }
                Ok(Delivery::Applied)
            }
            Err(reason) => {
                let err = CaptureError::CandidateEnumerationFailed(reason);
                self.transition(CaptureState::Failed(err.clone()));
                Err(err)
            }
        }
    }

    /// User confirmed a rectangle on one display (Area mode). A degenerate rectangle
    /// leaves the attempt waiting so the user can reselect.
    pub fn select_area(
        &mut self,
        surface_index: usize,
        local: Rect,
    ) -> Result<CaptureTarget, CaptureError> {
        let request = self.awaiting(&[CaptureMode::Area], "select_area")?;
        let surface = *request.surfaces.get(surface_index)?;
        let global = self.transform.to_global(local, &surface)?;
        log::debug!(
            "[orchestrator] area {:?} on display {} -> capture space {:?}",
            local,
            surface_index,
            global
        );
        self.start_capture(
            Some(surface_index),
            Some(local),
            CaptureTarget::Area { surface, global },
        )
    }

    /// User picked a window (Window / Scrolling modes). Only listed candidates are accepted.
    pub fn select_window(&mut self, window_id: u32) -> Result<CaptureTarget, CaptureError> {
        self.awaiting(&[CaptureMode::Window, CaptureMode::Scrolling], "select_window")?;
        let (mode, window) = match &self.state {
            CaptureState::AwaitingSelection {
                request,
                candidates: Candidates::Ready(list),
            } => (
                request.mode,
                list.iter().find(|w| w.id == window_id).cloned(),
            ),
            _ => {
                return Err(CaptureError::UnexpectedEvent {
                    state: "AwaitingSelection(candidates pending)".to_string(),
                    event: "select_window",
                })
            }
        };
        let window = window.ok_or(CaptureError::UnknownWindow(window_id))?;
        let target = if mode == CaptureMode::Scrolling {
            CaptureTarget::Scrolling(window)
        } else {
            CaptureTarget::Window(window)
        };
        self.start_capture(None, None, target)
    }

    /// Fullscreen needs no user input; the driver calls this once the settle delay elapsed.
    pub fn select_display(&mut self, surface_index: usize) -> Result<CaptureTarget, CaptureError> {
        let request = self.awaiting(&[CaptureMode::Fullscreen], "select_display")?;
        let surface = *request.surfaces.get(surface_index)?;
        self.start_capture(Some(surface_index), None, CaptureTarget::Display(surface))
    }

    /// Escape or overlay dismissal. Only meaningful while awaiting a selection.
    pub fn cancel(&mut self) -> bool {
        if !matches!(self.state, CaptureState::AwaitingSelection { .. }) {
            return false;
        }
        self.teardown();
        self.transition(CaptureState::Cancelled);
        true
    }

    /// Deliver the capture primitive's result. `None` (including a watchdog timeout)
    /// fails the attempt without touching `history`.
    pub fn capture_finished(
        &mut self,
        attempt: AttemptId,
        image: Option<RgbaImage>,
        history: &mut CaptureHistory,
    ) -> Result<Screenshot, CaptureError> {
        let (mode, scale) = match &self.state {
            CaptureState::Capturing { request, target } if request.attempt == attempt => {
                (request.mode, target.scale_factor(&request.surfaces))
            }
            _ => {
                log::warn!(
                    "[orchestrator] dropping capture result for attempt {} (state {})",
                    attempt,
                    self.state
                );
                return Err(CaptureError::UnexpectedEvent {
                    state: self.state.name().to_string(),
                    event: "capture_finished",
                });
            }
        };

        match image {
            Some(image) if image.width() > 0 && image.height() > 0 => {
                let screenshot = Screenshot::new(image, mode, scale);
                history.push(screenshot.clone());
                log::info!(
                    "[orchestrator] captured {}x{} ({}) as {}",
                    screenshot.dimensions().0,
                    screenshot.dimensions().1,
                    mode,
                    screenshot.id()
                );
                self.transition(CaptureState::Completed(screenshot.id()));
                Ok(screenshot)
            }
            _ => {
                self.transition(CaptureState::Failed(CaptureError::CaptureUnavailable));
                Err(CaptureError::CaptureUnavailable)
            }
        }
    }

    /// Return a finished machine to `Idle`. No effect while an attempt is in flight.
    pub fn reset(&mut self) {
        if self.state.is_terminal() {
            self.transition(CaptureState::Idle);
        }
    }

    fn awaiting(
        &self,
        modes: &[CaptureMode],
        event: &'static str,
    ) -> Result<&CaptureRequest, CaptureError> {
        match &self.state {
            CaptureState::AwaitingSelection { request, .. } if modes.contains(&request.mode) => {
                Ok(request)
            }
            other => Err(CaptureError::UnexpectedEvent {
                state: other.to_string(),
                event,
            }),
        }
    }

    fn start_capture(
        &mut self,
        target_surface: Option<usize>,
        raw_selection: Option<Rect>,
        target: CaptureTarget,
    ) -> Result<CaptureTarget, CaptureError> {
        let request = match &mut self.state {
            CaptureState::AwaitingSelection { request, .. } => {
                request.target_surface = target_surface;
                request.raw_selection = raw_selection;
                request.clone()
            }
            other => {
                return Err(CaptureError::UnexpectedEvent {
                    state: other.to_string(),
                    event: "start_capture",
                })
            }
        };

        self.teardown();
        self.transition(CaptureState::Capturing {
            request,
            target: target.clone(),
        });
        Ok(target)
    }

    fn present_all(&mut self, surfaces: &DisplaySurfaceSet, candidates: &[WindowInfo]) {
        for (index, surface) in surfaces.iter().enumerate() {
            self.affordance.present(index, surface, candidates);
            if !self.presented.contains(&index) {
                self.presented.push(index);
            }
        }
    }

    /// Dismiss every presented overlay in one pass.
    fn teardown(&mut self) {
        for index in self.presented.drain(..) {
            self.affordance.dismiss(index);
        }
    }

    fn transition(&mut self, next: CaptureState) {
        log::debug!("[orchestrator] {} -> {}", self.state, next);
        self.state = next;
    }
}
