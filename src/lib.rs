//! Screen capture orchestration and annotation compositing.
//!
//! A capture attempt runs through [`orchestrator::CaptureOrchestrator`], driven
//! asynchronously by [`service::CaptureService`]. Finished captures land in
//! [`history::CaptureHistory`]; the editor works on an
//! [`annotation::AnnotationSession`] and [`compose::CompositingEngine`] flattens
//! the result for [`export`].

pub mod annotation;
pub mod backend;
pub mod compose;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod history;
pub mod orchestrator;
pub mod screenshot;
pub mod service;
pub mod state;
pub mod transform;
pub mod types;
pub mod window_detect;

#[cfg(feature = "xcap")]
pub mod xcap_backend;

pub use annotation::{Annotation, AnnotationKind, AnnotationModel, AnnotationSession};
pub use backend::CaptureBackend;
pub use compose::CompositingEngine;
pub use config::AppConfig;
pub use display::{DisplaySurface, DisplaySurfaceSet};
pub use error::{AnnotationError, CaptureError, ConfigError, ExportError};
pub use history::{CaptureHistory, SharedHistory};
pub use orchestrator::{CaptureOrchestrator, SelectionAffordance};
pub use screenshot::Screenshot;
pub use service::{CaptureHandle, CaptureService, ServiceOptions};
pub use state::{AttemptId, CaptureState, CaptureTarget};
pub use transform::CoordinateTransform;
pub use types::{CaptureMode, Point, Rect, Region, Rgb};
pub use window_detect::{CandidateFilter, WindowInfo};

/// Initialise `env_logger` once. `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

pub fn candidate_filter(config: &AppConfig) -> CandidateFilter {
    CandidateFilter {
        min_size: config.min_candidate_size,
        ..CandidateFilter::default()
    }
}

/// Orchestrator with transform and candidate policy taken from `config`.
pub fn orchestrator_from_config(
    config: &AppConfig,
    affordance: Box<dyn SelectionAffordance>,
) -> CaptureOrchestrator {
    CaptureOrchestrator::new(
        CoordinateTransform::new(config.min_selection_size),
        candidate_filter(config),
        affordance,
    )
}
