use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use tokio::time::Instant;

use shotmark_lib::backend::CaptureBackend;
use shotmark_lib::service::{CaptureHandle, CaptureService, ServiceOptions};
use shotmark_lib::{
    CaptureError, CaptureHistory, CaptureMode, CaptureOrchestrator, CaptureTarget, DisplaySurface,
    DisplaySurfaceSet, Rect, SharedHistory, WindowInfo,
};

const OTHER_PID: u32 = 3_000_000_000;

struct FakeBackend {
    surfaces: Vec<DisplaySurface>,
    windows: Result<Vec<WindowInfo>, String>,
    enumeration_delay: Duration,
    capture_delay: Duration,
    captured: Mutex<Vec<CaptureTarget>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            surfaces: vec![
                DisplaySurface::new(1, 0, 0, 1920, 1080, 1.0),
                DisplaySurface::new(2, 1920, 0, 1920, 1080, 1.0),
            ],
            windows: Ok(vec![
                window(10, 640.0, 480.0, OTHER_PID),
                window(11, 800.0, 600.0, std::process::id()),
                window(12, 90.0, 400.0, OTHER_PID),
            ]),
            enumeration_delay: Duration::from_millis(20),
            capture_delay: Duration::ZERO,
            captured: Mutex::new(Vec::new()),
        }
    }
}

impl FakeBackend {
    fn targets(&self) -> Vec<CaptureTarget> {
        self.captured.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptureBackend for FakeBackend {
    fn displays(&self) -> Result<DisplaySurfaceSet, CaptureError> {
        DisplaySurfaceSet::new(self.surfaces.clone())
    }

    async fn windows(&self) -> Result<Vec<WindowInfo>, String> {
        tokio::time::sleep(self.enumeration_delay).await;
        self.windows.clone()
    }

    async fn capture(&self, target: &CaptureTarget) -> Option<RgbaImage> {
        tokio::time::sleep(self.capture_delay).await;
        self.captured.lock().unwrap().push(target.clone());
        let (w, h) = match target {
            CaptureTarget::Area { global, .. } => (global.width as u32, global.height as u32),
            CaptureTarget::Display(s) => (s.width, s.height),
            CaptureTarget::Window(w) | CaptureTarget::Scrolling(w) => (w.width as u32, w.height as u32),
        };
        Some(RgbaImage::new(w, h))
    }

    async fn stitch_scrolling(&self, window: &WindowInfo) -> Option<RgbaImage> {
        self.captured
            .lock()
            .unwrap()
            .push(CaptureTarget::Scrolling(window.clone()));
        Some(RgbaImage::new(window.width as u32, window.height as u32 * 3))
    }
}

fn window(id: u32, width: f64, height: f64, pid: u32) -> WindowInfo {
    WindowInfo {
        id,
        x: 50.0,
        y: 50.0,
        width,
        height,
        on_screen: true,
        pid,
        title: Some(format!("window {id}")),
    }
}

fn start(backend: FakeBackend, options: ServiceOptions, capacity: usize) -> (CaptureHandle, SharedHistory, Arc<FakeBackend>) {
    let backend = Arc::new(backend);
    let history = Arc::new(Mutex::new(CaptureHistory::new(capacity)));
    let service = CaptureService::new(
        CaptureOrchestrator::headless(),
        backend.clone(),
        history.clone(),
        options,
    );
    let (handle, _task) = service.spawn();
    (handle, history, backend)
}

fn spawn_capture(
    handle: &CaptureHandle,
    mode: CaptureMode,
) -> tokio::task::JoinHandle<Result<shotmark_lib::Screenshot, CaptureError>> {
    let handle = handle.clone();
    tokio::spawn(async move { handle.capture(mode).await })
}

/// Retry while the service has not reached the point where the selection is accepted.
async fn select_area(handle: &CaptureHandle, surface: usize, rect: Rect) -> Result<(), CaptureError> {
    for _ in 0..1000 {
        match handle.select_area(surface, rect).await {
            Err(CaptureError::UnexpectedEvent { .. }) => tokio::time::sleep(Duration::from_millis(1)).await,
            other => return other,
        }
    }
    panic!("selection never accepted");
}

async fn select_window(handle: &CaptureHandle, id: u32) -> Result<(), CaptureError> {
    for _ in 0..1000 {
        match handle.select_window(id).await {
            Err(CaptureError::UnexpectedEvent { .. }) => tokio::time::sleep(Duration::from_millis(1)).await,
            other => return other,
        }
    }
    panic!("selection never accepted");
}

#[tokio::test(start_paused = true)]
async fn area_capture_lands_in_history_with_global_rect() {
    let (handle, history, backend) = start(FakeBackend::default(), ServiceOptions::default(), 10);

    let capture = spawn_capture(&handle, CaptureMode::Area);
    select_area(&handle, 1, Rect::new(100.0, 100.0, 200.0, 150.0)).await.unwrap();
    let shot = capture.await.unwrap().unwrap();

    assert_eq!(shot.dimensions(), (200, 150));
    assert_eq!(shot.capture_type(), CaptureMode::Area);
    match &backend.targets()[..] {
        [CaptureTarget::Area { global, surface }] => {
            assert_eq!(*global, Rect::new(2020.0, 830.0, 200.0, 150.0));
            assert_eq!(surface.id, 2);
        }
        other => panic!("unexpected targets {other:?}"),
    }

    let history = history.lock().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.current().map(|s| s.id()), Some(shot.id()));
}

#[tokio::test(start_paused = true)]
async fn concurrent_request_is_rejected_not_queued() {
    let (handle, history, backend) = start(FakeBackend::default(), ServiceOptions::default(), 10);

    let first = spawn_capture(&handle, CaptureMode::Area);
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(
        handle.capture(CaptureMode::Fullscreen).await.unwrap_err(),
        CaptureError::CaptureInProgress
    );

    handle.cancel().await;
    assert_eq!(first.await.unwrap().unwrap_err(), CaptureError::CaptureCancelled);
    assert!(history.lock().unwrap().is_empty());
    assert!(backend.targets().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_during_enumeration_discards_late_candidates() {
    let backend = FakeBackend {
        enumeration_delay: Duration::from_millis(500),
        ..FakeBackend::default()
    };
    let (handle, history, backend) = start(backend, ServiceOptions::default(), 10);

    let first = spawn_capture(&handle, CaptureMode::Window);
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.cancel().await;
    assert_eq!(first.await.unwrap().unwrap_err(), CaptureError::CaptureCancelled);

    // let the orphaned enumeration finish; nothing may come of it
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(history.lock().unwrap().is_empty());
    assert!(backend.targets().is_empty());

    // a fresh attempt gets its own candidates
    let second = spawn_capture(&handle, CaptureMode::Window);
    select_window(&handle, 10).await.unwrap();
    let shot = second.await.unwrap().unwrap();
    assert_eq!(shot.dimensions(), (640, 480));
}

#[tokio::test(start_paused = true)]
async fn ineligible_windows_are_not_selectable() {
    let (handle, _history, _backend) = start(FakeBackend::default(), ServiceOptions::default(), 10);

    let capture = spawn_capture(&handle, CaptureMode::Window);
    // own process
    assert_eq!(select_window(&handle, 11).await, Err(CaptureError::UnknownWindow(11)));
    // too narrow
    assert_eq!(select_window(&handle, 12).await, Err(CaptureError::UnknownWindow(12)));

    select_window(&handle, 10).await.unwrap();
    assert!(capture.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn enumeration_failure_aborts_attempt_and_service_recovers() {
    let backend = FakeBackend {
        windows: Err("window server unavailable".into()),
        ..FakeBackend::default()
    };
    let (handle, history, _backend) = start(backend, ServiceOptions::default(), 10);

    let err = handle.capture(CaptureMode::Window).await.unwrap_err();
    assert!(matches!(err, CaptureError::CandidateEnumerationFailed(reason) if reason.contains("unavailable")));
    assert!(history.lock().unwrap().is_empty());

    // the service is back to idle and accepts a new attempt
    let shot = handle.capture(CaptureMode::Fullscreen).await.unwrap();
    assert_eq!(shot.dimensions(), (1920, 1080));
}

#[tokio::test(start_paused = true)]
async fn watchdog_fails_a_hung_capture() {
    let backend = FakeBackend {
        capture_delay: Duration::from_secs(10),
        ..FakeBackend::default()
    };
    let (handle, history, _backend) = start(backend, ServiceOptions::default(), 10);

    let started = Instant::now();
    let err = handle.capture(CaptureMode::Fullscreen).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err, CaptureError::CaptureUnavailable);
    assert!(elapsed >= Duration::from_secs(3), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(10), "{elapsed:?}");
    assert!(history.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn fullscreen_waits_for_settle_delay() {
    let options = ServiceOptions {
        fullscreen_display: 1,
        ..ServiceOptions::default()
    };
    let (handle, _history, backend) = start(FakeBackend::default(), options, 10);

    let started = Instant::now();
    let shot = handle.capture(CaptureMode::Fullscreen).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(shot.capture_type(), CaptureMode::Fullscreen);
    assert!(matches!(&backend.targets()[..], [CaptureTarget::Display(s)] if s.id == 2));
}

#[tokio::test(start_paused = true)]
async fn degenerate_selection_reprompts() {
    let (handle, _history, _backend) = start(FakeBackend::default(), ServiceOptions::default(), 10);

    let capture = spawn_capture(&handle, CaptureMode::Area);
    let err = select_area(&handle, 0, Rect::new(10.0, 10.0, 3.0, 50.0)).await.unwrap_err();
    assert!(matches!(err, CaptureError::DegenerateSelection { .. }));

    select_area(&handle, 0, Rect::new(10.0, 10.0, 40.0, 50.0)).await.unwrap();
    assert_eq!(capture.await.unwrap().unwrap().dimensions(), (40, 50));
}

#[tokio::test(start_paused = true)]
async fn scrolling_capture_uses_stitcher() {
    let (handle, _history, backend) = start(FakeBackend::default(), ServiceOptions::default(), 10);

    let capture = spawn_capture(&handle, CaptureMode::Scrolling);
    select_window(&handle, 10).await.unwrap();
    let shot = capture.await.unwrap().unwrap();

    assert_eq!(shot.dimensions(), (640, 1440));
    assert_eq!(shot.capture_type(), CaptureMode::Scrolling);
    assert!(matches!(&backend.targets()[..], [CaptureTarget::Scrolling(w)] if w.id == 10));
}

#[tokio::test(start_paused = true)]
async fn history_is_bounded() {
    let (handle, history, _backend) = start(FakeBackend::default(), ServiceOptions::default(), 2);

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(handle.capture(CaptureMode::Fullscreen).await.unwrap().id());
    }

    let history = history.lock().unwrap();
    assert_eq!(history.len(), 2);
    let kept: Vec<_> = history.iter().map(|s| s.id()).collect();
    assert_eq!(kept, vec![ids[2], ids[1]]);
    assert_eq!(history.current().map(|s| s.id()), Some(ids[2]));
}

#[tokio::test(start_paused = true)]
async fn selection_without_capture_is_unexpected() {
    let (handle, _history, _backend) = start(FakeBackend::default(), ServiceOptions::default(), 10);
    assert!(matches!(
        handle.select_window(10).await,
        Err(CaptureError::UnexpectedEvent { .. })
    ));
}
