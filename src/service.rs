//! Async driver around [`CaptureOrchestrator`].
//!
//! The service runs as a single task. UI code talks to it through a cloneable
//! [`CaptureHandle`]; every orchestrator transition happens inside that task, and
//! collaborator futures are raced against incoming commands with `tokio::select!`.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use image::RgbaImage;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::backend::CaptureBackend;
use crate::config::AppConfig;
use crate::error::CaptureError;
use crate::history::{CaptureHistory, SharedHistory};
use crate::orchestrator::CaptureOrchestrator;
use crate::screenshot::Screenshot;
use crate::state::{AttemptId, CaptureTarget};
use crate::types::{CaptureMode, Rect};

type Reply<T> = oneshot::Sender<Result<T, CaptureError>>;

/// User input from a selection affordance.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    Area { surface: usize, rect: Rect },
    Window(u32),
}

#[derive(Debug)]
pub enum Command {
    Capture {
        mode: CaptureMode,
        reply: Reply<Screenshot>,
    },
    Select {
        event: SelectionEvent,
        reply: Reply<()>,
    },
    Cancel,
}

/// Timing knobs for one service.
#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub settle_delay: Duration,
    pub capture_timeout: Duration,
    /// Display grabbed in Fullscreen mode.
    pub fullscreen_display: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            capture_timeout: Duration::from_secs(3),
            fullscreen_display: 0,
        }
    }
}

impl From<&AppConfig> for ServiceOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            capture_timeout: Duration::from_millis(config.capture_timeout_ms),
            fullscreen_display: 0,
        }
    }
}

pub struct CaptureService {
    orchestrator: CaptureOrchestrator,
    backend: Arc<dyn CaptureBackend>,
    history: SharedHistory,
    options: ServiceOptions,
}

impl CaptureService {
    pub fn new(
        orchestrator: CaptureOrchestrator,
        backend: Arc<dyn CaptureBackend>,
        history: SharedHistory,
        options: ServiceOptions,
    ) -> Self {
        Self {
            orchestrator,
            backend,
            history,
            options,
        }
    }

    pub fn history(&self) -> SharedHistory {
        Arc::clone(&self.history)
    }

    /// Move the service onto its own task.
    pub fn spawn(self) -> (CaptureHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(32);
        let task = tokio::spawn(self.run(rx));
        (CaptureHandle { tx }, task)
    }

    /// Process commands until every handle is dropped.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Capture { mode, reply } => {
                    let result = self.run_attempt(mode, &mut commands).await;
                    match &result {
                        Ok(_) | Err(CaptureError::CaptureCancelled) => {}
                        Err(e) => log::error!("[service] {} capture failed: {}", mode, e),
                    }
                    let _ = reply.send(result);
                    self.orchestrator.reset();
                }
                Command::Select { reply, .. } => {
                    let _ = reply.send(Err(CaptureError::UnexpectedEvent {
                        state: self.orchestrator.state().to_string(),
                        event: "select",
                    }));
                }
                Command::Cancel => log::debug!("[service] cancel with no capture in progress"),
            }
        }
        log::debug!("[service] all handles dropped, stopping");
    }

    async fn run_attempt(
        &mut self,
        mode: CaptureMode,
        commands: &mut mpsc::Receiver<Command>,
    ) -> Result<Screenshot, CaptureError> {
        let surfaces = self.backend.displays()?;
        let attempt = self.orchestrator.begin(mode, surfaces)?;
        log::info!("[service] {} capture started ({})", mode, attempt);

        let target = self.await_selection(attempt, mode, commands).await?;
        let image = self.acquire(target, commands).await;

        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        self.orchestrator.capture_finished(attempt, image, &mut history)
    }

    async fn await_selection(
        &mut self,
        attempt: AttemptId,
        mode: CaptureMode,
        commands: &mut mpsc::Receiver<Command>,
    ) -> Result<CaptureTarget, CaptureError> {
        let mut enumeration = if mode.needs_candidates() {
            let backend = Arc::clone(&self.backend);
            Some(tokio::spawn(async move { backend.windows().await }))
        } else {
            None
        };

        let settle = tokio::time::sleep(self.options.settle_delay);
        tokio::pin!(settle);
        let wants_settle = mode == CaptureMode::Fullscreen;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    None | Some(Command::Cancel) => {
                        if enumeration.is_some() {
                            log::debug!("[service] cancelled while window list pending; its result will be dropped");
                        }
                        self.orchestrator.cancel();
                        return Err(CaptureError::CaptureCancelled);
                    }
                    Some(Command::Select { event, reply }) => {
                        let result = match event {
                            SelectionEvent::Area { surface, rect } => {
                                self.orchestrator.select_area(surface, rect)
                            }
                            SelectionEvent::Window(id) => self.orchestrator.select_window(id),
                        };
                        match result {
                            Ok(target) => {
                                let _ = reply.send(Ok(()));
                                return Ok(target);
                            }
                            Err(e) => {
                                log::warn!("[service] selection rejected: {}", e);
                                let _ = reply.send(Err(e));
                            }
                        }
                    }
                    Some(Command::Capture { reply, .. }) => reject_busy(reply),
                },
                joined = async {
                    match enumeration.as_mut() {
                        Some(task) => task.await,
                        None => std::future::pending().await,
                    }
                }, if enumeration.is_some() =>
                {
                    enumeration = None;
                    let result = joined.unwrap_or_else(|e| Err(format!("enumeration task failed: {e}")));
                    self.orchestrator.candidates_ready(attempt, result)?;
                }
                _ = &mut settle, if wants_settle => {
                    return self.orchestrator.select_display(self.options.fullscreen_display);
                }
            }
        }
    }

    /// Run the capture primitive under the watchdog. Commands that arrive meanwhile are
    /// answered without disturbing the attempt.
    async fn acquire(
        &mut self,
        target: CaptureTarget,
        commands: &mut mpsc::Receiver<Command>,
    ) -> Option<RgbaImage> {
        let backend = Arc::clone(&self.backend);
        let timeout = self.options.capture_timeout;
        let work = tokio::time::timeout(timeout, async move {
            match &target {
                CaptureTarget::Scrolling(window) => backend.stitch_scrolling(window).await,
                other => backend.capture(other).await,
            }
        });
        tokio::pin!(work);

        let outcome = loop {
            tokio::select! {
                outcome = &mut work => break outcome,
                command = commands.recv() => match command {
                    Some(Command::Capture { reply, .. }) => reject_busy(reply),
                    Some(Command::Select { reply, .. }) => {
                        let _ = reply.send(Err(CaptureError::UnexpectedEvent {
                            state: "Capturing".to_string(),
                            event: "select",
                        }));
                    }
                    Some(Command::Cancel) => log::debug!("[service] cancel ignored while capturing"),
                    None => break (&mut work).await,
                },
            }
        };

        match outcome {
            Ok(image) => image,
            Err(_) => {
                log::warn!("[service] capture watchdog fired after {:?}", timeout);
                None
            }
        }
    }
}

fn reject_busy(reply: Reply<Screenshot>) {
    log::warn!("[service] rejecting capture request: {}", CaptureError::CaptureInProgress);
    let _ = reply.send(Err(CaptureError::CaptureInProgress));
}

/// Cloneable front end to a running [`CaptureService`].
#[derive(Clone, Debug)]
pub struct CaptureHandle {
    tx: mpsc::Sender<Command>,
}

impl CaptureHandle {
    /// Start a capture and wait for its outcome. Fails fast with `CaptureInProgress`
    /// when another attempt is running.
    pub async fn capture(&self, mode: CaptureMode) -> Result<Screenshot, CaptureError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Capture { mode, reply }).await?;
        rx.await.unwrap_or(Err(CaptureError::CaptureCancelled))
    }

    pub async fn select_area(&self, surface: usize, rect: Rect) -> Result<(), CaptureError> {
        self.select(SelectionEvent::Area { surface, rect }).await
    }

    pub async fn select_window(&self, window_id: u32) -> Result<(), CaptureError> {
        self.select(SelectionEvent::Window(window_id)).await
    }

    pub async fn cancel(&self) {
        let _ = self.tx.send(Command::Cancel).await;
    }

    async fn select(&self, event: SelectionEvent) -> Result<(), CaptureError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Select { event, reply }).await?;
        rx.await.unwrap_or(Err(CaptureError::CaptureCancelled))
    }

    async fn send(&self, command: Command) -> Result<(), CaptureError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| CaptureError::CaptureCancelled)
    }
}

/// New shared history sized from config.
pub fn shared_history(config: &AppConfig) -> SharedHistory {
    Arc::new(std::sync::Mutex::new(CaptureHistory::new(config.history_capacity)))
}
