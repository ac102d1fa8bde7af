//! shotmark - headless screen capture and annotation
//!
//! See `cli.rs` for usage.

use std::process::ExitCode;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use shotmark_lib::annotation::{Annotation, AnnotationSession};
use shotmark_lib::backend::CaptureBackend;
use shotmark_lib::compose::CompositingEngine;
use shotmark_lib::config::load_config;
use shotmark_lib::orchestrator::Headless;
use shotmark_lib::service::{shared_history, CaptureHandle, CaptureService, ServiceOptions};
use shotmark_lib::xcap_backend::XcapBackend;
use shotmark_lib::{candidate_filter, export, orchestrator_from_config, AppConfig, CaptureError, CaptureMode, Screenshot};

mod cli;

use cli::{CliCommand, CliOptions};

/// Selections can race the capture request into the service; retry while it is still starting.
const SELECT_RETRIES: u32 = 40;
const SELECT_RETRY_DELAY: Duration = Duration::from_millis(50);

fn print_help() {
    eprintln!("Usage: shotmark <displays|windows|fullscreen [display]|area <display> <x,y,w,h>|window <id>>");
    eprintln!("       [--out <dir>] [--annotations <file>] [--scale <factor>] [--json]");
}

#[tokio::main]
async fn main() -> ExitCode {
    shotmark_lib::init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    let (command, options) = match cli::parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            return ExitCode::FAILURE;
        }
    };

    match run(command, options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: CliCommand, options: CliOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config();
    let backend = Arc::new(XcapBackend::new());

    match command {
        CliCommand::Displays => {
            let surfaces = backend.displays()?;
            let listed: Vec<_> = surfaces.iter().collect();
            if options.json {
                println!("{}", serde_json::to_string_pretty(&listed)?);
            } else {
                for (i, s) in listed.iter().enumerate() {
                    println!(
                        "{}: {}x{} at ({}, {}) scale {}",
                        i, s.width, s.height, s.x, s.y, s.scale_factor
                    );
                }
            }
            Ok(())
        }
        CliCommand::Windows => {
            let filter = candidate_filter(&config);
            let windows = filter.apply(backend.windows().await.map_err(CaptureError::CandidateEnumerationFailed)?);
            if options.json {
                println!("{}", serde_json::to_string_pretty(&windows)?);
            } else {
                for w in &windows {
                    println!(
                        "{}: {} ({}x{})",
                        w.id,
                        w.title.as_deref().unwrap_or("<untitled>"),
                        w.width,
                        w.height
                    );
                }
            }
            Ok(())
        }
        CliCommand::Fullscreen { display } => {
            capture_and_save(&config, backend, &options, CaptureMode::Fullscreen, display, |_| async {
                Ok(())
            })
            .await
        }
        CliCommand::Area { display, rect } => {
            capture_and_save(&config, backend, &options, CaptureMode::Area, 0, move |handle| async move {
                select_with_retry(|| {
                    let handle = handle.clone();
                    async move { handle.select_area(display, rect).await }
                })
                .await
            })
            .await
        }
        CliCommand::Window { id } => {
            capture_and_save(&config, backend, &options, CaptureMode::Window, 0, move |handle| async move {
                select_with_retry(|| {
                    let handle = handle.clone();
                    async move { handle.select_window(id).await }
                })
                .await
            })
            .await
        }
    }
}

async fn select_with_retry<F, Fut>(mut select: F) -> Result<(), CaptureError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), CaptureError>>,
{
    let mut attempts = 0;
    loop {
        match select().await {
            Err(CaptureError::UnexpectedEvent { .. }) if attempts < SELECT_RETRIES => {
                attempts += 1;
                tokio::time::sleep(SELECT_RETRY_DELAY).await;
            }
            other => return other,
        }
    }
}

async fn capture_and_save<S, Fut>(
    config: &AppConfig,
    backend: Arc<XcapBackend>,
    options: &CliOptions,
    mode: CaptureMode,
    fullscreen_display: usize,
    select: S,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: FnOnce(CaptureHandle) -> Fut,
    Fut: std::future::Future<Output = Result<(), CaptureError>>,
{
    let history = shared_history(config);
    let service = CaptureService::new(
        orchestrator_from_config(config, Box::new(Headless)),
        backend,
        Arc::clone(&history),
        ServiceOptions {
            fullscreen_display,
            ..ServiceOptions::from(config)
        },
    );
    let (handle, _task) = service.spawn();

    let capture = tokio::spawn({
        let handle = handle.clone();
        async move { handle.capture(mode).await }
    });
    if let Err(e) = select(handle.clone()).await {
        handle.cancel().await;
        let _ = capture.await;
        return Err(e.into());
    }
    let screenshot = capture.await??;

    let screenshot = match &options.annotations {
        Some(path) => annotate(screenshot, &std::fs::read_to_string(path)?, &history)?,
        None => screenshot,
    };

    let engine = CompositingEngine::from_config(config);
    let rendered = engine.render_screenshot(&screenshot);
    let rendered = match options.scale {
        Some(factor) => export::scale_image(&rendered, factor),
        None => rendered,
    };

    let dir = options.out.clone().unwrap_or_else(|| config.output_dir());
    let path = export::save_capture(&rendered, &dir, screenshot.captured_at())?;

    if options.json {
        let (w, h) = screenshot.point_size();
        let summary = serde_json::json!({
            "id": screenshot.id(),
            "path": path,
            "mode": screenshot.capture_type(),
            "width": rendered.width(),
            "height": rendered.height(),
            "point_width": w,
            "point_height": h,
            "annotations": screenshot.annotations.len(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn annotate(
    screenshot: Screenshot,
    json: &str,
    history: &shotmark_lib::SharedHistory,
) -> Result<Screenshot, Box<dyn std::error::Error>> {
    let mut session = AnnotationSession::begin(screenshot);
    for annotation in Annotation::list_from_json(json)? {
        session.append(annotation);
    }
    let committed = session.commit();
    history
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(committed.clone());
    Ok(committed)
}
