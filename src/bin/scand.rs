//! scand - scan session host
//!
//! This daemon:
//! 1. Loads configuration (SCAN_CONFIG file + SCAN_* environment)
//! 2. Opens a synthetic camera and registers the barcode and text engines
//! 3. Runs a scan session, logging every recognized result
//! 4. Optionally scans a single still image instead of the camera
//! 5. Releases the camera on Ctrl-C or after --seconds

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use scan_session::config::ScanConfig;
use scan_session::{
    ConsoleFeedback, FailureCode, FeedbackSink, ImageInput, OverlayMetadata, RecognitionMode,
    RecognitionResult, RecognizerRegistry, ScanSession, SessionListener, StubBarcodeRecognizer,
    StubTextRecognizer, SyntheticCamera,
};

const STATS_INTERVAL: Duration = Duration::from_secs(5);
const STILL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Recognition mode (barcode or text). Overrides SCAN_MODE.
    #[arg(long)]
    mode: Option<String>,
    /// Stop after this many seconds (runs until Ctrl-C when omitted).
    #[arg(long)]
    seconds: Option<u64>,
    /// Camera frame rate. Overrides SCAN_TARGET_FPS.
    #[arg(long)]
    fps: Option<u32>,
    /// Scan one still image (path or file:// URI) and exit.
    #[arg(long, value_name = "PATH")]
    image: Option<String>,
    /// Log feedback instead of ringing the terminal bell.
    #[arg(long)]
    quiet: bool,
    /// Start on the front camera.
    #[arg(long)]
    front: bool,
}

/// Logs results and forwards them to the main thread.
struct LoggingListener {
    events: mpsc::Sender<Outcome>,
}

enum Outcome {
    Success(RecognitionResult),
    Failure(FailureCode),
}

impl SessionListener for LoggingListener {
    fn on_success(&self, result: RecognitionResult, overlay: OverlayMetadata) {
        let (width, height) = overlay.upright_size();
        log::info!(
            "[{:?}] {} (frame {}x{}, {:?}{})",
            result.mode(),
            result.summary(),
            width,
            height,
            overlay.facing,
            if overlay.still_image { ", still" } else { "" }
        );
        if let Ok(json) = serde_json::to_string(&result) {
            log::debug!("result: {}", json);
        }
        let _ = self.events.send(Outcome::Success(result));
    }

    fn on_fail(&self, code: FailureCode, error: &anyhow::Error) {
        log::warn!("recognition failed (code {}): {:#}", code.code(), error);
        let _ = self.events.send(Outcome::Failure(code));
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = ScanConfig::load()?;
    if let Some(mode) = &args.mode {
        cfg.mode =
            RecognitionMode::parse(mode).ok_or_else(|| anyhow!("unknown mode '{}'", mode))?;
    }
    if let Some(fps) = args.fps {
        if fps == 0 {
            return Err(anyhow!("--fps must be greater than zero"));
        }
        cfg.camera.target_fps = fps;
    }
    if args.front {
        cfg.session.camera_facing = scan_session::CameraFacing::Front;
    }

    let camera = SyntheticCamera::new(cfg.synthetic_camera())?;
    let registry = RecognizerRegistry::new()
        .with(StubBarcodeRecognizer::new())
        .with(StubTextRecognizer::new());
    let feedback: Arc<dyn FeedbackSink> = if args.quiet {
        Arc::new(ConsoleFeedback::quiet())
    } else {
        Arc::new(ConsoleFeedback::new())
    };
    let session = ScanSession::new(
        Box::new(camera),
        registry,
        feedback,
        cfg.session_settings(),
    )?;

    let (tx, rx) = mpsc::channel();
    session.set_listener(Some(Arc::new(LoggingListener { events: tx })))?;

    let result = match args.image {
        Some(image) => scan_still(&session, image, &rx),
        None => run_camera(&session, args.seconds),
    };

    let stats = session.stats();
    session.on_teardown();
    log::info!(
        "scand finished: {} submitted, {} dispatched, {} dropped busy, {} results, {} failures",
        stats.frames_submitted,
        stats.frames_dispatched,
        stats.frames_dropped_busy,
        stats.results_delivered,
        stats.failures_delivered
    );
    result
}

fn scan_still(session: &ScanSession, image: String, rx: &mpsc::Receiver<Outcome>) -> Result<()> {
    let input = if image.contains("://") {
        ImageInput::Uri(image)
    } else {
        ImageInput::Path(image)
    };
    session.scan_image(input)?;
    match rx.recv_timeout(STILL_TIMEOUT) {
        Ok(Outcome::Success(result)) if result.is_empty() => {
            log::info!("nothing recognized in image");
            Ok(())
        }
        Ok(Outcome::Success(_)) => Ok(()),
        Ok(Outcome::Failure(code)) => Err(anyhow!("still-image scan failed (code {})", code.code())),
        Err(_) => Err(anyhow!("still-image scan timed out")),
    }
}

fn run_camera(session: &ScanSession, seconds: Option<u64>) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;

    session.on_foreground()?;
    log::info!(
        "scanning in {:?} mode on {:?} camera (torch available: {})",
        session.mode(),
        session.facing(),
        session.has_torch()
    );

    let started = Instant::now();
    let deadline = seconds.map(Duration::from_secs);
    let mut last_report = Instant::now();
    while !shutdown.load(Ordering::SeqCst) {
        if deadline.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
        if last_report.elapsed() >= STATS_INTERVAL {
            let stats = session.stats();
            log::info!(
                "stats: submitted={} dispatched={} dropped_busy={} results={}",
                stats.frames_submitted,
                stats.frames_dispatched,
                stats.frames_dropped_busy,
                stats.results_delivered
            );
            last_report = Instant::now();
        }
    }

    session.on_background();
    Ok(())
}
