mod actuator;
mod pushover;
mod routes;
mod snapshot;
mod stream;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use picam_common::config::{Config, ConfigError};
use picam_controller::ports::{ActuatorError, CaptureError, NotifyError, PersistError};
use picam_controller::{
    ControlSurface, FrameStore, LedTargetStore, LoopTimings, MotionDetector, NotificationQueue,
    Runtime,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::pushover::PushoverNotifier;
use crate::routes::AppState;
use crate::snapshot::JpegDirectory;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("camera: {0}")]
    Camera(#[from] CaptureError),
    #[error("LED driver: {0}")]
    Led(#[from] ActuatorError),
    #[error("snapshot directory: {0}")]
    Snapshot(#[from] PersistError),
    #[error("notifier: {0}")]
    Notifier(#[from] NotifyError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("HTTP server: {0}")]
    Serve(std::io::Error),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let explicit = std::env::args().nth(1).map(PathBuf::from);
    let config_path = explicit
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match load_config(&config_path, explicit.is_some()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    for warning in config.warnings() {
        warn!(config = %config_path.display(), "{warning}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "picam stopped");
        std::process::exit(1);
    }
}

/// A missing default config file means "run with defaults".
fn load_config(path: &Path, explicit: bool) -> Result<Config, ConfigError> {
    if !explicit && !path.exists() {
        return Ok(Config::default());
    }
    Config::load(path)
}

async fn run(config: Config) -> Result<(), StartupError> {
    let cancel = CancellationToken::new();

    let camera = picam_capture::from_config(&config.camera)?;
    let led = actuator::from_config(&config.led)?;
    let snapshots = Arc::new(JpegDirectory::new(
        config.snapshot.dir.clone(),
        config.snapshot.jpeg_quality,
    )?);

    let (notifications, notify_worker) = if config.notify.enabled {
        let notifier = Arc::new(PushoverNotifier::new(&config.notify)?);
        let (queue, worker) =
            NotificationQueue::spawn(notifier, config.notify.queue_depth, cancel.clone());
        (queue, Some(worker))
    } else {
        info!("push notifications disabled");
        (NotificationQueue::disabled(), None)
    };

    let frames = Arc::new(FrameStore::new());
    let leds = Arc::new(LedTargetStore::new(config.led.auto_on_start));

    let runtime = Runtime::start(
        camera,
        MotionDetector::from_config(&config.motion),
        led,
        Arc::clone(&frames),
        Arc::clone(&leds),
        LoopTimings::from(&config.timing),
        cancel.clone(),
    );

    let control = ControlSurface::new(
        frames,
        leds,
        snapshots,
        notifications,
        config.timing.flash_duration(),
    );
    let app = routes::router(Arc::new(AppState {
        control,
        stream: config.stream.clone(),
        cancel: cancel.clone(),
    }));

    let addr = format!("{}:{}", config.api.bind, config.api.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(source) => {
            runtime.shutdown().await;
            return Err(StartupError::Bind { addr, source });
        }
    };
    info!(addr, "picam server starting");

    let shutdown = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_signal().await;
            info!("Received shutdown signal");
            shutdown.cancel();
        })
        .await;

    // Loops stop on the same token; the render loop turns the LED off on its way out.
    if tokio::time::timeout(SHUTDOWN_GRACE, runtime.shutdown())
        .await
        .is_err()
    {
        warn!("controller shutdown timed out after 5s");
    }
    if let Some(worker) = notify_worker {
        if tokio::time::timeout(SHUTDOWN_GRACE, worker).await.is_err() {
            warn!("notification worker did not stop within 5s");
        }
    }

    served.map_err(StartupError::Serve)
}

async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the process is stopped externally.
        error!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
