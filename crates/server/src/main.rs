use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mixdown_core::{
    load_config, validate_config, CommandSynthesizer, CompositionEngine, FfmpegRunner, Janitor,
    MediaResolver, Resolver, ResourceMonitor, StageRunner, TaskRegistry, Transcriber,
    WhisperCliTranscriber,
};

use mixdown_server::{create_router, AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("MIXDOWN_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration (defaults when no file is present)
    let config = if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        info!("No config file at {:?}, using defaults", config_path);
        mixdown_core::Config::default()
    };

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("mixdown {} starting", VERSION);
    info!("Temp root: {:?}", config.engine.temp_dir);
    info!("Results root: {:?}", config.engine.results_dir);

    // Compute config hash for the startup log
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Config hash: {}", &config_hash[..16]);

    // Create workspace roots
    tokio::fs::create_dir_all(&config.engine.temp_dir)
        .await
        .context("Failed to create temp root")?;
    tokio::fs::create_dir_all(&config.engine.results_dir)
        .await
        .context("Failed to create results root")?;

    // Create the stage runner and check the external toolchain
    let runner = Arc::new(FfmpegRunner::new(config.ffmpeg.clone()));
    match runner.validate().await {
        Ok(()) => info!("FFmpeg toolchain available"),
        Err(e) => warn!("FFmpeg toolchain check failed: {} (tasks will fail)", e),
    }

    // Create the task registry
    let registry = Arc::new(TaskRegistry::new());

    // Create the resource monitor
    let monitor = Arc::new(ResourceMonitor::new(
        config.resources.clone(),
        config.engine.temp_dir.clone(),
    ));

    // Create the janitor
    let janitor = Arc::new(Janitor::new(Arc::clone(&registry), &config.engine));

    // Background loops share a shutdown token; the cleanup notify links
    // memory-pressure events to an immediate janitor sweep
    let shutdown = CancellationToken::new();
    let cleanup_wake = Arc::new(Notify::new());
    let monitor_handle = Arc::clone(&monitor).start(Arc::clone(&cleanup_wake), shutdown.clone());
    let janitor_handle = Arc::clone(&janitor).start(Arc::clone(&cleanup_wake), shutdown.clone());
    info!("Resource monitor and janitor started");

    // Create the source resolver
    let resolver: Arc<dyn Resolver> = Arc::new(MediaResolver::new(
        Arc::clone(&runner),
        config.resolver.clone(),
    ));

    // Create the transcriber if configured
    let transcriber: Option<Arc<dyn Transcriber>> = match &config.transcriber {
        Some(transcriber_config) => {
            info!(
                "Transcriber enabled: {:?} (model {})",
                transcriber_config.binary_path, transcriber_config.model
            );
            Some(Arc::new(WhisperCliTranscriber::new(
                transcriber_config.clone(),
            )))
        }
        None => {
            info!("No transcriber configured; transcription tasks disabled");
            None
        }
    };

    // Create the engine
    let synthesizer = Arc::new(CommandSynthesizer::new(
        config.ffmpeg.clone(),
        config.subtitle.clone(),
    ));
    let engine = Arc::new(CompositionEngine::new(
        config.engine.clone(),
        config.subtitle.clone(),
        Arc::clone(&registry),
        Arc::clone(&runner),
        synthesizer,
        resolver,
        transcriber,
        Arc::clone(&monitor),
    ));
    info!(
        "Engine ready (concurrency ceiling: {})",
        config.engine.max_concurrent_tasks
    );

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), engine, monitor, janitor));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop background loops
    info!("Server shutting down...");
    shutdown.cancel();
    let _ = monitor_handle.await;
    let _ = janitor_handle.await;
    info!("Background loops stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
