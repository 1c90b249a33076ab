//! Frame-sequence viewer (seqview-player) - Main entry point
//!
//! `play` (default): fetch the manifest, prime the frame buffer and play
//! the sequence, controlled from stdin.
//! `build-manifest`: write images.json / latest.json from a directory of
//! downloaded frames.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use seqview_common::config::{ConfigOverrides, ConfigResolver, LoggingConfig};
use seqview_common::events::EventBus;
use seqview_common::{BufferPolicy, PlayerConfig};
use seqview_player::control::{self, ControlCommand};
use seqview_player::manifest_builder::{self, ManifestBuildOptions, RemoteSource};
use seqview_player::playback::{FrameSurface, LogSurface, MirrorSurface};
use seqview_player::{viewer, ManifestLoader, ManifestLocation, SourceLoader};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for seqview-player
#[derive(Parser, Debug)]
#[command(name = "seqview-player")]
#[command(about = "Frame-sequence viewer: buffered looping playback of an image manifest")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "SEQVIEW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the manifest and play it (default)
    Play(PlayArgs),
    /// Write images.json and latest.json from a directory of frames
    BuildManifest(BuildArgs),
}

#[derive(Args, Debug, Default)]
struct PlayArgs {
    /// Manifest URL or path
    #[arg(short, long)]
    manifest: Option<String>,

    /// Playback rate in frames per second
    #[arg(long)]
    fps: Option<f64>,

    /// End-of-loop hold on the last frame, in milliseconds
    #[arg(long = "hold-ms")]
    hold_ms: Option<u64>,

    /// Frames to keep loaded ahead of the cursor, or "all"
    #[arg(long)]
    buffer: Option<BufferPolicy>,

    /// Start paused instead of playing
    #[arg(long)]
    paused: bool,

    /// Fail frame loads that take longer than this, in milliseconds
    #[arg(long = "load-timeout-ms")]
    load_timeout_ms: Option<u64>,

    /// Also write each displayed frame to this file
    #[arg(long)]
    mirror: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl PlayArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            manifest: self.manifest.clone(),
            fps: self.fps,
            last_frame_hold_ms: self.hold_ms,
            buffer_size: self.buffer,
            autoplay: self.paused.then_some(false),
            load_timeout_ms: self.load_timeout_ms,
            log_level: self.log_level.clone(),
        }
    }
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Directory holding the frames
    #[arg(short, long)]
    dir: PathBuf,

    /// HTTP directory listing to download missing frames from first
    #[arg(long)]
    source: Option<String>,

    /// Per-frame download timeout in seconds
    #[arg(long = "download-timeout-secs", default_value_t = 30)]
    download_timeout_secs: u64,

    /// Manifest output (default: images.json next to the directory)
    #[arg(long)]
    out: Option<PathBuf>,

    /// latest.json output (default: latest.json next to the directory)
    #[arg(long)]
    latest: Option<PathBuf>,

    /// Only files ending with this suffix are frames
    #[arg(long, default_value = manifest_builder::DEFAULT_SUFFIX)]
    suffix: String,

    /// Number of newest frames to keep
    #[arg(long, default_value_t = manifest_builder::DEFAULT_KEEP)]
    keep: usize,

    /// Path prefix for manifest entries
    #[arg(long, default_value = manifest_builder::DEFAULT_PREFIX)]
    prefix: String,

    /// Delete files in the directory that are not kept
    #[arg(long)]
    prune: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::BuildManifest(args)) => {
            init_tracing(&LoggingConfig::default())?;
            build_manifest(args).await
        }
        Some(Command::Play(args)) => play(cli.config, args).await,
        None => play(cli.config, PlayArgs::default()).await,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let default_filter = format!(
        "seqview_player={level},seqview_common={level}",
        level = logging.level
    );

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

async fn play(config_path: Option<PathBuf>, args: PlayArgs) -> Result<()> {
    let config = ConfigResolver::new(config_path)
        .resolve(&args.overrides())
        .context("Failed to resolve configuration")?;
    init_tracing(&config.logging)?;

    info!(
        "Starting seqview-player {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    log_config(&config);

    let events = Arc::new(EventBus::new(config.event_capacity));
    let status = tokio::spawn(log_status(events.subscribe()));
    debug!(capacity = events.capacity(), "Event bus ready");

    let location = ManifestLocation::parse(&config.manifest).context("Invalid manifest location")?;
    let client = reqwest::Client::new();
    let manifest = ManifestLoader::new(client.clone(), location.clone());
    let frames = viewer::fetch_manifest(&manifest, &events)
        .await
        .context("Failed to load manifest")?;

    let loader = Arc::new(SourceLoader::for_manifest(client, &location));
    let surface: Box<dyn FrameSurface> = match &args.mirror {
        Some(path) => {
            info!("Mirroring displayed frames to {}", path.display());
            Box::new(MirrorSurface::new(path))
        }
        None => Box::new(LogSurface),
    };

    let player = viewer::launch(&config, frames, loader, surface, Arc::clone(&events))
        .await
        .context("Failed to start playback")?;
    let Some(player) = player else {
        status.abort();
        return Ok(());
    };

    info!("{}", control::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&player.handle, &line).await {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Input closed, shutting down");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read input: {}", e);
                    break;
                }
            },
            _ = shutdown_signal() => break,
        }
    }

    if let Err(e) = player.handle.shutdown().await {
        warn!("Player already stopped: {}", e);
    }
    let session = player.task.await.context("Player task failed")?;
    info!(
        cursor = session.cursor(),
        cached = session.buffer().cache().len(),
        loads = session.buffer().loads_issued(),
        cached_bytes = session.buffer().cache().total_bytes(),
        "Shutdown complete"
    );
    status.abort();
    Ok(())
}

/// Returns false when the user asked to quit
async fn handle_line(handle: &seqview_player::playback::PlayerHandle, line: &str) -> bool {
    let command = match line.parse::<ControlCommand>() {
        Ok(ControlCommand::Quit) => return false,
        Ok(command) => command,
        Err(e) => {
            warn!("{} ({})", e, control::HELP);
            return true;
        }
    };

    match control::apply(handle, command).await {
        Ok(Some(snapshot)) => info!("{}", control::describe(&snapshot)),
        Ok(None) => {}
        Err(e) if e.kind() == seqview_player::ErrorKind::InvalidInput => warn!("{}", e),
        Err(e) => {
            error!("Player unavailable: {}", e);
            return false;
        }
    }
    true
}

fn log_config(config: &PlayerConfig) {
    info!("Manifest: {}", config.manifest);
    info!(
        "Playback: {} fps, last frame hold {} ms, buffer {}, autoplay {}",
        config.fps,
        config.last_frame_hold.as_millis(),
        config.buffer,
        config.autoplay
    );
    match config.load_timeout {
        Some(timeout) => info!("Frame load timeout: {} ms", timeout.as_millis()),
        None => info!("Frame load timeout: none"),
    }
}

/// Log the status line of every viewer event
async fn log_status(mut rx: broadcast::Receiver<seqview_common::events::ViewerEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                match event.status_text() {
                    Some(text) => info!("{}", text),
                    None => debug!(event = event.event_type(), "Viewer event"),
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Status log lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn build_manifest(args: BuildArgs) -> Result<()> {
    let mut options = ManifestBuildOptions::for_dir(&args.dir);
    if let Some(out) = args.out {
        options.manifest_out = out;
    }
    if let Some(latest) = args.latest {
        options.latest_out = latest;
    }
    options.suffix = args.suffix;
    options.keep = args.keep;
    options.prefix = args.prefix;
    options.prune = args.prune;
    if let Some(url) = &args.source {
        let mut source = RemoteSource::new(reqwest::Client::new(), url).context("Invalid --source")?;
        source.download_timeout = Duration::from_secs(args.download_timeout_secs.max(1));
        options.source = Some(source);
    }

    let build = manifest_builder::build_manifest(&options)
        .await
        .context("Failed to build manifest")?;
    if let Some(fetched) = &build.fetched {
        info!(
            "Mirrored {} frames: {} downloaded, {} failed",
            fetched.selected.len(),
            fetched.downloaded.len(),
            fetched.failed.len()
        );
    }
    info!(
        "Manifest has {} frames, {} files pruned",
        build.entries.len(),
        build.pruned.len()
    );
    Ok(())
}

/// Ctrl+C / SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
