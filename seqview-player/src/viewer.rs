//! Viewer startup
//!
//! Manifest → initial buffer fill → first frame → player task. Mirrors the
//! loading / content views of a page: status events announce which view
//! is current, and playback only starts once the initial fill has
//! produced at least one frame.

use crate::error::{Error, Result};
use crate::frame::FrameList;
use crate::loader::FrameLoader;
use crate::manifest::ManifestLoader;
use crate::playback::{spawn_player, FrameSurface, PlayerHandle, PlayerSession};
use seqview_common::events::{EventBus, ViewMode, ViewerEvent};
use seqview_common::PlayerConfig;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info};

/// A started player: control handle plus the task owning the session
pub struct RunningPlayer<L: FrameLoader, S: FrameSurface> {
    pub handle: PlayerHandle,
    pub task: JoinHandle<PlayerSession<L, S>>,
}

/// Fetch the manifest once and announce the outcome
pub async fn fetch_manifest(manifest: &ManifestLoader, events: &EventBus) -> Result<FrameList> {
    match manifest.load().await {
        Ok(frames) => {
            events.emit_lossy(ViewerEvent::ManifestLoaded {
                frame_count: frames.len(),
                timestamp: chrono::Utc::now(),
            });
            Ok(frames)
        }
        Err(e) => {
            error!("Failed to load manifest from {}: {}", manifest.location(), e);
            events.emit_lossy(ViewerEvent::ManifestFailed {
                error: e.to_string(),
                timestamp: chrono::Utc::now(),
            });
            Err(e)
        }
    }
}

/// Prime the buffer, show frame 0 and start the player task
///
/// An empty frame list is "nothing to do": Ok(None), no task. When the
/// initial fill loads no frame at all the viewer stays on the loading
/// view and returns the failure.
pub async fn launch<L, S>(
    config: &PlayerConfig,
    frames: FrameList,
    loader: Arc<L>,
    surface: S,
    events: Arc<EventBus>,
) -> Result<Option<RunningPlayer<L, S>>>
where
    L: FrameLoader,
    S: FrameSurface,
{
    config.validate()?;
    if frames.is_empty() {
        info!("Manifest lists no frames, nothing to play");
        return Ok(None);
    }

    events.emit_lossy(ViewerEvent::ViewChanged {
        view: ViewMode::Loading,
        timestamp: chrono::Utc::now(),
    });

    let mut session = PlayerSession::from_config(config, frames, loader, surface, Arc::clone(&events));
    let report = session.prime().await;
    if report.all_failed() {
        error!("Initial buffer fill failed for all {} frames", report.failed.len());
        events.emit_lossy(ViewerEvent::InitialLoadFailed {
            failed: report.failed.len(),
            timestamp: chrono::Utc::now(),
        });
        let (frame_id, _) = report
            .failed
            .into_iter()
            .next()
            .ok_or_else(|| Error::Internal("empty failure report".to_string()))?;
        return Err(Error::frame_load(frame_id, "initial buffer fill loaded no frames"));
    }

    info!(
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        frames = session.frames().len(),
        "Initial buffer ready"
    );
    events.emit_lossy(ViewerEvent::ViewChanged {
        view: ViewMode::Content,
        timestamp: chrono::Utc::now(),
    });

    session.display(0);
    if config.autoplay {
        session.play(Instant::now());
    }

    let (handle, task) = spawn_player(session, config.tick_interval);
    Ok(Some(RunningPlayer { handle, task }))
}
