//! Test helpers for seqview-player integration tests
//!
//! - MockLoader: scripted frame loader (failures, delays, hangs, call log)
//! - RecordingSurface: remembers every displayed frame
//! - builders for frame lists, timing and sessions

#![allow(dead_code)]

pub mod mock_loader;
pub mod surface;

pub use mock_loader::MockLoader;
pub use surface::RecordingSurface;

use seqview_common::events::EventBus;
use seqview_common::BufferPolicy;
use seqview_player::playback::{FrameBuffer, PlaybackTiming, PlayerSession};
use seqview_player::FrameList;
use std::sync::Arc;
use std::time::Duration;

pub type TestSession = PlayerSession<MockLoader, RecordingSurface>;

/// 100 ms per frame (10 fps), 1 s hold on the last frame
pub fn test_timing() -> PlaybackTiming {
    PlaybackTiming {
        frame_interval: Duration::from_millis(100),
        last_frame_hold: Duration::from_millis(1000),
    }
}

pub fn frame_list(ids: &[&str]) -> FrameList {
    FrameList::new(ids.iter().map(|id| id.to_string()).collect())
}

/// `frame_000.png`, `frame_001.png`, ...
pub fn numbered_frames(count: usize) -> FrameList {
    FrameList::new((0..count).map(|i| format!("frame_{:03}.png", i)).collect())
}

pub fn buffer(loader: &MockLoader, policy: BufferPolicy, events: Arc<EventBus>) -> FrameBuffer<MockLoader> {
    FrameBuffer::new(Arc::new(loader.clone()), policy, events)
}

/// Paused session on frame 0, nothing loaded yet
pub fn session(frames: FrameList, loader: &MockLoader, policy: BufferPolicy) -> (TestSession, RecordingSurface) {
    session_with_events(frames, loader, policy, Arc::new(EventBus::default()))
}

pub fn session_with_events(
    frames: FrameList,
    loader: &MockLoader,
    policy: BufferPolicy,
    events: Arc<EventBus>,
) -> (TestSession, RecordingSurface) {
    let surface = RecordingSurface::default();
    let session = PlayerSession::new(
        frames,
        buffer(loader, policy, events),
        surface.clone(),
        test_timing(),
    );
    (session, surface)
}
