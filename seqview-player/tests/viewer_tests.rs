//! Startup sequence: manifest → initial fill → first frame → player task

mod helpers;

use helpers::{frame_list, numbered_frames, MockLoader, RecordingSurface};
use seqview_common::events::{EventBus, PlaybackState, ViewMode, ViewerEvent};
use seqview_common::{BufferPolicy, PlayerConfig};
use seqview_player::{viewer, ErrorKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn config(buffer: BufferPolicy, autoplay: bool) -> PlayerConfig {
    PlayerConfig {
        fps: 10.0,
        buffer,
        autoplay,
        ..PlayerConfig::default()
    }
}

fn drain(rx: &mut broadcast::Receiver<ViewerEvent>) -> Vec<ViewerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_empty_manifest_is_nothing_to_do() {
    let loader = MockLoader::new();
    let events = Arc::new(EventBus::default());

    let player = viewer::launch(
        &config(BufferPolicy::All, true),
        frame_list(&[]),
        Arc::new(loader.clone()),
        RecordingSurface::default(),
        events,
    )
    .await
    .unwrap();

    assert!(player.is_none());
    assert_eq!(loader.total_calls(), 0);
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_loading() {
    let loader = MockLoader::new();
    let config = PlayerConfig {
        fps: 0.0,
        ..config(BufferPolicy::All, true)
    };

    let result = viewer::launch(
        &config,
        numbered_frames(3),
        Arc::new(loader.clone()),
        RecordingSurface::default(),
        Arc::new(EventBus::default()),
    )
    .await;

    let err = result.err().expect("launch should fail");
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(loader.total_calls(), 0);
}

#[tokio::test]
async fn test_launch_shows_first_frame_and_autoplays() {
    let loader = MockLoader::new();
    let surface = RecordingSurface::default();
    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();

    let player = viewer::launch(
        &config(BufferPolicy::Window(2), true),
        numbered_frames(4),
        Arc::new(loader.clone()),
        surface.clone(),
        Arc::clone(&events),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(surface.shown().first(), Some(&(0, "frame_000.png".to_string())));
    assert_eq!(loader.total_calls(), 2);

    let snapshot = player.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, PlaybackState::Playing);

    let views: Vec<ViewMode> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            ViewerEvent::ViewChanged { view, .. } => Some(view),
            _ => None,
        })
        .collect();
    assert_eq!(views, vec![ViewMode::Loading, ViewMode::Content]);

    player.handle.shutdown().await.unwrap();
    player.task.await.unwrap();
}

#[tokio::test]
async fn test_launch_paused_when_autoplay_off() {
    let loader = MockLoader::new();
    let player = viewer::launch(
        &config(BufferPolicy::All, false),
        numbered_frames(3),
        Arc::new(loader),
        RecordingSurface::default(),
        Arc::new(EventBus::default()),
    )
    .await
    .unwrap()
    .unwrap();

    let snapshot = player.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, PlaybackState::Paused);
    assert_eq!(snapshot.cursor, 0);
    assert_eq!(snapshot.cached, 3);
    assert_eq!(snapshot.displayed, Some(0));
}

#[tokio::test]
async fn test_initial_fill_without_any_frame_fails() {
    let loader = MockLoader::new().fail("a.png").fail("b.png");
    let surface = RecordingSurface::default();
    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();

    let result = viewer::launch(
        &config(BufferPolicy::All, true),
        frame_list(&["a.png", "b.png"]),
        Arc::new(loader),
        surface.clone(),
        Arc::clone(&events),
    )
    .await;

    let err = result.err().expect("launch should fail");
    assert_eq!(err.kind(), ErrorKind::FrameLoadFailed);
    assert_eq!(surface.count(), 0);

    let events = drain(&mut rx);
    let failed = events
        .iter()
        .find(|event| matches!(event, ViewerEvent::InitialLoadFailed { .. }))
        .expect("InitialLoadFailed event");
    assert_eq!(
        failed.status_text().as_deref(),
        Some("Error loading images. Please try refreshing.")
    );
    assert!(!events
        .iter()
        .any(|event| matches!(event, ViewerEvent::ViewChanged { view: ViewMode::Content, .. })));
}

#[tokio::test]
async fn test_partial_initial_fill_still_plays() {
    let loader = MockLoader::new().fail("b.png");
    let player = viewer::launch(
        &config(BufferPolicy::All, true),
        frame_list(&["a.png", "b.png", "c.png"]),
        Arc::new(loader),
        RecordingSurface::default(),
        Arc::new(EventBus::default()),
    )
    .await
    .unwrap()
    .unwrap();

    let snapshot = player.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.cached, 2);
    assert_eq!(snapshot.state, PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_launch_applies_load_timeout() {
    let loader = MockLoader::new().hang("b.png");
    let config = PlayerConfig {
        load_timeout: Some(Duration::from_millis(200)),
        ..config(BufferPolicy::All, false)
    };

    let player = viewer::launch(
        &config,
        frame_list(&["a.png", "b.png"]),
        Arc::new(loader),
        RecordingSurface::default(),
        Arc::new(EventBus::default()),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(player.handle.snapshot().await.unwrap().cached, 1);
}
