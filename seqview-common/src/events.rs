//! Event types for the seqview event system
//!
//! Provides the shared viewer event definitions and the EventBus used to
//! broadcast status to whichever control surface is attached (terminal,
//! log, tests).
//!
//! # Architecture
//!
//! - **EventBus** (tokio::broadcast): one-to-many status broadcasting
//! - **Command channels** (tokio::mpsc): control surface → player task
//!
//! Emission is lossy by default: a player with no attached surface keeps
//! running.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Playback state enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Which view the control surface should present
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Loading / status message view
    Loading,
    /// Frame display and controls
    Content,
}

/// seqview event types
///
/// Events are broadcast via EventBus and can be serialized for any
/// out-of-process status consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ViewerEvent {
    /// Manifest fetched and parsed
    ManifestLoaded {
        /// Number of frame identifiers in the manifest
        frame_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Manifest fetch or parse failed (terminal, no playback)
    ManifestFailed {
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A frame load settled successfully
    LoadProgress {
        /// Frames resident in the cache
        loaded: usize,
        /// Frames in the manifest
        total: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A single frame failed to load (recovered locally)
    FrameLoadFailed {
        frame_id: String,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Initial buffer fill produced no frames at all
    InitialLoadFailed {
        /// Number of failed loads in the initial window
        failed: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A frame was handed to the display surface
    FrameDisplayed {
        index: usize,
        frame_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback state changed (Playing ↔ Paused)
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback reached an uncached frame and is reloading it
    BufferingStarted {
        index: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Stall recovery finished
    BufferingFinished {
        index: usize,
        /// Whether playback resumed afterwards
        resumed: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Switch between the loading and content views
    ViewChanged {
        view: ViewMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ViewerEvent {
    /// Short machine-readable name of the event variant
    pub fn event_type(&self) -> &'static str {
        match self {
            ViewerEvent::ManifestLoaded { .. } => "ManifestLoaded",
            ViewerEvent::ManifestFailed { .. } => "ManifestFailed",
            ViewerEvent::LoadProgress { .. } => "LoadProgress",
            ViewerEvent::FrameLoadFailed { .. } => "FrameLoadFailed",
            ViewerEvent::InitialLoadFailed { .. } => "InitialLoadFailed",
            ViewerEvent::FrameDisplayed { .. } => "FrameDisplayed",
            ViewerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            ViewerEvent::BufferingStarted { .. } => "BufferingStarted",
            ViewerEvent::BufferingFinished { .. } => "BufferingFinished",
            ViewerEvent::ViewChanged { .. } => "ViewChanged",
        }
    }

    /// Human-readable status line for the status area, if the event has one
    pub fn status_text(&self) -> Option<String> {
        match self {
            ViewerEvent::ManifestFailed { .. } => {
                Some("Error loading data. Please try refreshing.".to_string())
            }
            ViewerEvent::LoadProgress { loaded, total, .. } => {
                Some(format!("Loading Image {}/{}...", loaded, total))
            }
            ViewerEvent::InitialLoadFailed { .. } => {
                Some("Error loading images. Please try refreshing.".to_string())
            }
            ViewerEvent::BufferingStarted { .. } => Some("Buffering...".to_string()),
            _ => None,
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lag and
/// lose the oldest events rather than blocking the player.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<ViewerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use seqview_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ViewerEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EVENT_CAPACITY)
    }
}
