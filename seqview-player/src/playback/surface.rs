//! Display surfaces
//!
//! The session hands every displayed frame to a `FrameSurface`. Nothing
//! here renders pixels; a surface is whatever consumes the bytes.

use crate::frame::Frame;
use std::path::PathBuf;
use tracing::{info, warn};

/// Rendering target for displayed frames
pub trait FrameSurface: Send + 'static {
    /// Present `frame`, which sits at `index` in the frame list
    fn show(&mut self, index: usize, frame: &Frame);
}

impl<T: FrameSurface + ?Sized> FrameSurface for Box<T> {
    fn show(&mut self, index: usize, frame: &Frame) {
        (**self).show(index, frame);
    }
}

/// Logs each displayed frame
#[derive(Debug, Default)]
pub struct LogSurface;

impl FrameSurface for LogSurface {
    fn show(&mut self, index: usize, frame: &Frame) {
        info!(index, frame_id = frame.id(), bytes = frame.len(), "Displaying frame");
    }
}

/// Writes the displayed frame's bytes to a file, replacing it each time
///
/// A file watcher or image viewer pointed at the path follows playback.
#[derive(Debug)]
pub struct MirrorSurface {
    path: PathBuf,
    inner: LogSurface,
}

impl MirrorSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: LogSurface,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl FrameSurface for MirrorSurface {
    fn show(&mut self, index: usize, frame: &Frame) {
        self.inner.show(index, frame);
        // Runs on the player task; frames are small and the write is local
        if let Err(e) = std::fs::write(&self.path, frame.data()) {
            warn!("Failed to mirror frame {} to {}: {}", frame.id(), self.path.display(), e);
        }
    }
}
