//! # seqview Player Library (seqview-player)
//!
//! Frame-sequence viewer core: fetches a manifest of frame identifiers,
//! keeps a window of frame payloads resident ahead of the playback cursor
//! and plays them back as a looping animation with play/pause, step and
//! scrub controls.
//!
//! **Architecture:** one tokio task owns the playback session; loads run
//! concurrently as futures on that task and land in the frame cache when
//! they settle. Control and status go through `PlayerHandle` and the
//! `EventBus`.

pub mod control;
pub mod error;
pub mod frame;
pub mod loader;
pub mod manifest;
pub mod manifest_builder;
pub mod playback;
pub mod viewer;

pub use error::{Error, ErrorKind, Result};
pub use frame::{Frame, FrameId, FrameList};
pub use loader::{FileLoader, FrameLoader, HttpLoader, SourceLoader};
pub use manifest::{ManifestLoader, ManifestLocation};
