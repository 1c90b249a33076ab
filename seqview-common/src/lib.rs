//! # seqview Common Library
//!
//! Shared code for the seqview crates including:
//! - Error types
//! - Viewer event types (ViewerEvent enum) and the EventBus
//! - Bootstrap configuration loading and resolution

pub mod config;
pub mod error;
pub mod events;

pub use config::{BufferPolicy, PlayerConfig};
pub use error::{Error, Result};
