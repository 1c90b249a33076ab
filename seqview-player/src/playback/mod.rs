//! Frame buffering and playback
//!
//! - `cache`: identifier → loaded frame
//! - `buffer`: window planning and concurrent loading into the cache
//! - `session`: playback state machine (cursor, timing, stalls)
//! - `surface`: where displayed frames go
//! - `player`: the task that owns a session and its control handle

pub mod buffer;
pub mod cache;
pub mod player;
pub mod session;
pub mod surface;

pub use buffer::{FillReport, FrameBuffer, LoadOutcome};
pub use cache::FrameCache;
pub use player::{spawn_player, PlayerCommand, PlayerHandle};
pub use session::{
    Direction, DisplayOutcome, PlaybackTiming, PlayerSession, PlayerSnapshot, Stall,
    StallRecovery, TickOutcome,
};
pub use surface::{FrameSurface, LogSurface, MirrorSurface};
