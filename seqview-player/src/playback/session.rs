//! Playback session (state machine)
//!
//! A `PlayerSession` owns everything mutable about playback: the frame
//! list, the frame buffer (and through it the cache), the cursor, the
//! playing/paused state and the timing baseline. It is driven by explicit
//! calls; nothing in here spawns or sleeps. The player task (see
//! `playback::player`) owns one session and feeds it commands and ticks.
//!
//! Timing: while playing, `tick(now)` advances the cursor once the time
//! since the last advance reaches the current frame's hold. Every frame
//! holds for the frame interval except the last one, which holds for the
//! end-of-loop pause.
//!
//! Stalls (bounded buffer policy only): displaying a frame that is not
//! cached pauses playback and records a stall. The owner reloads the
//! window at the stalled index, either awaiting it in place with
//! `recover_stall()` or in the background with `retry_stall()` followed by
//! `settle_stall()` for each settled batch. Once the frame is back it is
//! shown and playback resumes if it was running before the stall. A frame
//! that is still missing afterwards stays stalled and is retried after
//! `STALL_RETRY_DELAY`.

use crate::error::{Error, Result};
use crate::frame::FrameList;
use crate::loader::FrameLoader;
use crate::playback::buffer::{FillReport, FrameBuffer};
use crate::playback::surface::FrameSurface;
use seqview_common::events::{EventBus, PlaybackState, ViewerEvent};
use seqview_common::PlayerConfig;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Delay between attempts to reload a frame that is still missing
pub const STALL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Failed reload attempts on one frame before each retry is logged as a warning
pub const STALL_WARN_ATTEMPTS: u32 = 3;

/// Frame hold durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTiming {
    /// Hold for every frame but the last (1 / fps)
    pub frame_interval: Duration,
    /// End-of-loop hold on the last frame
    pub last_frame_hold: Duration,
}

impl PlaybackTiming {
    pub fn from_config(config: &PlayerConfig) -> Self {
        Self {
            frame_interval: config.frame_interval(),
            last_frame_hold: config.last_frame_hold,
        }
    }

    /// How long the frame at `index` stays up in a list of `len` frames
    pub fn hold_for(&self, index: usize, len: usize) -> Duration {
        if index + 1 == len {
            self.last_frame_hold
        } else {
            self.frame_interval
        }
    }
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self::from_config(&PlayerConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// What happened when a frame was displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOutcome {
    /// Frame was cached and handed to the surface
    Shown,
    /// Frame not cached; previous frame stays up (eager policy)
    Missing,
    /// Frame not cached; playback paused for buffering (bounded policy)
    Stalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing
    Idle,
    /// Current frame's hold has not elapsed
    Held,
    /// Cursor moved to the next frame
    Advanced(DisplayOutcome),
}

/// Pending buffering stall
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stall {
    /// Frame index playback is waiting on
    pub index: usize,
    /// Resume playback once the frame is shown
    pub resume: bool,
    /// Failed reload attempts so far
    pub attempts: u32,
    retry_at: Option<Instant>,
    /// Background reload in flight
    loading: bool,
}

/// Result of one stall recovery attempt
#[derive(Debug)]
pub struct StallRecovery {
    pub index: usize,
    /// Stalled frame is now on the surface
    pub shown: bool,
    /// Playback resumed
    pub resumed: bool,
    pub report: FillReport,
}

/// Read-only view of the session for the control surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub cursor: usize,
    pub frame_count: usize,
    pub cached: usize,
    pub buffering: bool,
    /// Index of the frame currently on the surface
    pub displayed: Option<usize>,
}

impl PlayerSnapshot {
    /// Scrubber range `[0, len-1]`, None for an empty list
    pub fn position_range(&self) -> Option<RangeInclusive<usize>> {
        self.frame_count.checked_sub(1).map(|last| 0..=last)
    }
}

pub struct PlayerSession<L: FrameLoader, S: FrameSurface> {
    frames: FrameList,
    buffer: FrameBuffer<L>,
    surface: S,
    timing: PlaybackTiming,

    state: PlaybackState,
    cursor: usize,

    /// Timing baseline: when the cursor last advanced (or play was pressed)
    last_advance: Option<Instant>,

    stall: Option<Stall>,

    /// Index of the frame currently on the surface
    displayed: Option<usize>,

    events: Arc<EventBus>,
}

impl<L: FrameLoader, S: FrameSurface> PlayerSession<L, S> {
    /// Create a paused session with the cursor on frame 0
    pub fn new(frames: FrameList, buffer: FrameBuffer<L>, surface: S, timing: PlaybackTiming) -> Self {
        let events = Arc::clone(buffer.events());
        Self {
            frames,
            buffer,
            surface,
            timing,
            state: PlaybackState::Paused,
            cursor: 0,
            last_advance: None,
            stall: None,
            displayed: None,
            events,
        }
    }

    /// Session wired from resolved configuration
    pub fn from_config(
        config: &PlayerConfig,
        frames: FrameList,
        loader: Arc<L>,
        surface: S,
        events: Arc<EventBus>,
    ) -> Self {
        let buffer = FrameBuffer::new(loader, config.buffer, events)
            .with_load_timeout(config.load_timeout);
        Self::new(frames, buffer, surface, PlaybackTiming::from_config(config))
    }

    pub fn frames(&self) -> &FrameList {
        &self.frames
    }

    pub fn buffer(&self) -> &FrameBuffer<L> {
        &self.buffer
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn timing(&self) -> PlaybackTiming {
        self.timing
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn displayed(&self) -> Option<usize> {
        self.displayed
    }

    pub fn pending_stall(&self) -> Option<Stall> {
        self.stall
    }

    /// When the pending stall should be (re)attempted
    ///
    /// None without a stall, or while its background reload is in flight.
    pub fn stall_deadline(&self) -> Option<Instant> {
        self.stall
            .filter(|stall| !stall.loading)
            .map(|stall| stall.retry_at.unwrap_or_else(Instant::now))
    }

    pub fn has_inflight(&self) -> bool {
        self.buffer.has_inflight()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state,
            cursor: self.cursor,
            frame_count: self.frames.len(),
            cached: self.buffer.cache().len(),
            buffering: self.stall.is_some(),
            displayed: self.displayed,
        }
    }

    /// Initial buffer fill at the cursor
    pub async fn prime(&mut self) -> FillReport {
        self.buffer.fill(&self.frames, self.cursor).await
    }

    /// Apply the next settled background batch
    pub async fn next_settled(&mut self) -> Option<FillReport> {
        let total = self.frames.len();
        self.buffer.next_settled(total).await
    }

    /// Paused → Playing
    ///
    /// No-op when already playing or the list is empty. Resets the timing
    /// baseline so the current frame gets a full hold. During a stall this
    /// only marks playback to resume once the frame is back.
    pub fn play(&mut self, now: Instant) -> bool {
        if let Some(stall) = self.stall.as_mut() {
            stall.resume = true;
            return false;
        }
        if self.is_playing() || self.frames.is_empty() {
            return false;
        }
        self.last_advance = Some(now);
        self.set_state(PlaybackState::Playing);
        true
    }

    /// Playing → Paused; no-op when already paused
    pub fn pause(&mut self) -> bool {
        if let Some(stall) = self.stall.as_mut() {
            stall.resume = false;
        }
        if !self.is_playing() {
            return false;
        }
        self.set_state(PlaybackState::Paused);
        true
    }

    pub fn toggle(&mut self, now: Instant) -> bool {
        let intends_to_play = self.is_playing() || self.stall.is_some_and(|stall| stall.resume);
        if intends_to_play {
            self.pause()
        } else {
            self.play(now)
        }
    }

    /// Pause, move one frame with wraparound and show it
    pub fn step(&mut self, direction: Direction) -> DisplayOutcome {
        self.interrupt_stall();
        self.pause();
        if self.frames.is_empty() {
            return DisplayOutcome::Missing;
        }

        self.cursor = match direction {
            Direction::Forward => self.frames.next_index(self.cursor),
            Direction::Backward => self.frames.prev_index(self.cursor),
        };
        debug!(cursor = self.cursor, ?direction, "Step");
        self.display(self.cursor)
    }

    /// Pause, jump to `index` and show it
    pub fn scrub_to(&mut self, index: usize) -> Result<DisplayOutcome> {
        let len = self.frames.len();
        if index >= len {
            return Err(Error::InvalidInput(match len {
                0 => "frame list is empty".to_string(),
                _ => format!("frame index {} out of range [0, {}]", index, len - 1),
            }));
        }

        self.interrupt_stall();
        self.pause();
        self.cursor = index;
        debug!(cursor = index, "Scrub");
        Ok(self.display(index))
    }

    /// Advance the cursor if the current frame's hold has elapsed
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.is_playing() || self.frames.is_empty() {
            return TickOutcome::Idle;
        }

        let len = self.frames.len();
        let baseline = *self.last_advance.get_or_insert(now);
        let hold = self.timing.hold_for(self.cursor, len);
        if now.saturating_duration_since(baseline) < hold {
            return TickOutcome::Held;
        }

        self.cursor = self.frames.next_index(self.cursor);
        self.last_advance = Some(now);

        let outcome = self.display(self.cursor);
        if outcome == DisplayOutcome::Shown && self.buffer.policy().is_bounded() {
            self.buffer.prefetch(&self.frames, self.cursor);
        }
        TickOutcome::Advanced(outcome)
    }

    /// Show the frame at `index` if it is cached
    pub fn display(&mut self, index: usize) -> DisplayOutcome {
        let Some(frame_id) = self.frames.get(index) else {
            return DisplayOutcome::Missing;
        };

        match self.buffer.get(frame_id) {
            Some(frame) => {
                self.surface.show(index, frame);
                self.displayed = Some(index);
                self.events.emit_lossy(ViewerEvent::FrameDisplayed {
                    index,
                    frame_id: frame_id.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                DisplayOutcome::Shown
            }
            None if self.buffer.policy().is_bounded() => {
                self.begin_stall(index);
                DisplayOutcome::Stalled
            }
            None => {
                debug!(index, frame_id, "Frame not cached, keeping previous frame");
                DisplayOutcome::Missing
            }
        }
    }

    /// Reload the stalled frame's window in place and resume
    ///
    /// Waits for any background batch already carrying the frame, then
    /// fills the window at the stalled index. Returns None without a
    /// pending stall. Dropping the future leaves the stall pending.
    pub async fn recover_stall(&mut self) -> Option<StallRecovery> {
        let index = self.stall?.index;
        let frame_id = self.frames.get(index)?.to_string();

        let total = self.frames.len();
        self.buffer.wait_for(&frame_id, total).await;
        let report = self.buffer.fill(&self.frames, index).await;
        self.conclude_stall(report)
    }

    /// Issue the stalled frame's window as a background batch
    ///
    /// The stall has no deadline until `settle_stall()` sees the batch
    /// carrying the frame settle. Resolves at once when the frame is
    /// already cached.
    pub fn retry_stall(&mut self) -> Option<StallRecovery> {
        let index = self.stall?.index;
        let frame_id = self.frames.get(index)?.to_string();
        if self.buffer.is_cached(&frame_id) {
            return self.conclude_stall(FillReport::noop(index));
        }

        let issued = self.buffer.prefetch(&self.frames, index);
        debug!(index, issued, "Reloading stalled frame");
        if let Some(stall) = self.stall.as_mut() {
            stall.loading = true;
        }
        None
    }

    /// Resolve a background reload once the stalled frame has settled
    ///
    /// `report` is the batch just applied. Returns None while the frame is
    /// still in flight or no reload is pending.
    pub fn settle_stall(&mut self, report: FillReport) -> Option<StallRecovery> {
        let stall = self.stall.filter(|stall| stall.loading)?;
        let frame_id = self.frames.get(stall.index)?;
        if self.buffer.is_pending(frame_id) {
            return None;
        }
        self.conclude_stall(report)
    }

    fn conclude_stall(&mut self, report: FillReport) -> Option<StallRecovery> {
        let stall = self.stall.take()?;
        let frame_id = self
            .frames
            .get(stall.index)
            .map(str::to_string)
            .unwrap_or_default();

        if !self.buffer.is_cached(&frame_id) {
            let attempts = stall.attempts + 1;
            if attempts >= STALL_WARN_ATTEMPTS {
                warn!(
                    index = stall.index,
                    frame_id = %frame_id,
                    attempts,
                    "Frame still unavailable, retrying"
                );
            } else {
                info!(index = stall.index, attempts, "Frame still unavailable, retrying");
            }
            self.stall = Some(Stall {
                attempts,
                retry_at: Some(Instant::now() + STALL_RETRY_DELAY),
                loading: false,
                ..stall
            });
            return Some(StallRecovery {
                index: stall.index,
                shown: false,
                resumed: false,
                report,
            });
        }

        self.display(stall.index);
        if stall.resume {
            self.play(Instant::now());
        }
        info!(index = stall.index, resumed = stall.resume, "Buffering finished");
        self.events.emit_lossy(ViewerEvent::BufferingFinished {
            index: stall.index,
            resumed: stall.resume,
            timestamp: chrono::Utc::now(),
        });

        Some(StallRecovery {
            index: stall.index,
            shown: true,
            resumed: stall.resume,
            report,
        })
    }

    fn begin_stall(&mut self, index: usize) {
        let was_playing = self.is_playing();
        let previous = self.stall.take();
        let resume = was_playing || previous.is_some_and(|stall| stall.resume);

        if was_playing {
            self.set_state(PlaybackState::Paused);
        }
        info!(index, resume, "Frame not cached, buffering");
        self.stall = Some(Stall {
            index,
            resume,
            attempts: 0,
            retry_at: None,
            loading: false,
        });
        self.events.emit_lossy(ViewerEvent::BufferingStarted {
            index,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Drop a pending stall because the user moved the cursor
    fn interrupt_stall(&mut self) {
        if let Some(stall) = self.stall.take() {
            debug!(index = stall.index, "Stall abandoned");
            self.events.emit_lossy(ViewerEvent::BufferingFinished {
                index: stall.index,
                resumed: false,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    fn set_state(&mut self, new_state: PlaybackState) {
        let old_state = self.state;
        self.state = new_state;
        info!("Playback state: {} -> {}", old_state, new_state);
        self.events.emit_lossy(ViewerEvent::PlaybackStateChanged {
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }
}
