//! Player task
//!
//! One tokio task owns the `PlayerSession`. Everything else talks to it
//! through a cloneable `PlayerHandle` over an mpsc command channel, so
//! cursor, state and cache each have exactly one writer.
//!
//! The task selects over:
//! - control commands
//! - the next tick deadline (only while playing; re-armed after every tick)
//! - the pending stall's retry deadline
//! - settled background prefetch batches
//!
//! A stalled frame is reloaded as a background batch like any prefetch,
//! so a slow or hung load never holds up commands.

use crate::error::{Error, Result};
use crate::loader::FrameLoader;
use crate::playback::session::{Direction, PlayerSession, PlayerSnapshot};
use crate::playback::surface::FrameSurface;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// Queued commands before senders wait
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Commands accepted by the player task
#[derive(Debug)]
pub enum PlayerCommand {
    Play,
    Pause,
    Toggle,
    Step(Direction),
    ScrubTo {
        index: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot(oneshot::Sender<PlayerSnapshot>),
    Shutdown,
}

/// Control surface for a running player task
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<PlayerCommand>,
}

impl PlayerHandle {
    async fn send(&self, command: PlayerCommand) -> Result<()> {
        self.tx.send(command).await.map_err(|_| stopped())
    }

    pub async fn play(&self) -> Result<()> {
        self.send(PlayerCommand::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(PlayerCommand::Pause).await
    }

    pub async fn toggle(&self) -> Result<()> {
        self.send(PlayerCommand::Toggle).await
    }

    pub async fn next(&self) -> Result<()> {
        self.send(PlayerCommand::Step(Direction::Forward)).await
    }

    pub async fn prev(&self) -> Result<()> {
        self.send(PlayerCommand::Step(Direction::Backward)).await
    }

    /// Jump to `index`; out-of-range indices come back as `InvalidInput`
    pub async fn scrub_to(&self, index: usize) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(PlayerCommand::ScrubTo { index, reply }).await?;
        rx.await.map_err(|_| stopped())?
    }

    pub async fn snapshot(&self) -> Result<PlayerSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(PlayerCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| stopped())
    }

    /// Ask the task to stop; the session comes back through its JoinHandle
    pub async fn shutdown(&self) -> Result<()> {
        self.send(PlayerCommand::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

fn stopped() -> Error {
    Error::Internal("player task is not running".to_string())
}

/// Spawn the task that owns `session`
///
/// `tick_interval` is how often a playing session is checked for an
/// advance; it should be well below the frame interval.
pub fn spawn_player<L, S>(
    session: PlayerSession<L, S>,
    tick_interval: Duration,
) -> (PlayerHandle, JoinHandle<PlayerSession<L, S>>)
where
    L: FrameLoader,
    S: FrameSurface,
{
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let task = tokio::spawn(run_player(session, rx, tick_interval));
    (PlayerHandle { tx }, task)
}

async fn run_player<L, S>(
    mut session: PlayerSession<L, S>,
    mut rx: mpsc::Receiver<PlayerCommand>,
    tick_interval: Duration,
) -> PlayerSession<L, S>
where
    L: FrameLoader,
    S: FrameSurface,
{
    info!(
        frames = session.frames().len(),
        state = %session.state(),
        tick_ms = tick_interval.as_millis() as u64,
        "Player task started"
    );
    let mut next_tick = Instant::now() + tick_interval;

    loop {
        let stall_deadline = session.stall_deadline();
        if stall_deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            session.retry_stall();
            continue;
        }

        let was_playing = session.is_playing();
        let inflight = session.has_inflight();

        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else {
                    info!("All player handles dropped");
                    break;
                };
                if !handle_command(&mut session, command) {
                    break;
                }
            }
            _ = sleep_until(next_tick), if was_playing => {
                let now = Instant::now();
                session.tick(now);
                next_tick = now + tick_interval;
            }
            _ = sleep_until(stall_deadline.unwrap_or(next_tick)), if stall_deadline.is_some() => {
                // Retry happens at the top of the loop
            }
            Some(report) = session.next_settled(), if inflight => {
                debug!(
                    start = report.start,
                    loaded = report.loaded.len(),
                    failed = report.failed.len(),
                    "Prefetch batch applied"
                );
                session.settle_stall(report);
            }
        }

        if !was_playing && session.is_playing() {
            next_tick = Instant::now() + tick_interval;
        }
    }

    info!(cursor = session.cursor(), "Player task stopped");
    session
}

/// Apply one command; false means stop the task
fn handle_command<L, S>(session: &mut PlayerSession<L, S>, command: PlayerCommand) -> bool
where
    L: FrameLoader,
    S: FrameSurface,
{
    match command {
        PlayerCommand::Play => {
            session.play(Instant::now());
        }
        PlayerCommand::Pause => {
            session.pause();
        }
        PlayerCommand::Toggle => {
            session.toggle(Instant::now());
        }
        PlayerCommand::Step(direction) => {
            session.step(direction);
        }
        PlayerCommand::ScrubTo { index, reply } => {
            let _ = reply.send(session.scrub_to(index).map(|_| ()));
        }
        PlayerCommand::Snapshot(reply) => {
            let _ = reply.send(session.snapshot());
        }
        PlayerCommand::Shutdown => {
            info!("Shutdown requested");
            return false;
        }
    }
    true
}
