//! Line-oriented control surface
//!
//! Parses one line of terminal input into a player command and applies
//! it through a `PlayerHandle`.

use crate::error::{Error, Result};
use crate::playback::{PlayerHandle, PlayerSnapshot};
use std::str::FromStr;

/// One terminal command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// `p` or a lone space
    Toggle,
    /// `n`
    Next,
    /// `b`
    Prev,
    /// `s <i>` or a bare index
    ScrubTo(usize),
    /// `status`
    Status,
    /// `q`
    Quit,
}

impl FromStr for ControlCommand {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        // A lone space is the play/pause key
        if line.trim_end_matches(['\r', '\n']) == " " {
            return Ok(ControlCommand::Toggle);
        }

        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(Error::InvalidInput("empty command".to_string()));
        };
        let arg = words.next();
        if words.next().is_some() {
            return Err(Error::InvalidInput(format!("too many arguments: {:?}", line.trim())));
        }

        match (head.to_ascii_lowercase().as_str(), arg) {
            ("p" | "play" | "pause" | "toggle", None) => Ok(ControlCommand::Toggle),
            ("n" | "next", None) => Ok(ControlCommand::Next),
            ("b" | "prev", None) => Ok(ControlCommand::Prev),
            ("s" | "scrub", Some(index)) => parse_index(index).map(ControlCommand::ScrubTo),
            ("status", None) => Ok(ControlCommand::Status),
            ("q" | "quit" | "exit", None) => Ok(ControlCommand::Quit),
            (index, None) if index.chars().all(|c| c.is_ascii_digit()) => {
                parse_index(index).map(ControlCommand::ScrubTo)
            }
            _ => Err(Error::InvalidInput(format!("unknown command: {:?}", line.trim()))),
        }
    }
}

fn parse_index(value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| Error::InvalidInput(format!("invalid frame index: {:?}", value)))
}

/// Usage line for the terminal
pub const HELP: &str = "commands: p|space toggle, n next, b prev, s <i>|<i> scrub, status, q quit";

/// Send `command` to the player
///
/// Returns a snapshot for `Status`. `Quit` is left to the caller.
pub async fn apply(handle: &PlayerHandle, command: ControlCommand) -> Result<Option<PlayerSnapshot>> {
    match command {
        ControlCommand::Toggle => handle.toggle().await?,
        ControlCommand::Next => handle.next().await?,
        ControlCommand::Prev => handle.prev().await?,
        ControlCommand::ScrubTo(index) => handle.scrub_to(index).await?,
        ControlCommand::Status => return handle.snapshot().await.map(Some),
        ControlCommand::Quit => {}
    }
    Ok(None)
}

/// One-line rendering of a snapshot
pub fn describe(snapshot: &PlayerSnapshot) -> String {
    match snapshot.position_range() {
        Some(range) => format!(
            "{} frame {}/{} (range {}-{}), {} cached{}",
            snapshot.state,
            snapshot.cursor,
            snapshot.frame_count,
            range.start(),
            range.end(),
            snapshot.cached,
            if snapshot.buffering { ", buffering" } else { "" }
        ),
        None => format!("{}, no frames", snapshot.state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqview_common::events::PlaybackState;

    #[test]
    fn test_parse_commands() {
        assert_eq!(" ".parse::<ControlCommand>().unwrap(), ControlCommand::Toggle);
        assert_eq!(" \n".parse::<ControlCommand>().unwrap(), ControlCommand::Toggle);
        assert_eq!("p".parse::<ControlCommand>().unwrap(), ControlCommand::Toggle);
        assert_eq!("n".parse::<ControlCommand>().unwrap(), ControlCommand::Next);
        assert_eq!("B".parse::<ControlCommand>().unwrap(), ControlCommand::Prev);
        assert_eq!("s 12".parse::<ControlCommand>().unwrap(), ControlCommand::ScrubTo(12));
        assert_eq!("7".parse::<ControlCommand>().unwrap(), ControlCommand::ScrubTo(7));
        assert_eq!("status".parse::<ControlCommand>().unwrap(), ControlCommand::Status);
        assert_eq!("q".parse::<ControlCommand>().unwrap(), ControlCommand::Quit);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for line in ["", "   ", "s", "s x", "s -1", "n 3", "jump", "1 2"] {
            assert!(line.parse::<ControlCommand>().is_err(), "accepted {:?}", line);
        }
    }

    #[test]
    fn test_describe() {
        let snapshot = PlayerSnapshot {
            state: PlaybackState::Playing,
            cursor: 3,
            frame_count: 10,
            cached: 5,
            buffering: true,
            displayed: Some(3),
        };
        assert_eq!(
            describe(&snapshot),
            "playing frame 3/10 (range 0-9), 5 cached, buffering"
        );
    }
}
