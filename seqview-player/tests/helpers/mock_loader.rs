//! Scripted FrameLoader
//!
//! Successful loads return the identifier's bytes as payload. Clones share
//! the script and the call log, so a test keeps one clone for assertions
//! while the buffer owns another.

use seqview_player::{Error, Frame, FrameLoader, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Script {
    /// Always fail
    failing: HashSet<String>,
    /// Fail this many more times, then succeed
    fail_times: HashMap<String, u32>,
    /// Never resolve
    hanging: HashSet<String>,
    /// Resolve successfully after a delay
    delays: HashMap<String, Duration>,
    calls: Vec<String>,
}

enum Behavior {
    Succeed,
    Fail,
    Hang,
    Delay(Duration),
}

#[derive(Clone, Default)]
pub struct MockLoader {
    script: Arc<Mutex<Script>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(self, frame_id: &str) -> Self {
        self.script.lock().unwrap().failing.insert(frame_id.to_string());
        self
    }

    pub fn fail_times(self, frame_id: &str, times: u32) -> Self {
        self.script
            .lock()
            .unwrap()
            .fail_times
            .insert(frame_id.to_string(), times);
        self
    }

    pub fn hang(self, frame_id: &str) -> Self {
        self.script.lock().unwrap().hanging.insert(frame_id.to_string());
        self
    }

    pub fn delay(self, frame_id: &str, delay: Duration) -> Self {
        self.script
            .lock()
            .unwrap()
            .delays
            .insert(frame_id.to_string(), delay);
        self
    }

    /// Stop failing `frame_id` from now on
    pub fn heal(&self, frame_id: &str) {
        let mut script = self.script.lock().unwrap();
        script.failing.remove(frame_id);
        script.fail_times.remove(frame_id);
    }

    /// Every load request in issue order
    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, frame_id: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|id| id.as_str() == frame_id)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    fn record(&self, frame_id: &str) -> Behavior {
        let mut script = self.script.lock().unwrap();
        script.calls.push(frame_id.to_string());

        if script.hanging.contains(frame_id) {
            return Behavior::Hang;
        }
        if script.failing.contains(frame_id) {
            return Behavior::Fail;
        }
        if let Some(remaining) = script.fail_times.get_mut(frame_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Behavior::Fail;
            }
        }
        match script.delays.get(frame_id) {
            Some(delay) => Behavior::Delay(*delay),
            None => Behavior::Succeed,
        }
    }
}

impl FrameLoader for MockLoader {
    async fn load(&self, frame_id: &str) -> Result<Frame> {
        match self.record(frame_id) {
            Behavior::Succeed => {}
            Behavior::Fail => return Err(Error::frame_load(frame_id, "injected failure")),
            Behavior::Hang => std::future::pending::<()>().await,
            Behavior::Delay(delay) => tokio::time::sleep(delay).await,
        }
        Ok(Frame::new(frame_id, frame_id.as_bytes().to_vec()))
    }
}
