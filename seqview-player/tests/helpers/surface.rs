//! Surface that records what was displayed

use seqview_player::playback::FrameSurface;
use seqview_player::Frame;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct RecordingSurface {
    shown: Arc<Mutex<Vec<(usize, String)>>>,
}

impl RecordingSurface {
    /// (index, frame id) per display, oldest first
    pub fn shown(&self) -> Vec<(usize, String)> {
        self.shown.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<(usize, String)> {
        self.shown.lock().unwrap().last().cloned()
    }

    pub fn last_id(&self) -> Option<String> {
        self.last().map(|(_, id)| id)
    }

    pub fn count(&self) -> usize {
        self.shown.lock().unwrap().len()
    }
}

impl FrameSurface for RecordingSurface {
    fn show(&mut self, index: usize, frame: &Frame) {
        self.shown
            .lock()
            .unwrap()
            .push((index, frame.id().to_string()));
    }
}
