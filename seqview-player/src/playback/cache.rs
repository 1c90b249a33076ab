//! Frame cache
//!
//! Identifier → loaded frame. Entries are added when a load succeeds and
//! removed when a load fails; nothing is evicted otherwise, so the cache
//! is bounded only by the manifest length.

use crate::frame::Frame;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct FrameCache {
    frames: HashMap<String, Frame>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, frame_id: &str) -> Option<&Frame> {
        self.frames.get(frame_id)
    }

    pub fn contains(&self, frame_id: &str) -> bool {
        self.frames.contains_key(frame_id)
    }

    /// Insert or replace the entry for the frame's identifier
    pub fn insert(&mut self, frame: Frame) {
        self.frames.insert(frame.id().to_string(), frame);
    }

    pub fn remove(&mut self, frame_id: &str) -> Option<Frame> {
        self.frames.remove(frame_id)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Sum of resident payload sizes
    pub fn total_bytes(&self) -> usize {
        self.frames.values().map(Frame::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut cache = FrameCache::new();
        assert!(cache.is_empty());

        cache.insert(Frame::new("a.png", vec![0u8; 4]));
        cache.insert(Frame::new("b.png", vec![0u8; 6]));
        assert!(cache.contains("a.png"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.total_bytes(), 10);

        assert!(cache.remove("a.png").is_some());
        assert!(cache.get("a.png").is_none());
        assert!(cache.remove("a.png").is_none());
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut cache = FrameCache::new();
        cache.insert(Frame::new("a.png", vec![0u8; 4]));
        cache.insert(Frame::new("a.png", vec![0u8; 8]));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a.png").unwrap().len(), 8);
    }
}
