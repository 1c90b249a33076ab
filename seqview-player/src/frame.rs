//! Frame identifiers, payloads and the ordered frame list

use std::sync::Arc;

/// Stable frame identifier (URL or path as listed in the manifest)
pub type FrameId = String;

/// Loaded frame payload
///
/// The bytes are opaque: nothing in the player decodes them. Cloning is
/// cheap (shared buffer).
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    id: FrameId,
    data: Arc<[u8]>,
}

impl Frame {
    pub fn new(id: impl Into<FrameId>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Ordered, immutable list of frame identifiers defining playback order
///
/// Indices are 0-based; valid range is `[0, len-1]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameList {
    ids: Vec<FrameId>,
}

impl FrameList {
    pub fn new(ids: Vec<FrameId>) -> Self {
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(String::as_str)
    }

    pub fn ids(&self) -> &[FrameId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Next index with wraparound (0 on an empty list)
    pub fn next_index(&self, index: usize) -> usize {
        match self.ids.len() {
            0 => 0,
            len => (index + 1) % len,
        }
    }

    /// Previous index with wraparound (0 on an empty list)
    pub fn prev_index(&self, index: usize) -> usize {
        match self.ids.len() {
            0 => 0,
            len => (index % len + len - 1) % len,
        }
    }
}

impl From<Vec<FrameId>> for FrameList {
    fn from(ids: Vec<FrameId>) -> Self {
        Self::new(ids)
    }
}
