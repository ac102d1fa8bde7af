use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::screenshot::Screenshot;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Completed captures, newest first, bounded to `capacity`.
#[derive(Debug)]
pub struct CaptureHistory {
    entries: VecDeque<Screenshot>,
    capacity: usize,
    current: Option<Screenshot>,
}

impl Default for CaptureHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl CaptureHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            current: None,
        }
    }

    /// Insert at the front and make it current. Returns the evicted tail entry, if any.
    pub fn push(&mut self, screenshot: Screenshot) -> Option<Screenshot> {
        self.current = Some(screenshot.clone());
        self.entries.push_front(screenshot);
        if self.entries.len() > self.capacity {
            let evicted = self.entries.pop_back();
            if let Some(old) = &evicted {
                log::debug!("[history] evicted {}", old.id());
            }
            evicted
        } else {
            None
        }
    }

    /// The most recently completed capture, as it was before any annotation.
    pub fn current(&self) -> Option<&Screenshot> {
        self.current.as_ref()
    }

    pub fn clear_current(&mut self) {
        self.current = None;
    }

    pub fn get(&self, id: Uuid) -> Option<&Screenshot> {
        self.entries.iter().find(|s| s.id() == id)
    }

    /// Write an edited screenshot back in place. False if it was evicted meanwhile.
    pub fn replace(&mut self, screenshot: Screenshot) -> bool {
        match self.entries.iter_mut().find(|s| s.id() == screenshot.id()) {
            Some(slot) => {
                *slot = screenshot;
                true
            }
            None => false,
        }
    }

    pub fn attach_extracted_text(&mut self, id: Uuid, text: String) -> bool {
        self.update(id, |s| s.extracted_text = Some(text))
    }

    pub fn attach_ai_description(&mut self, id: Uuid, description: String) -> bool {
        self.update(id, |s| s.ai_description = Some(description))
    }

    fn update(&mut self, id: Uuid, f: impl FnOnce(&mut Screenshot)) -> bool {
        match self.entries.iter_mut().find(|s| s.id() == id) {
            Some(slot) => {
                f(slot);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Screenshot> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// History shared with UI readers. Lock only around a single insert or lookup.
pub type SharedHistory = Arc<Mutex<CaptureHistory>>;
