//! Background work that has to wait its turn.
//!
//! [`ModalGate`] holds operations back while a modal is open and releases
//! them in submission order when it closes. [`MetadataPreloader`] bounds how
//! many metadata preloads run at once; preloads never touch gallery state.

use std::collections::VecDeque;
use tracing::debug;

/// FIFO of operations deferred while a modal is open.
#[derive(Debug)]
pub struct ModalGate<T> {
    open: bool,
    queue: VecDeque<T>,
}

impl<T> Default for ModalGate<T> {
    fn default() -> Self {
        Self {
            open: false,
            queue: VecDeque::new(),
        }
    }
}

impl<T> ModalGate<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    /// Submit an operation. It is handed straight back when no modal is
    /// open and should run now; otherwise it is queued.
    pub fn submit(&mut self, op: T) -> Option<T> {
        if self.open {
            self.queue.push_back(op);
            debug!(pending = self.queue.len(), "operation deferred behind modal");
            None
        } else {
            Some(op)
        }
    }

    /// Close the modal and release everything queued, oldest first.
    pub fn close(&mut self) -> Vec<T> {
        self.open = false;
        self.queue.drain(..).collect()
    }

    /// Drop every queued operation, returning how many were dropped.
    pub fn cancel_all(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

pub const DEFAULT_PRELOAD_SLOTS: usize = 1;

/// Bounded slot counter for metadata preloads.
#[derive(Debug)]
pub struct MetadataPreloader {
    cap: usize,
    active: usize,
    waiting: VecDeque<String>,
}

impl Default for MetadataPreloader {
    fn default() -> Self {
        Self::new(DEFAULT_PRELOAD_SLOTS)
    }
}

impl MetadataPreloader {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            active: 0,
            waiting: VecDeque::new(),
        }
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn waiting(&self) -> usize {
        self.waiting.len()
    }

    /// Ask to preload `filename`. Returns it when a slot was taken and the
    /// preload should start now; otherwise it waits for [`finish`](Self::finish).
    /// A name already waiting is not queued twice.
    pub fn request(&mut self, filename: impl Into<String>) -> Option<String> {
        let filename = filename.into();
        if self.active < self.cap {
            self.active += 1;
            return Some(filename);
        }
        if !self.waiting.contains(&filename) {
            self.waiting.push_back(filename);
        }
        None
    }

    /// Release a slot. Returns the next waiting preload, which now holds it.
    pub fn finish(&mut self) -> Option<String> {
        self.active = self.active.saturating_sub(1);
        let next = self.waiting.pop_front()?;
        self.active += 1;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_gate_runs_immediately() {
        let mut gate = ModalGate::new();
        assert_eq!(gate.submit(1), Some(1));
        assert_eq!(gate.pending(), 0);
    }

    #[test]
    fn open_gate_defers_in_fifo_order() {
        let mut gate = ModalGate::new();
        gate.open();
        for op in ["thumb a", "thumb b", "thumb c"] {
            assert!(gate.submit(op).is_none());
        }
        assert_eq!(gate.close(), vec!["thumb a", "thumb b", "thumb c"]);
        assert!(!gate.is_open());
        assert_eq!(gate.submit("after"), Some("after"));
    }

    #[test]
    fn cancel_drops_queued() {
        let mut gate = ModalGate::new();
        gate.open();
        gate.submit(1);
        gate.submit(2);
        assert_eq!(gate.cancel_all(), 2);
        assert!(gate.close().is_empty());
    }

    #[test]
    fn preloader_caps_at_one_by_default() {
        let mut pre = MetadataPreloader::default();
        assert_eq!(pre.request("a.mp4").as_deref(), Some("a.mp4"));
        assert!(pre.request("b.mp4").is_none());
        assert!(pre.request("b.mp4").is_none());
        assert_eq!(pre.active(), 1);
        assert_eq!(pre.waiting(), 1);

        assert_eq!(pre.finish().as_deref(), Some("b.mp4"));
        assert_eq!(pre.active(), 1);
        assert_eq!(pre.finish(), None);
        assert_eq!(pre.active(), 0);
    }

    #[test]
    fn preloader_respects_larger_cap() {
        let mut pre = MetadataPreloader::new(2);
        assert!(pre.request("a").is_some());
        assert!(pre.request("b").is_some());
        assert!(pre.request("c").is_none());
    }
}
