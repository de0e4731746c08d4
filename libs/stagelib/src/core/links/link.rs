// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Link - the hand-off queue between two stages.
//!
//! A link owns both ends of a crossbeam channel, so it never disconnects on
//! its own. It terminates only through [`Link::break_link`].
//!
//! `get()` runs in two phases:
//!
//! ```text
//! broken? ──yes──> None
//!   │
//! try_recv ──item──> Some(item)          (pass-through fast path)
//!   │
//! no sources registered? ──yes──> None   (nothing will ever arrive)
//!   │
//! wait in slices up to fetch timeout,
//! pruning finished sources between slices;
//! all sources gone ──> return what is queued
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};

use super::source_registry::SourceRegistry;
use crate::core::config::LinkConfig;
use crate::core::stages::Stage;
use crate::core::{Result, StageError};

/// Minimum slice a blocked `add`/`get` sleeps before re-checking state.
const MIN_POLL_SLICE: Duration = Duration::from_millis(1);

/// Number of slices a timeout is split into.
const POLL_SLICES_PER_TIMEOUT: u32 = 10;

/// Bounded or unbounded, timeout-aware hand-off queue.
///
/// Safe to share between any number of producers and consumers.
pub struct Link<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    capacity: Option<usize>,
    add_timeout_ns: AtomicU64,
    fetch_timeout_ns: AtomicU64,
    sources: SourceRegistry,
    broken: AtomicBool,
}

impl<T: Send> Link<T> {
    /// Returned by [`Link::remaining_capacity`] for unbounded links.
    pub const UNBOUNDED: usize = usize::MAX;

    /// Create a link that never refuses an item for lack of space.
    pub fn unbounded() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self::from_parts(sender, receiver, None)
    }

    /// Create a link holding at most `capacity` items.
    ///
    /// # Errors
    /// Returns [`StageError::InvalidArgument`] if `capacity` is zero.
    pub fn bounded(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(StageError::InvalidArgument(
                "link capacity must be positive".into(),
            ));
        }
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Ok(Self::from_parts(sender, receiver, Some(capacity)))
    }

    /// Create a link from a [`LinkConfig`].
    pub fn from_config(config: &LinkConfig) -> Result<Self> {
        let link = match config.capacity {
            Some(capacity) => Self::bounded(capacity)?,
            None => Self::unbounded(),
        };
        link.set_add_timeout(Duration::from_millis(config.add_timeout_ms));
        link.set_fetch_timeout(Duration::from_millis(config.fetch_timeout_ms));
        Ok(link)
    }

    fn from_parts(sender: Sender<T>, receiver: Receiver<T>, capacity: Option<usize>) -> Self {
        Self {
            sender,
            receiver,
            capacity,
            add_timeout_ns: AtomicU64::new(0),
            fetch_timeout_ns: AtomicU64::new(0),
            sources: SourceRegistry::new(),
            broken: AtomicBool::new(false),
        }
    }

    /// Register a stage that feeds this link.
    ///
    /// Used only to decide how long `get()` is worth waiting; the link holds
    /// a weak reference.
    pub fn register_source<S: Stage>(&self, source: &Arc<S>) {
        self.sources.register(source);
    }

    /// Number of registered sources, finished ones included until pruned.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Add an item, waiting up to the add timeout for space.
    ///
    /// Returns `false` if the link is broken or stayed full for the whole
    /// timeout.
    pub fn add(&self, item: T) -> bool {
        if self.is_broken() {
            return false;
        }

        let timeout = self.add_timeout();
        if timeout.is_zero() {
            return match self.sender.try_send(item) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
            };
        }

        let deadline = Instant::now() + timeout;
        let slice = poll_slice(timeout);
        let mut pending = item;
        loop {
            if self.is_broken() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.sender.try_send(pending).is_ok();
            }
            match self.sender.send_timeout(pending, slice.min(remaining)) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(back)) => pending = back,
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    /// Add an item that may be absent.
    ///
    /// # Errors
    /// Returns [`StageError::AbsentItem`] for `None`; the queue is untouched.
    pub fn add_checked(&self, item: Option<T>) -> Result<bool> {
        match item {
            Some(item) => Ok(self.add(item)),
            None => Err(StageError::AbsentItem),
        }
    }

    /// Take the next item, or `None` if nothing became available.
    pub fn get(&self) -> Option<T> {
        if self.is_broken() {
            return None;
        }

        if let Ok(item) = self.receiver.try_recv() {
            return Some(item);
        }

        if self.sources.is_empty() {
            return self.receiver.try_recv().ok();
        }

        let timeout = self.fetch_timeout();
        if timeout.is_zero() {
            self.sources.prune();
            return self.receiver.try_recv().ok();
        }

        let deadline = Instant::now() + timeout;
        let slice = poll_slice(timeout);
        loop {
            if self.is_broken() {
                return None;
            }
            if self.sources.prune() == 0 {
                return self.receiver.try_recv().ok();
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.receiver.try_recv().ok();
            }
            match self.receiver.recv_timeout(slice.min(remaining)) {
                Ok(item) => return Some(item),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    pub fn add_timeout(&self) -> Duration {
        Duration::from_nanos(self.add_timeout_ns.load(Ordering::Acquire))
    }

    /// How long `add()` waits for space. Zero attempts a single offer.
    pub fn set_add_timeout(&self, timeout: Duration) {
        self.add_timeout_ns
            .store(duration_to_nanos(timeout), Ordering::Release);
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_nanos(self.fetch_timeout_ns.load(Ordering::Acquire))
    }

    /// How long `get()` waits on an empty link with live sources.
    /// Zero means pass-through: never wait.
    pub fn set_fetch_timeout(&self, timeout: Duration) {
        self.fetch_timeout_ns
            .store(duration_to_nanos(timeout), Ordering::Release);
    }

    /// `None` for unbounded links.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn queue_length(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Free slots, or [`Link::UNBOUNDED`] when there is no cap.
    pub fn remaining_capacity(&self) -> usize {
        match self.capacity {
            Some(capacity) => capacity.saturating_sub(self.receiver.len()),
            None => Self::UNBOUNDED,
        }
    }

    /// Drop everything queued. Returns how many items were discarded.
    pub fn clear_queue(&self) -> usize {
        self.receiver.try_iter().count()
    }

    /// Permanently break the link. Idempotent.
    ///
    /// Every later `add()` returns `false` and every later `get()` returns
    /// `None`; callers blocked in either return within one poll slice.
    pub fn break_link(&self) {
        if !self.broken.swap(true, Ordering::AcqRel) {
            tracing::debug!(
                "Link broken with {} item(s) still queued",
                self.receiver.len()
            );
        }
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }
}

impl<T> std::fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("capacity", &self.capacity)
            .field("queued", &self.receiver.len())
            .field("sources", &self.sources)
            .field("broken", &self.broken.load(Ordering::Relaxed))
            .finish()
    }
}

fn poll_slice(timeout: Duration) -> Duration {
    (timeout / POLL_SLICES_PER_TIMEOUT).max(MIN_POLL_SLICE)
}

/// Saturates at roughly 584 years.
fn duration_to_nanos(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}
