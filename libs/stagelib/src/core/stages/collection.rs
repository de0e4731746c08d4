// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Ready-made stage bodies backed by std collections.

use std::iter::Peekable;
use std::sync::Arc;

use parking_lot::Mutex;

use super::consumer::Consume;
use super::producer::Produce;
use crate::core::Result;

/// Producer body that drains an iterator.
///
/// Peeks one element ahead, so the producer finishes without spending a
/// round on an absent item. The peek runs on the producer's round thread.
pub struct IterSource<I: Iterator> {
    iter: Peekable<I>,
}

impl<I: Iterator> IterSource<I> {
    pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: iter.into_iter().peekable(),
        }
    }
}

impl<I> Produce for IterSource<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    type Item = I::Item;

    fn produce_item(&mut self) -> Result<Option<I::Item>> {
        Ok(self.iter.next())
    }

    fn is_exhausted(&mut self) -> bool {
        self.iter.peek().is_none()
    }
}

/// Consumer body appending every item to a shared vector.
///
/// Clones share the same storage, so keep one to read the results.
pub struct CollectSink<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> CollectSink<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Move everything collected so far out of the sink.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }
}

impl<T: Clone> CollectSink<T> {
    /// Snapshot of everything collected so far.
    pub fn items(&self) -> Vec<T> {
        self.items.lock().clone()
    }
}

impl<T> Clone for CollectSink<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for CollectSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Consume for CollectSink<T> {
    type Item = T;

    fn consume_item(&mut self, item: T) -> Result<()> {
        self.items.lock().push(item);
        Ok(())
    }
}
