// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Processor - a consumer and a producer joined by a buffer.
//!
//! ```text
//! inbound link ──> [inbound half] ──transform──> buffer ──> [outbound half] ──> outbound link
//! ```
//!
//! Neither half has a threading model of its own. The processor drives both
//! from its own `execute()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::collection::CollectSink;
use super::consumer::Consumer;
use super::producer::{Produce, Producer};
use super::stage::{Stage, StageLifecycle};
use super::state::FinishReason;
use crate::core::execution::{AlwaysFailsThreadingModel, ThreadingModel};
use crate::core::links::Link;
use crate::core::logging::{default_logger, PrefixedStageLogger, StageLogger};
use crate::core::{Result, StageError};

/// User-supplied mapping behind a [`Processor`].
pub trait Transform: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Map one item. `Ok(None)` drops it silently; `Err` is logged and the
    /// processor carries on with the next item.
    fn transform(&mut self, item: Self::Input) -> Result<Option<Self::Output>>;
}

/// Outbound body: hands on whatever the processor buffered.
struct BufferDrain<O> {
    buffer: Arc<Link<O>>,
    inbound_closed: Arc<AtomicBool>,
}

impl<O: Send + 'static> Produce for BufferDrain<O> {
    type Item = O;

    fn produce_item(&mut self) -> Result<Option<O>> {
        match self.buffer.get() {
            Some(item) => Ok(Some(item)),
            None if self.inbound_closed.load(Ordering::Acquire) => Ok(None),
            None => Err(StageError::Produce("internal buffer is empty".into())),
        }
    }

    fn is_exhausted(&mut self) -> bool {
        self.inbound_closed.load(Ordering::Acquire) && self.buffer.is_empty()
    }
}

/// Stage that consumes from one link, transforms, and produces into another.
///
/// Finished once the inbound side saw the end of its link and everything
/// transformed has been handed on (or the outbound side failed).
pub struct Processor<T: Transform> {
    lifecycle: StageLifecycle,
    transform: Mutex<T>,
    inbound: Consumer<CollectSink<T::Input>>,
    inbox: CollectSink<T::Input>,
    outbound: Producer<BufferDrain<T::Output>>,
    buffer: Arc<Link<T::Output>>,
    inbound_closed: Arc<AtomicBool>,
    logger: Arc<dyn StageLogger>,
}

impl<T: Transform> Processor<T> {
    /// Create a processor and register it as a source of `outbound`.
    pub fn new(
        name: impl Into<String>,
        threading: Arc<dyn ThreadingModel>,
        inbound: Arc<Link<T::Input>>,
        outbound: Arc<Link<T::Output>>,
        transform: T,
    ) -> Arc<Self> {
        Self::with_logger(name, threading, inbound, outbound, transform, default_logger())
    }

    pub fn with_logger(
        name: impl Into<String>,
        threading: Arc<dyn ThreadingModel>,
        inbound: Arc<Link<T::Input>>,
        outbound: Arc<Link<T::Output>>,
        transform: T,
        logger: Arc<dyn StageLogger>,
    ) -> Arc<Self> {
        let name = name.into();
        let halves: Arc<dyn ThreadingModel> = Arc::new(AlwaysFailsThreadingModel::new());
        let buffer = Arc::new(Link::unbounded());
        let inbound_closed = Arc::new(AtomicBool::new(false));
        let inbox = CollectSink::new();

        let inbound_half = Consumer::build(
            name.clone(),
            halves.clone(),
            inbound,
            inbox.clone(),
            Arc::new(PrefixedStageLogger::new("Inbound error: ", logger.clone())),
        );
        let outbound_half = Producer::unregistered(
            name.clone(),
            halves,
            outbound,
            BufferDrain {
                buffer: buffer.clone(),
                inbound_closed: inbound_closed.clone(),
            },
            Arc::new(PrefixedStageLogger::new("Outbound error: ", logger.clone())),
        );

        let processor = Arc::new(Self {
            lifecycle: StageLifecycle::new(name, threading),
            transform: Mutex::new(transform),
            inbound: inbound_half,
            inbox,
            outbound: outbound_half,
            buffer,
            inbound_closed,
            logger,
        });
        processor.outbound.link().register_source(&processor);
        processor
    }

    pub fn inbound_link(&self) -> &Arc<Link<T::Input>> {
        self.inbound.link()
    }

    pub fn outbound_link(&self) -> &Arc<Link<T::Output>> {
        self.outbound.link()
    }

    /// Transformed items not yet handed downstream.
    pub fn buffered(&self) -> usize {
        self.buffer.queue_length()
    }

    fn close_if_drained(&self) {
        if !(self.inbound.is_finished() && self.outbound.is_finished()) {
            return;
        }
        let reason = match self.outbound.lifecycle().finish_reason() {
            Some(FinishReason::NaturallyExhausted) | None => self
                .inbound
                .lifecycle()
                .finish_reason()
                .unwrap_or(FinishReason::SawEndOfStream),
            Some(failed) => failed,
        };
        if self.lifecycle.latch().close(reason) {
            tracing::debug!("[{}] Processor finished: {}", self.lifecycle.name(), reason);
        }
    }
}

impl<T: Transform> Stage for Processor<T> {
    fn lifecycle(&self) -> &StageLifecycle {
        &self.lifecycle
    }

    fn execute(&self) {
        if let Some(reason) = self.lifecycle.finish_reason() {
            self.log_message(
                "Called execute at wrong time",
                &StageError::AlreadyFinished(reason),
            );
            return;
        }

        if !self.inbound.is_finished() {
            self.inbound.execute();
        }
        if self.inbound.is_finished() {
            self.inbound_closed.store(true, Ordering::Release);
        }

        for item in self.inbox.take() {
            match self.transform.lock().transform(item) {
                Ok(Some(output)) => {
                    self.buffer.add(output);
                }
                Ok(None) => {}
                Err(e) => self.log_message("Transform failed", &e),
            }
        }

        if self.outbound.is_finished() {
            // Nowhere left to send anything.
            let dropped = self.buffer.clear_queue();
            if dropped > 0 {
                tracing::debug!(
                    "[{}] Discarded {} item(s) after outbound side finished",
                    self.lifecycle.name(),
                    dropped
                );
            }
        } else if !self.buffer.is_empty() {
            self.outbound.execute();
        } else {
            self.outbound.check_exhausted();
        }
        self.close_if_drained();
    }

    fn is_finished(&self) -> bool {
        if !self.lifecycle.latch().is_closed() {
            self.close_if_drained();
        }
        self.lifecycle.latch().is_closed()
    }

    fn log_message(&self, message: &str, cause: &StageError) {
        self.logger
            .log_message(self.lifecycle.name(), message, cause);
    }
}

impl<T: Transform> std::fmt::Debug for Processor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("lifecycle", &self.lifecycle)
            .field("buffered", &self.buffered())
            .field("inbound", &self.inbound)
            .field("outbound", &self.outbound)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::execution::InlineThreadingModel;
    use crate::core::stages::{IterSource, StageExt};
    use crate::core::testing::RecordingLogger;

    /// Doubles even numbers, drops odd ones, rejects 13.
    struct DoubleEvens;

    impl Transform for DoubleEvens {
        type Input = u32;
        type Output = u64;

        fn transform(&mut self, item: u32) -> Result<Option<u64>> {
            if item == 13 {
                return Err(StageError::Transform("unlucky".into()));
            }
            Ok((item % 2 == 0).then(|| u64::from(item) * 2))
        }
    }

    fn inline() -> Arc<dyn ThreadingModel> {
        Arc::new(InlineThreadingModel::new())
    }

    fn drain<T: Send>(link: &Link<T>) -> Vec<T> {
        std::iter::from_fn(|| link.get()).collect()
    }

    #[test]
    fn test_transforms_and_drops() {
        let inbound = Arc::new(Link::unbounded());
        let outbound = Arc::new(Link::unbounded());
        let logger = Arc::new(RecordingLogger::new());
        let producer = Producer::with_logger(
            "source",
            inline(),
            inbound.clone(),
            IterSource::new(0..8u32),
            logger.clone(),
        );
        let processor = Processor::with_logger(
            "double",
            inline(),
            inbound,
            outbound.clone(),
            DoubleEvens,
            logger.clone(),
        );

        producer.start().unwrap();
        processor.start().unwrap();

        assert!(processor.is_finished());
        assert_eq!(drain(&outbound), vec![0, 4, 8, 12]);
        // Dropped odd items are not diagnostics.
        assert!(logger.is_empty());
        assert_eq!(
            processor.lifecycle().finish_reason(),
            Some(FinishReason::SawEndOfStream)
        );
    }

    #[test]
    fn test_transform_error_skips_item() {
        let inbound = Arc::new(Link::unbounded());
        let outbound = Arc::new(Link::unbounded());
        for i in [12u32, 13, 14] {
            inbound.add(i);
        }
        let logger = Arc::new(RecordingLogger::new());
        let processor = Processor::with_logger(
            "double",
            inline(),
            inbound,
            outbound.clone(),
            DoubleEvens,
            logger.clone(),
        );

        processor.start().unwrap();

        assert_eq!(drain(&outbound), vec![24, 28]);
        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Transform failed");
        assert!(entries[0].cause.contains("unlucky"));
    }

    #[test]
    fn test_outbound_failure_is_prefixed_and_sticky() {
        let inbound = Arc::new(Link::unbounded());
        let outbound = Arc::new(Link::bounded(1).unwrap());
        for i in [2u32, 4, 6, 8] {
            inbound.add(i);
        }
        let logger = Arc::new(RecordingLogger::new());
        let processor = Processor::with_logger(
            "double",
            inline(),
            inbound.clone(),
            outbound.clone(),
            DoubleEvens,
            logger.clone(),
        );

        processor.start().unwrap();

        assert_eq!(
            processor.lifecycle().finish_reason(),
            Some(FinishReason::FailedAdd)
        );
        assert_eq!(
            logger.count_containing("Outbound error: Failed to add item downstream"),
            1
        );
        assert_eq!(drain(&outbound), vec![4]);
        assert_eq!(processor.buffered(), 0);
        assert!(inbound.is_empty());
    }

    #[test]
    fn test_registers_on_outbound_link_only() {
        let inbound = Arc::new(Link::<u32>::unbounded());
        let outbound = Arc::new(Link::<u64>::unbounded());
        let processor =
            Processor::new("double", inline(), inbound.clone(), outbound.clone(), DoubleEvens);

        assert_eq!(inbound.source_count(), 0);
        assert_eq!(outbound.source_count(), 1);
        assert!(Arc::ptr_eq(processor.outbound_link(), &outbound));
        assert!(Arc::ptr_eq(processor.inbound_link(), &inbound));
    }

    #[test]
    fn test_execute_after_finish_is_logged() {
        let inbound = Arc::new(Link::<u32>::unbounded());
        let outbound = Arc::new(Link::unbounded());
        let logger = Arc::new(RecordingLogger::new());
        let processor = Processor::with_logger(
            "double",
            inline(),
            inbound,
            outbound,
            DoubleEvens,
            logger.clone(),
        );

        processor.start().unwrap();
        assert!(processor.is_finished());
        processor.execute();

        assert_eq!(logger.count_containing("Called execute at wrong time"), 1);
        assert!(processor.is_finished());
    }
}
