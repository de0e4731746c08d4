// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use parking_lot::Mutex;

use super::stage::{Stage, StageLifecycle};
use super::state::FinishReason;
use crate::core::execution::ThreadingModel;
use crate::core::links::Link;
use crate::core::logging::{default_logger, StageLogger};
use crate::core::StageError;

/// User-supplied generator behind a [`Producer`].
pub trait Produce: Send + 'static {
    type Item: Send + 'static;

    /// Produce the next item.
    ///
    /// `Ok(None)` ends the stream for good. `Err` only abandons this round;
    /// the producer tries again on the next one.
    fn produce_item(&mut self) -> crate::core::Result<Option<Self::Item>>;

    /// Natural-exhaustion predicate.
    ///
    /// Evaluated on the thread running the producer's rounds, before and
    /// after each one. May block only as long as `produce_item` would.
    fn is_exhausted(&mut self) -> bool {
        false
    }
}

/// Stage that pushes whatever its [`Produce`] body generates into a link.
pub struct Producer<P: Produce> {
    lifecycle: StageLifecycle,
    body: Mutex<P>,
    link: Arc<Link<P::Item>>,
    logger: Arc<dyn StageLogger>,
}

impl<P: Produce> Producer<P> {
    /// Create a producer reporting through the default tracing logger and
    /// register it as a source of `link`.
    pub fn new(
        name: impl Into<String>,
        threading: Arc<dyn ThreadingModel>,
        link: Arc<Link<P::Item>>,
        body: P,
    ) -> Arc<Self> {
        Self::with_logger(name, threading, link, body, default_logger())
    }

    pub fn with_logger(
        name: impl Into<String>,
        threading: Arc<dyn ThreadingModel>,
        link: Arc<Link<P::Item>>,
        body: P,
        logger: Arc<dyn StageLogger>,
    ) -> Arc<Self> {
        let producer = Arc::new(Self::unregistered(name, threading, link, body, logger));
        producer.link.register_source(&producer);
        producer
    }

    /// Build a producer without registering it on its link.
    pub(crate) fn unregistered(
        name: impl Into<String>,
        threading: Arc<dyn ThreadingModel>,
        link: Arc<Link<P::Item>>,
        body: P,
        logger: Arc<dyn StageLogger>,
    ) -> Self {
        Self {
            lifecycle: StageLifecycle::new(name, threading),
            body: Mutex::new(body),
            link,
            logger,
        }
    }

    pub fn link(&self) -> &Arc<Link<P::Item>> {
        &self.link
    }

    /// Run `f` against the body. Blocks while a round is in progress.
    pub fn with_body<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut self.body.lock())
    }

    /// Latch `NaturallyExhausted` if the body has run dry.
    ///
    /// Lets the owner of a producer that is never started on its own (the
    /// outbound half of a processor) settle its state between rounds.
    pub(crate) fn check_exhausted(&self) -> bool {
        if self.lifecycle.latch().is_closed() {
            return true;
        }
        let mut body = self.body.lock();
        self.latch_if_exhausted(&mut body)
    }

    fn latch_if_exhausted(&self, body: &mut P) -> bool {
        if body.is_exhausted() {
            self.lifecycle.latch().close(FinishReason::NaturallyExhausted);
            return true;
        }
        false
    }

    fn finish(&self, reason: FinishReason, message: &str, cause: &StageError) {
        if self.lifecycle.latch().close(reason) {
            self.log_message(message, cause);
        }
    }
}

impl<P: Produce> Stage for Producer<P> {
    fn lifecycle(&self) -> &StageLifecycle {
        &self.lifecycle
    }

    fn execute(&self) {
        if self.is_finished() {
            if let Some(reason) = self.lifecycle.finish_reason() {
                self.log_message(
                    "Called execute at wrong time",
                    &StageError::AlreadyFinished(reason),
                );
            }
            return;
        }

        // Held until the item is on the link so exhaustion is never observed
        // while the last item is in flight.
        let mut body = self.body.lock();
        if self.latch_if_exhausted(&mut body) {
            return;
        }
        let item = match body.produce_item() {
            Ok(Some(item)) => item,
            Ok(None) => {
                self.finish(
                    FinishReason::ProducedAbsent,
                    "Produced absent item",
                    &StageError::EndOfStream,
                );
                return;
            }
            Err(e) => {
                self.log_message("Produce failed", &e);
                self.latch_if_exhausted(&mut body);
                return;
            }
        };

        if self.link.add(item) {
            self.latch_if_exhausted(&mut body);
        } else if self.link.is_broken() {
            self.finish(
                FinishReason::LinkBroken,
                "Failed to add item downstream",
                &StageError::LinkBroken,
            );
        } else {
            self.finish(
                FinishReason::FailedAdd,
                "Failed to add item downstream",
                &StageError::AddFailed(format!(
                    "link stayed full for {:?}",
                    self.link.add_timeout()
                )),
            );
        }
    }

    /// Reads the latch only. `is_exhausted()` runs inside `execute()`, so a
    /// consumer polling this from its own thread never enters the body.
    fn is_finished(&self) -> bool {
        self.lifecycle.latch().is_closed()
    }

    fn log_message(&self, message: &str, cause: &StageError) {
        self.logger
            .log_message(self.lifecycle.name(), message, cause);
    }
}

impl<P: Produce> std::fmt::Debug for Producer<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("lifecycle", &self.lifecycle)
            .field("link", &self.link)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::execution::{AlwaysFailsThreadingModel, InlineThreadingModel};
    use crate::core::stages::{IterSource, StageExt, StageState};
    use crate::core::testing::RecordingLogger;
    use crate::core::Result;
    use std::time::Duration;

    /// Fails every other round, then runs dry.
    struct Flaky {
        calls: u32,
        limit: u32,
    }

    impl Produce for Flaky {
        type Item = u32;

        fn produce_item(&mut self) -> Result<Option<u32>> {
            self.calls += 1;
            if self.calls > self.limit {
                return Ok(None);
            }
            if self.calls % 2 == 0 {
                return Err(StageError::Produce(format!("call {} failed", self.calls)));
            }
            Ok(Some(self.calls))
        }
    }

    fn never_started() -> Arc<dyn ThreadingModel> {
        Arc::new(AlwaysFailsThreadingModel::new())
    }

    #[test]
    fn test_registers_itself_as_source() {
        let link = Arc::new(Link::unbounded());
        let producer = Producer::new("p", never_started(), link.clone(), IterSource::new(0..3u32));
        assert_eq!(link.source_count(), 1);
        assert!(Arc::ptr_eq(producer.link(), &link));
    }

    #[test]
    fn test_produce_errors_are_not_sticky() {
        let link = Arc::new(Link::unbounded());
        let logger = Arc::new(RecordingLogger::new());
        let producer = Producer::with_logger(
            "flaky",
            Arc::new(InlineThreadingModel::new()),
            link.clone(),
            Flaky { calls: 0, limit: 5 },
            logger.clone(),
        );

        producer.start().unwrap();

        assert_eq!(
            producer.lifecycle().state(),
            StageState::Finished(FinishReason::ProducedAbsent)
        );
        assert_eq!(logger.count_containing("Produce failed"), 2);
        assert_eq!(logger.count_containing("Produced absent item"), 1);
        let mut items = Vec::new();
        while let Some(item) = link.get() {
            items.push(item);
        }
        assert_eq!(items, vec![1, 3, 5]);
    }

    #[test]
    fn test_full_link_latches_failed_add() {
        let link = Arc::new(Link::bounded(1).unwrap());
        let logger = Arc::new(RecordingLogger::new());
        let producer = Producer::with_logger(
            "p",
            never_started(),
            link.clone(),
            IterSource::new(0..10u32),
            logger.clone(),
        );

        producer.execute();
        assert!(!producer.is_finished());
        producer.execute();
        assert_eq!(producer.lifecycle().finish_reason(), Some(FinishReason::FailedAdd));
        assert_eq!(logger.count_containing("Failed to add"), 1);

        // Draining the link does not revive a finished producer.
        assert_eq!(link.get(), Some(0));
        producer.execute();
        assert!(producer.is_finished());
        assert_eq!(link.queue_length(), 0);
        assert_eq!(logger.count_containing("Called execute at wrong time"), 1);
    }

    #[test]
    fn test_broken_link_latches_link_broken() {
        let link = Arc::new(Link::unbounded());
        let producer = Producer::new("p", never_started(), link.clone(), IterSource::new(0..10u32));
        link.break_link();
        producer.execute();
        assert_eq!(producer.lifecycle().finish_reason(), Some(FinishReason::LinkBroken));
    }

    #[test]
    fn test_exhaustion_finishes_without_extra_round() {
        let link = Arc::new(Link::unbounded());
        let logger = Arc::new(RecordingLogger::new());
        let producer = Producer::with_logger(
            "p",
            never_started(),
            link,
            IterSource::new(std::iter::once(1u32)),
            logger.clone(),
        );

        assert!(!producer.is_finished());
        producer.execute();
        assert!(producer.is_finished());
        assert_eq!(
            producer.lifecycle().finish_reason(),
            Some(FinishReason::NaturallyExhausted)
        );
        assert!(logger.is_empty());
    }

    #[test]
    fn test_empty_source_finishes_naturally() {
        let link = Arc::new(Link::<u32>::unbounded());
        let logger = Arc::new(RecordingLogger::new());
        let producer = Producer::with_logger(
            "p",
            never_started(),
            link.clone(),
            IterSource::new(Vec::new()),
            logger.clone(),
        );

        producer.execute();

        assert_eq!(
            producer.lifecycle().finish_reason(),
            Some(FinishReason::NaturallyExhausted)
        );
        assert!(link.is_empty());
        assert!(logger.is_empty());
    }

    #[test]
    fn test_fetch_never_runs_a_blocking_source() {
        // Pulling the next element from this iterator blocks until the sender
        // sends or goes away.
        let (feed_tx, feed_rx) = crossbeam_channel::unbounded::<u32>();
        let link = Arc::new(Link::unbounded());
        link.set_fetch_timeout(Duration::from_millis(100));
        let producer = Producer::new(
            "blocking",
            never_started(),
            link.clone(),
            IterSource::new(feed_rx.into_iter()),
        );

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let reader = {
            let link = link.clone();
            std::thread::spawn(move || {
                let _ = done_tx.send(link.get());
            })
        };

        assert_eq!(done_rx.recv_timeout(Duration::from_secs(3)), Ok(None));
        reader.join().unwrap();
        assert!(!producer.is_finished());
        assert_eq!(link.source_count(), 1);

        // The producer's own round is where the source gets pulled.
        feed_tx.send(5).unwrap();
        drop(feed_tx);
        producer.execute();
        assert_eq!(link.get(), Some(5));
        assert_eq!(
            producer.lifecycle().finish_reason(),
            Some(FinishReason::NaturallyExhausted)
        );
    }
}
