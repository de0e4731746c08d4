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

/// User-supplied sink behind a [`Consumer`].
pub trait Consume: Send + 'static {
    type Item: Send + 'static;

    /// Handle one item. An `Err` is logged and the consumer carries on.
    fn consume_item(&mut self, item: Self::Item) -> crate::core::Result<()>;
}

/// Stage that pulls items from a link into its [`Consume`] body.
///
/// Finishes the first time the link yields nothing.
pub struct Consumer<C: Consume> {
    lifecycle: StageLifecycle,
    body: Mutex<C>,
    link: Arc<Link<C::Item>>,
    logger: Arc<dyn StageLogger>,
}

impl<C: Consume> Consumer<C> {
    pub fn new(
        name: impl Into<String>,
        threading: Arc<dyn ThreadingModel>,
        link: Arc<Link<C::Item>>,
        body: C,
    ) -> Arc<Self> {
        Self::with_logger(name, threading, link, body, default_logger())
    }

    pub fn with_logger(
        name: impl Into<String>,
        threading: Arc<dyn ThreadingModel>,
        link: Arc<Link<C::Item>>,
        body: C,
        logger: Arc<dyn StageLogger>,
    ) -> Arc<Self> {
        Arc::new(Self::build(name, threading, link, body, logger))
    }

    pub(crate) fn build(
        name: impl Into<String>,
        threading: Arc<dyn ThreadingModel>,
        link: Arc<Link<C::Item>>,
        body: C,
        logger: Arc<dyn StageLogger>,
    ) -> Self {
        Self {
            lifecycle: StageLifecycle::new(name, threading),
            body: Mutex::new(body),
            link,
            logger,
        }
    }

    pub fn link(&self) -> &Arc<Link<C::Item>> {
        &self.link
    }

    /// Run `f` against the body. Blocks while a round is in progress.
    pub fn with_body<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.body.lock())
    }
}

impl<C: Consume> Stage for Consumer<C> {
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

        let Some(item) = self.link.get() else {
            if self.link.is_broken() {
                if self.lifecycle.latch().close(FinishReason::LinkBroken) {
                    self.log_message("Inbound link broken", &StageError::LinkBroken);
                }
            } else if self.lifecycle.latch().close(FinishReason::SawEndOfStream) {
                tracing::debug!("[{}] Saw end of stream", self.lifecycle.name());
            }
            return;
        };

        if let Err(e) = self.body.lock().consume_item(item) {
            self.log_message("Consume failed", &e);
        }
    }

    fn is_finished(&self) -> bool {
        self.lifecycle.latch().is_closed()
    }

    fn log_message(&self, message: &str, cause: &StageError) {
        self.logger
            .log_message(self.lifecycle.name(), message, cause);
    }
}

impl<C: Consume> std::fmt::Debug for Consumer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("lifecycle", &self.lifecycle)
            .field("link", &self.link)
            .finish()
    }
}
