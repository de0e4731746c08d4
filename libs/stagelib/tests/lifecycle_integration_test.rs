// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Lifecycle and link guarantees observed from outside the crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use stagelib::core::testing::{wait_until, RecordingLogger};
use stagelib::core::{
    AlwaysFailsThreadingModel, CollectSink, Consumer, FinishReason, InlineThreadingModel,
    IterSource, Link, Producer, Result, SingleThreadThreadingModel, Stage, StageError, StageExt,
    StageState, ThreadingModel,
};

/// Inline model that counts how often it was asked to run something.
#[derive(Default)]
struct CountingModel {
    runs: AtomicUsize,
}

impl ThreadingModel for CountingModel {
    fn run(&self, stage: Arc<dyn Stage>) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        InlineThreadingModel::new().run(stage)
    }

    fn description(&self) -> String {
        "Counting".to_string()
    }
}

#[test]
fn test_start_reaches_threading_model_once() {
    let model = Arc::new(CountingModel::default());
    let logger = Arc::new(RecordingLogger::new());
    let link = Arc::new(Link::unbounded());
    let producer = Producer::with_logger(
        "once",
        model.clone(),
        link.clone(),
        IterSource::new(0..3u32),
        logger.clone(),
    );

    assert_eq!(producer.lifecycle().state(), StageState::NotStarted);
    producer.start().unwrap();
    producer.start().unwrap();

    assert_eq!(model.runs.load(Ordering::SeqCst), 1);
    assert_eq!(link.queue_length(), 3);
    assert_eq!(logger.count_containing("Can only start once"), 1);
}

#[test]
fn test_single_thread_start_spawns_once() {
    let model = Arc::new(SingleThreadThreadingModel::new());
    let link = Arc::new(Link::unbounded());
    let producer = Producer::with_logger(
        "once",
        model.clone(),
        link,
        IterSource::new(0..1000u32),
        Arc::new(RecordingLogger::new()),
    );

    producer.start().unwrap();
    producer.start().unwrap();
    model.join_all();

    assert_eq!(model.threads_spawned(), 1);
    assert!(producer.is_finished());
}

#[test]
fn test_refused_start_leaves_stage_unfinished() {
    let link = Arc::new(Link::<u32>::unbounded());
    let consumer = Consumer::new(
        "refused",
        Arc::new(AlwaysFailsThreadingModel::new()),
        link,
        CollectSink::new(),
    );

    assert!(matches!(
        consumer.start(),
        Err(StageError::ThreadingRefused(_))
    ));
    assert_eq!(consumer.lifecycle().state(), StageState::Running);
    assert!(!consumer.is_finished());
}

#[test]
fn test_termination_is_monotonic() {
    let link = Arc::new(Link::bounded(1).unwrap());
    let logger = Arc::new(RecordingLogger::new());
    let producer = Producer::with_logger(
        "monotonic",
        Arc::new(AlwaysFailsThreadingModel::new()),
        link.clone(),
        IterSource::new(0..100u32),
        logger.clone(),
    );

    producer.execute();
    producer.execute();
    assert!(producer.is_finished());
    let reason = producer.lifecycle().finish_reason();
    assert_eq!(reason, Some(FinishReason::FailedAdd));

    // Space reappears, but the latch never reopens.
    link.clear_queue();
    for _ in 0..10 {
        producer.execute();
        assert!(producer.is_finished());
        assert_eq!(producer.lifecycle().finish_reason(), reason);
    }
    assert_eq!(link.queue_length(), 0);
    assert_eq!(logger.count_containing("Called execute at wrong time"), 10);
    // A stage finished before it was ever started still reports why.
    assert_eq!(
        producer.lifecycle().state(),
        StageState::Finished(FinishReason::FailedAdd)
    );
}

#[test]
fn test_backpressure_with_zero_add_timeout() {
    let link = Arc::new(Link::bounded(1).unwrap());
    assert!(link.add(1u32));

    let rejected = {
        let link = link.clone();
        thread::spawn(move || {
            let start = Instant::now();
            let added = link.add(2);
            (added, start.elapsed())
        })
        .join()
        .unwrap()
    };
    assert!(!rejected.0);
    assert!(rejected.1 < Duration::from_millis(100));

    assert_eq!(link.get(), Some(1));
    assert!(link.add(3));
    assert_eq!(link.get(), Some(3));
}

#[test]
fn test_break_link_releases_blocked_adder() {
    let link = Arc::new(Link::bounded(1).unwrap());
    link.set_add_timeout(Duration::from_secs(30));
    assert!(link.add(0u32));

    let adder = {
        let link = link.clone();
        thread::spawn(move || link.add(1))
    };
    thread::sleep(Duration::from_millis(50));
    link.break_link();

    assert!(!adder.join().unwrap());
    assert_eq!(link.queue_length(), 1);
}

#[test]
fn test_many_producers_one_consumer_lose_nothing() {
    let model = Arc::new(SingleThreadThreadingModel::new());
    let link = Arc::new(Link::bounded(8).unwrap());
    link.set_add_timeout(Duration::from_secs(5));
    link.set_fetch_timeout(Duration::from_secs(1));
    let logger = Arc::new(RecordingLogger::new());

    let producers: Vec<_> = (0..4u32)
        .map(|p| {
            Producer::with_logger(
                format!("producer-{}", p),
                model.clone(),
                link.clone(),
                IterSource::new(p * 1000..p * 1000 + 250),
                logger.clone(),
            )
        })
        .collect();
    let sink = CollectSink::new();
    let consumer = Consumer::with_logger("collect", model.clone(), link.clone(), sink.clone(), logger.clone());

    consumer.start().unwrap();
    for producer in &producers {
        producer.start().unwrap();
    }

    assert!(wait_until(Duration::from_secs(30), || consumer.is_finished()));
    model.join_all();

    let mut items = sink.take();
    items.sort_unstable();
    let mut expected: Vec<u32> = (0..4u32).flat_map(|p| p * 1000..p * 1000 + 250).collect();
    expected.sort_unstable();
    assert_eq!(items, expected);
    assert_eq!(link.get(), None);
    assert_eq!(link.source_count(), 0);
    assert!(logger.is_empty(), "unexpected diagnostics: {:?}", logger.entries());
}
