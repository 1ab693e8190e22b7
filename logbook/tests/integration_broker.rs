//! End-to-end tests for the message broker.
//!
//! These tests verify:
//! - FIFO delivery per broker,
//! - isolation of failing and panicking handlers,
//! - every full-queue policy, and
//! - the start/stop lifecycle, including cancellation.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use logbook::{
    fallback_fn, handler_fn, BrokerBuilder, BrokerState, DispatchStrategy, Envelope, Error,
    FullMode, HandlerError, MessageBroker, MessageHandler, QueueOptions,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

type Seen = Arc<Mutex<Vec<u32>>>;

fn recorder(seen: &Seen) -> impl MessageHandler<u32> {
    let seen = Arc::clone(seen);
    handler_fn(move |message: Arc<u32>, _| {
        let seen = Arc::clone(&seen);
        async move {
            seen.lock().push(*message);
            Ok(())
        }
    })
}

fn failing_on(value: u32, seen: &Seen) -> impl MessageHandler<u32> {
    let seen = Arc::clone(seen);
    handler_fn(move |message: Arc<u32>, _| {
        let seen = Arc::clone(&seen);
        async move {
            if *message == value {
                return Err(HandlerError::new(format!("refused {value}")));
            }
            seen.lock().push(*message);
            Ok(())
        }
    })
}

fn counter() -> (Arc<AtomicUsize>, impl Fn(Envelope) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    (count, move |envelope: Envelope| {
        assert!(envelope.is::<u32>());
        seen.fetch_add(1, Ordering::SeqCst);
    })
}

async fn run_to_completion(broker: &MessageBroker) {
    let cancel = CancellationToken::new();
    if broker.state() == BrokerState::Created {
        broker.start(cancel.clone()).unwrap();
    }
    broker.stop(Duration::ZERO, &cancel).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_handler_sees_messages_in_send_order() {
    let seen = Seen::default();
    let mut builder = BrokerBuilder::single_handler(QueueOptions::unbounded());
    assert!(builder.subscribe::<u32, _>(recorder(&seen)));
    let broker = builder.build().unwrap();

    let cancel = CancellationToken::new();
    broker.start(cancel.clone()).unwrap();
    for i in 0..200_u32 {
        assert!(broker.send_message(i));
    }
    broker.stop(Duration::from_millis(10), &cancel).await.unwrap();

    let expected: Vec<u32> = (0..200).collect();
    assert_eq!(*seen.lock(), expected);
}

#[tokio::test]
async fn test_failing_handler_does_not_block_next_message() {
    let seen = Seen::default();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let mut builder = BrokerBuilder::single_handler(QueueOptions::unbounded());
    builder.subscribe::<u32, _>(failing_on(2, &seen));
    {
        let failures = Arc::clone(&failures);
        builder.on_handler_error(move |failure| {
            failures
                .lock()
                .push((failure.message_type, failure.error.message().to_owned()));
        });
    }
    let broker = builder.build().unwrap();
    for i in 1..=3_u32 {
        broker.send_message(i);
    }
    run_to_completion(&broker).await;

    assert_eq!(*seen.lock(), [1, 3]);
    assert_eq!(*failures.lock(), [("u32", "refused 2".to_owned())]);
}

#[tokio::test]
async fn test_failing_handler_does_not_affect_sibling_handler() {
    let first = Seen::default();
    let second = Seen::default();
    let mut builder = BrokerBuilder::multi_handler(QueueOptions::unbounded());
    builder.subscribe::<u32, _>(failing_on(2, &first));
    builder.subscribe::<u32, _>(recorder(&second));
    let broker = builder.build().unwrap();
    assert_eq!(broker.strategy(), DispatchStrategy::MultiHandler);
    assert_eq!(broker.handler_count::<u32>(), 2);

    for i in 1..=3_u32 {
        broker.send_message(i);
    }
    run_to_completion(&broker).await;

    assert_eq!(*first.lock(), [1, 3]);
    assert_eq!(*second.lock(), [1, 2, 3]);
}

#[tokio::test]
async fn test_panicking_handler_is_isolated() {
    let seen = Seen::default();
    let failures = Arc::new(AtomicUsize::new(0));
    let mut builder = BrokerBuilder::multi_handler(QueueOptions::unbounded());
    builder.subscribe::<u32, _>(handler_fn(|message: Arc<u32>, _| async move {
        assert!(*message % 2 == 1, "even message");
        Ok(())
    }));
    builder.subscribe::<u32, _>(recorder(&seen));
    {
        let failures = Arc::clone(&failures);
        builder.on_handler_error(move |_| {
            failures.fetch_add(1, Ordering::SeqCst);
        });
    }
    let broker = builder.build().unwrap();
    for i in 1..=4_u32 {
        broker.send_message(i);
    }
    run_to_completion(&broker).await;

    assert_eq!(*seen.lock(), [1, 2, 3, 4]);
    assert_eq!(failures.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fallback_only_sees_unhandled_types() {
    let seen = Seen::default();
    let unhandled = Arc::new(Mutex::new(Vec::new()));
    let mut builder = BrokerBuilder::single_handler(QueueOptions::unbounded());
    builder.subscribe::<u32, _>(recorder(&seen));
    {
        let unhandled = Arc::clone(&unhandled);
        builder
            .set_fallback(fallback_fn(move |envelope: Envelope, _| {
                let unhandled = Arc::clone(&unhandled);
                async move {
                    unhandled.lock().push(envelope.type_name());
                    Ok(())
                }
            }))
            .unwrap();
    }
    let broker = builder.build().unwrap();
    broker.send_message(1_u32);
    broker.send_message(String::from("text"));
    broker.send_message(2_u32);
    run_to_completion(&broker).await;

    assert_eq!(*seen.lock(), [1, 2]);
    assert_eq!(unhandled.lock().len(), 1);
    assert!(unhandled.lock()[0].ends_with("String"));
}

#[tokio::test]
async fn test_messages_without_handler_are_skipped() {
    let seen = Seen::default();
    let mut builder = BrokerBuilder::multi_handler(QueueOptions::unbounded());
    builder.subscribe::<u32, _>(recorder(&seen));
    let broker = builder.build().unwrap();
    assert!(broker.send_message(-1_i64));
    assert!(broker.send_message(5_u32));
    run_to_completion(&broker).await;
    assert_eq!(*seen.lock(), [5]);
}

#[tokio::test]
async fn test_drop_newest_with_slow_handler_drops_all_but_one() {
    let delivered = Arc::new(AtomicUsize::new(0));
    let (dropped, observer) = counter();
    let mut builder =
        BrokerBuilder::single_handler(QueueOptions::bounded(1, FullMode::DropNewest));
    {
        let delivered = Arc::clone(&delivered);
        builder.subscribe::<u32, _>(handler_fn(move |_: Arc<u32>, _| {
            let delivered = Arc::clone(&delivered);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                delivered.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));
    }
    builder.on_drop(observer);
    let broker = builder.build().unwrap();

    let cancel = CancellationToken::new();
    broker.start(cancel.clone()).unwrap();
    // The consumer cannot run between these sends on a current-thread runtime.
    for i in 0..10_u32 {
        assert!(broker.send_message(i));
    }
    broker.stop(Duration::ZERO, &cancel).await.unwrap();

    assert_eq!(dropped.load(Ordering::SeqCst), 9);
    assert!(delivered.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_bounded_policies_without_draining() {
    const CAPACITY: usize = 3;
    const EXTRA: usize = 5;

    for mode in [FullMode::DropNewest, FullMode::DropOldest, FullMode::Reject] {
        let seen = Seen::default();
        let (dropped, observer) = counter();
        let mut builder =
            BrokerBuilder::single_handler(QueueOptions::bounded(CAPACITY, mode));
        builder.subscribe::<u32, _>(recorder(&seen));
        builder.on_drop(observer);
        let broker = builder.build().unwrap();

        let mut accepted = 0;
        for i in 0..(CAPACITY + EXTRA) as u32 {
            if broker.send_message(i) {
                accepted += 1;
            }
        }
        assert_eq!(broker.queued(), CAPACITY);
        run_to_completion(&broker).await;

        assert_eq!(dropped.load(Ordering::SeqCst), EXTRA, "{mode:?}");
        assert!(seen.lock().len() <= CAPACITY);
        match mode {
            FullMode::DropNewest => assert_eq!(*seen.lock(), [0, 1, 7]),
            FullMode::DropOldest => assert_eq!(*seen.lock(), [5, 6, 7]),
            FullMode::Reject => {
                assert_eq!(*seen.lock(), [0, 1, 2]);
                assert_eq!(accepted, CAPACITY);
            }
            FullMode::Wait => unreachable!(),
        }
    }
}

#[tokio::test]
async fn test_wait_mode_suspends_async_sender_until_space() {
    let seen = Seen::default();
    let (dropped, observer) = counter();
    let mut builder = BrokerBuilder::single_handler(QueueOptions::bounded(1, FullMode::Wait));
    builder.subscribe::<u32, _>(recorder(&seen));
    builder.on_drop(observer);
    let broker = builder.build().unwrap();

    assert!(broker.send_message(1_u32));
    // Non-blocking sends fail fast while the queue is full.
    assert!(!broker.send_message(9_u32));

    let cancel = CancellationToken::new();
    broker.start(cancel.clone()).unwrap();
    assert!(broker.send_message_async(2_u32, &cancel).await.unwrap());
    broker.stop(Duration::ZERO, &cancel).await.unwrap();

    assert_eq!(*seen.lock(), [1, 2]);
    assert_eq!(dropped.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_async_send_observes_cancellation_and_closure() {
    let broker = BrokerBuilder::single_handler(QueueOptions::bounded(1, FullMode::Wait))
        .build()
        .unwrap();
    assert!(broker.send_message(1_u32));

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert!(matches!(
        broker.send_message_async(2_u32, &cancelled).await,
        Err(Error::Cancelled)
    ));

    run_to_completion(&broker).await;
    let fresh = CancellationToken::new();
    assert!(!broker.send_message_async(3_u32, &fresh).await.unwrap());
    assert!(!broker.send_message(4_u32));
}

#[tokio::test]
async fn test_lifecycle_errors() {
    let broker = BrokerBuilder::single_handler(QueueOptions::unbounded())
        .build()
        .unwrap();
    let cancel = CancellationToken::new();
    assert!(matches!(
        broker.stop(Duration::ZERO, &cancel).await,
        Err(Error::OperationInvalid(_))
    ));

    broker.start(cancel.clone()).unwrap();
    assert!(matches!(
        broker.start(cancel.clone()),
        Err(Error::OperationInvalid(_))
    ));
    broker.stop(Duration::ZERO, &cancel).await.unwrap();
    assert_eq!(broker.state(), BrokerState::Stopped);
    assert!(matches!(
        broker.start(cancel.clone()),
        Err(Error::OperationInvalid(_))
    ));
}

#[tokio::test]
async fn test_messages_sent_during_drain_delay_are_delivered() {
    let seen = Seen::default();
    let mut builder = BrokerBuilder::single_handler(QueueOptions::unbounded());
    builder.subscribe::<u32, _>(recorder(&seen));
    let broker = Arc::new(builder.build().unwrap());

    let cancel = CancellationToken::new();
    broker.start(cancel.clone()).unwrap();
    let stopping = {
        let broker = Arc::clone(&broker);
        let cancel = cancel.clone();
        tokio::spawn(async move { broker.stop(Duration::from_millis(50), &cancel).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(broker.state(), BrokerState::Draining);
    assert!(broker.send_message(7_u32));
    assert!(matches!(
        broker.stop(Duration::ZERO, &cancel).await,
        Err(Error::OperationInvalid(_))
    ));

    stopping.await.unwrap().unwrap();
    assert_eq!(*seen.lock(), [7]);
}

#[tokio::test]
async fn test_cancelled_stop_signals_in_flight_handler() {
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let finished = Arc::new(AtomicUsize::new(0));
    let mut builder = BrokerBuilder::single_handler(QueueOptions::unbounded());
    {
        let finished = Arc::clone(&finished);
        builder.subscribe::<u32, _>(handler_fn(move |_: Arc<u32>, cancel: CancellationToken| {
            let started_tx = started_tx.clone();
            let finished = Arc::clone(&finished);
            async move {
                let _ = started_tx.send(());
                cancel.cancelled().await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));
    }
    let broker = builder.build().unwrap();
    broker.send_message(1_u32);
    broker.send_message(2_u32);

    broker.start(CancellationToken::new()).unwrap();
    started_rx.recv().await.unwrap();

    let stop = CancellationToken::new();
    stop.cancel();
    broker.stop(Duration::from_secs(60), &stop).await.unwrap();

    assert_eq!(broker.state(), BrokerState::Stopped);
    // The second message was discarded once the consumer saw cancellation.
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

/// A handler that reports each message it starts, then waits for a permit.
fn gated(
    gate: &Arc<Semaphore>,
    seen: &Seen,
) -> (impl MessageHandler<u32>, mpsc::UnboundedReceiver<u32>) {
    let (started_tx, started_rx) = mpsc::unbounded_channel();
    let gate = Arc::clone(gate);
    let seen = Arc::clone(seen);
    let handler = handler_fn(move |message: Arc<u32>, _| {
        let gate = Arc::clone(&gate);
        let seen = Arc::clone(&seen);
        let started_tx = started_tx.clone();
        async move {
            let _ = started_tx.send(*message);
            let Ok(_permit) = gate.acquire().await else {
                return Err(HandlerError::new("gate closed"));
            };
            seen.lock().push(*message);
            Ok(())
        }
    });
    (handler, started_rx)
}

#[tokio::test]
async fn test_in_flight_message_does_not_free_whole_capacity() {
    let seen = Seen::default();
    let gate = Arc::new(Semaphore::new(0));
    let (dropped, observer) = counter();
    let (handler, mut started) = gated(&gate, &seen);
    let mut builder =
        BrokerBuilder::single_handler(QueueOptions::bounded(2, FullMode::DropOldest));
    builder.subscribe::<u32, _>(handler);
    builder.on_drop(observer);
    let broker = builder.build().unwrap();

    assert!(broker.send_message(1_u32));
    assert!(broker.send_message(2_u32));
    let cancel = CancellationToken::new();
    broker.start(cancel.clone()).unwrap();
    assert_eq!(started.recv().await, Some(1));
    // Only the message being handled has left the queue.
    assert_eq!(broker.queued(), 1);

    assert!(broker.send_message(3_u32));
    assert_eq!(dropped.load(Ordering::SeqCst), 0);
    assert!(broker.send_message(4_u32));
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
    assert_eq!(broker.queued(), 2);

    gate.add_permits(10);
    broker.stop(Duration::ZERO, &cancel).await.unwrap();
    assert_eq!(*seen.lock(), [1, 3, 4]);
}

#[tokio::test]
async fn test_wait_mode_stays_full_while_handler_is_blocked() {
    let seen = Seen::default();
    let gate = Arc::new(Semaphore::new(0));
    let (handler, mut started) = gated(&gate, &seen);
    let mut builder = BrokerBuilder::single_handler(QueueOptions::bounded(2, FullMode::Wait));
    builder.subscribe::<u32, _>(handler);
    let broker = builder.build().unwrap();

    assert!(broker.send_message(1_u32));
    assert!(broker.send_message(2_u32));
    let cancel = CancellationToken::new();
    broker.start(cancel.clone()).unwrap();
    assert_eq!(started.recv().await, Some(1));

    assert!(broker.send_message(3_u32));
    assert!(!broker.send_message(4_u32));
    let waiting = CancellationToken::new();
    waiting.cancel();
    assert!(matches!(
        broker.send_message_async(5_u32, &waiting).await,
        Err(Error::Cancelled)
    ));

    gate.add_permits(10);
    broker.stop(Duration::ZERO, &cancel).await.unwrap();
    assert_eq!(*seen.lock(), [1, 2, 3]);
}

#[tokio::test]
async fn test_huge_capacity_builds_without_preallocating() {
    let seen = Seen::default();
    let mut builder = BrokerBuilder::single_handler(QueueOptions::bounded(
        usize::MAX / 2,
        FullMode::DropNewest,
    ));
    builder.subscribe::<u32, _>(recorder(&seen));
    let broker = builder.build().unwrap();
    assert!(broker.send_message(1_u32));
    run_to_completion(&broker).await;
    assert_eq!(*seen.lock(), [1]);
}
