//! Typed, asynchronous message broker.
//!
//! Producers call [`MessageBroker::send_message`] from any thread. One
//! consumer task, spawned by [`MessageBroker::start`], takes messages off the
//! queue in order and hands each one to the handlers registered for its type,
//! one message and one handler at a time.
//!
//! ```text
//! Created --start--> Started --stop--> Draining --> Stopped
//! ```
//!
//! Handlers are registered on a [`BrokerBuilder`]; the table is frozen once
//! the broker is built.

mod dispatch;
mod queue;

use std::{
    any::Any,
    fmt,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Duration,
};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use dispatch::{
    fallback_fn, handler_fn, DispatchStrategy, FallbackFn, FallbackHandler, HandlerFn,
    MessageHandler,
};
pub use queue::{DropObserver, Envelope, FullMode};

use self::{
    dispatch::HandlerTable,
    queue::{MessageQueue, TryWrite},
};
use crate::{
    config::QueueOptions,
    error::{Error, HandlerError},
};

/// Lifecycle of a [`MessageBroker`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BrokerState {
    Created,
    Started,
    /// `stop` is waiting out the drain delay or the last queued messages.
    Draining,
    Stopped,
}

/// A handler call that returned an error or panicked.
#[derive(Debug)]
pub struct HandlerFailure {
    pub message_type: &'static str,
    pub error: HandlerError,
}

/// Diagnostic sink for handler failures.
pub type HandlerErrorObserver = Arc<dyn Fn(&HandlerFailure) + Send + Sync>;

/// Collects handlers and queue settings for a [`MessageBroker`].
pub struct BrokerBuilder {
    table: HandlerTable,
    queue: QueueOptions,
    on_drop: Option<DropObserver>,
    on_handler_error: Option<HandlerErrorObserver>,
}

impl BrokerBuilder {
    pub fn new(strategy: DispatchStrategy, queue: QueueOptions) -> Self {
        Self {
            table: HandlerTable::new(strategy),
            queue,
            on_drop: None,
            on_handler_error: None,
        }
    }

    /// One handler per message type, plus an optional fallback.
    pub fn single_handler(queue: QueueOptions) -> Self {
        Self::new(DispatchStrategy::SingleHandler, queue)
    }

    /// Any number of handlers per message type, no fallback.
    pub fn multi_handler(queue: QueueOptions) -> Self {
        Self::new(DispatchStrategy::MultiHandler, queue)
    }

    /// Registers `handler` for messages of type `T`.
    ///
    /// Returns `false` when a single-handler broker already has a handler for `T`.
    pub fn subscribe<T, H>(&mut self, handler: H) -> bool
    where
        T: Send + Sync + 'static,
        H: MessageHandler<T>,
    {
        self.table.subscribe::<T, H>(handler)
    }

    /// Removes the handlers registered for `T`. Returns `false` if there were none.
    pub fn unsubscribe<T: 'static>(&mut self) -> bool {
        self.table.unsubscribe::<T>()
    }

    /// Sets the handler for message types with no typed handler.
    ///
    /// Only single-handler brokers have a fallback.
    pub fn set_fallback<H: FallbackHandler>(&mut self, handler: H) -> Result<(), Error> {
        if self.table.set_fallback(Box::new(handler)) {
            Ok(())
        } else {
            Err(Error::operation_invalid(
                "multi-handler brokers do not support a fallback handler",
            ))
        }
    }

    /// Called with every message a bounded queue discards or refuses.
    pub fn on_drop<F>(&mut self, observer: F) -> &mut Self
    where
        F: Fn(Envelope) + Send + Sync + 'static,
    {
        self.on_drop = Some(Arc::new(observer));
        self
    }

    /// Called with every handler failure the consumer catches.
    pub fn on_handler_error<F>(&mut self, observer: F) -> &mut Self
    where
        F: Fn(&HandlerFailure) + Send + Sync + 'static,
    {
        self.on_handler_error = Some(Arc::new(observer));
        self
    }

    pub fn build(self) -> Result<MessageBroker, Error> {
        if self.queue.capacity == Some(0) {
            return Err(Error::argument("queue capacity must be greater than zero"));
        }
        let queue = MessageQueue::new(self.queue.capacity, self.queue.full_mode, self.on_drop);
        Ok(MessageBroker {
            inner: Arc::new(Inner {
                queue,
                table: self.table,
                on_handler_error: self.on_handler_error,
            }),
            lifecycle: Mutex::new(Lifecycle {
                state: BrokerState::Created,
                consumer: None,
                token: None,
            }),
        })
    }
}

struct Inner {
    queue: MessageQueue,
    table: HandlerTable,
    on_handler_error: Option<HandlerErrorObserver>,
}

struct Lifecycle {
    state: BrokerState,
    consumer: Option<JoinHandle<()>>,
    token: Option<CancellationToken>,
}

/// Routes messages from any number of producers to per-type handlers.
pub struct MessageBroker {
    inner: Arc<Inner>,
    lifecycle: Mutex<Lifecycle>,
}

impl MessageBroker {
    /// Queues `message` without waiting.
    ///
    /// Returns `false` when the queue is closed, or full and either refusing
    /// writes or waiting for space.
    pub fn send_message<T>(&self, message: T) -> bool
    where
        T: Send + Sync + 'static,
    {
        match self.inner.queue.try_write(Envelope::new(message)) {
            TryWrite::Accepted => true,
            TryWrite::Full(_) | TryWrite::Rejected | TryWrite::Closed => false,
        }
    }

    /// Queues `message`, waiting for space when a bounded queue is full under
    /// [`FullMode::Wait`].
    ///
    /// Returns `Ok(false)` once the queue is closed.
    pub async fn send_message_async<T>(
        &self,
        message: T,
        cancel: &CancellationToken,
    ) -> Result<bool, Error>
    where
        T: Send + Sync + 'static,
    {
        self.inner.queue.write(Envelope::new(message), cancel).await
    }

    /// Spawns the consumer task on the current Tokio runtime.
    ///
    /// Cancelling `cancel` stops the consumer without draining the queue.
    pub fn start(&self, cancel: CancellationToken) -> Result<(), Error> {
        let runtime = Handle::try_current()
            .map_err(|_| Error::operation_invalid("the broker must start inside a Tokio runtime"))?;

        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != BrokerState::Created {
            return Err(Error::operation_invalid(format!(
                "the broker cannot start from the {:?} state",
                lifecycle.state
            )));
        }
        let token = cancel.child_token();
        let consumer = runtime.spawn(consume(Arc::clone(&self.inner), token.clone()));
        lifecycle.state = BrokerState::Started;
        lifecycle.consumer = Some(consumer);
        lifecycle.token = Some(token);
        drop(lifecycle);

        info!(strategy = ?self.inner.table.strategy(), "Message broker started");
        Ok(())
    }

    /// Stops the broker.
    ///
    /// Keeps accepting messages for `drain_delay`, then closes the queue and
    /// waits for the consumer to finish what is queued. Cancelling `cancel`
    /// cuts the delay short and signals the consumer, whose handlers observe
    /// it cooperatively. Stopping a stopped broker is a no-op.
    pub async fn stop(&self, drain_delay: Duration, cancel: &CancellationToken) -> Result<(), Error> {
        let (consumer, token) = {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.state {
                BrokerState::Created => {
                    return Err(Error::operation_invalid("the broker was never started"))
                }
                BrokerState::Draining => {
                    return Err(Error::operation_invalid("the broker is already stopping"))
                }
                BrokerState::Stopped => return Ok(()),
                BrokerState::Started => {}
            }
            lifecycle.state = BrokerState::Draining;
            (lifecycle.consumer.take(), lifecycle.token.take())
        };
        debug!(drain_delay_ms = drain_delay.as_millis(), "Message broker draining");

        tokio::select! {
            biased;
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(drain_delay) => {}
        }
        self.inner.queue.close();

        if let Some(mut consumer) = consumer {
            let drained = tokio::select! {
                biased;
                finished = &mut consumer => Some(finished),
                () = cancel.cancelled() => None,
            };
            let finished = match drained {
                Some(finished) => finished,
                None => {
                    if let Some(token) = &token {
                        token.cancel();
                    }
                    consumer.await
                }
            };
            if let Err(err) = finished {
                warn!(error = %err, "Broker consumer ended abnormally");
            }
        }
        if let Some(token) = token {
            token.cancel();
        }

        self.lifecycle.lock().state = BrokerState::Stopped;
        info!(discarded = self.inner.queue.len(), "Message broker stopped");
        Ok(())
    }

    pub fn state(&self) -> BrokerState {
        self.lifecycle.lock().state
    }

    pub fn strategy(&self) -> DispatchStrategy {
        self.inner.table.strategy()
    }

    /// Number of handlers that will see a message of type `T`.
    pub fn handler_count<T: 'static>(&self) -> usize {
        self.inner.table.handler_count::<T>()
    }

    /// Messages waiting for the consumer.
    pub fn queued(&self) -> usize {
        self.inner.queue.len()
    }
}

impl fmt::Debug for MessageBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBroker")
            .field("strategy", &self.strategy())
            .field("state", &self.state())
            .field("queued", &self.queued())
            .finish_non_exhaustive()
    }
}

impl Drop for MessageBroker {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut();
        if let Some(token) = lifecycle.token.take() {
            token.cancel();
        }
        self.inner.queue.close();
    }
}

async fn consume(inner: Arc<Inner>, cancel: CancellationToken) {
    loop {
        let envelope = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = inner.queue.read() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };
        inner.dispatch(&envelope, &cancel).await;
    }
    inner.queue.close();
    let discarded = inner.queue.len();
    if discarded > 0 {
        debug!(discarded, "Broker cancelled, queued messages discarded");
    }
    debug!("Broker consumer finished");
}

impl Inner {
    async fn dispatch(&self, envelope: &Envelope, cancel: &CancellationToken) {
        let targets = self.table.targets(envelope);
        if targets.is_empty() {
            debug!(message_type = envelope.type_name(), "No handler for message");
            return;
        }
        for target in targets {
            let invocation = async move { target.call(envelope, cancel).await };
            let error = match AssertUnwindSafe(invocation).catch_unwind().await {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error,
                Err(panic) => HandlerError::new(format!(
                    "handler panicked: {}",
                    panic_message(panic.as_ref())
                )),
            };
            self.report(&HandlerFailure {
                message_type: envelope.type_name(),
                error,
            });
        }
    }

    fn report(&self, failure: &HandlerFailure) {
        warn!(
            message_type = failure.message_type,
            error = %failure.error,
            "Message handler failed"
        );
        if let Some(observer) = &self.on_handler_error {
            if std::panic::catch_unwind(AssertUnwindSafe(|| observer(failure))).is_err() {
                warn!(
                    message_type = failure.message_type,
                    "Handler error observer panicked"
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        pin::Pin,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    fn recording_broker(seen: &Arc<Mutex<Vec<u32>>>) -> MessageBroker {
        let mut builder = BrokerBuilder::single_handler(QueueOptions::unbounded());
        let seen = Arc::clone(seen);
        builder.subscribe::<u32, _>(handler_fn(move |message: Arc<u32>, _| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().push(*message);
                Ok(())
            }
        }));
        builder.build().unwrap()
    }

    #[test]
    fn start_outside_runtime_is_invalid() {
        let broker = BrokerBuilder::single_handler(QueueOptions::unbounded())
            .build()
            .unwrap();
        assert!(matches!(
            broker.start(CancellationToken::new()),
            Err(Error::OperationInvalid(_))
        ));
        assert_eq!(broker.state(), BrokerState::Created);
    }

    #[test]
    fn zero_capacity_is_an_argument_error() {
        let result =
            BrokerBuilder::single_handler(QueueOptions::bounded(0, FullMode::Wait)).build();
        assert!(matches!(result, Err(Error::Argument(_))));
    }

    #[test]
    fn multi_handler_broker_has_no_fallback() {
        let mut builder = BrokerBuilder::multi_handler(QueueOptions::unbounded());
        let result = builder.set_fallback(fallback_fn(|_, _| async { Ok(()) }));
        assert!(matches!(result, Err(Error::OperationInvalid(_))));
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let broker = recording_broker(&seen);
        let cancel = CancellationToken::new();

        assert!(matches!(
            broker.stop(Duration::ZERO, &cancel).await,
            Err(Error::OperationInvalid(_))
        ));
        broker.start(cancel.clone()).unwrap();
        assert_eq!(broker.state(), BrokerState::Started);
        assert!(matches!(
            broker.start(cancel.clone()),
            Err(Error::OperationInvalid(_))
        ));

        broker.stop(Duration::ZERO, &cancel).await.unwrap();
        assert_eq!(broker.state(), BrokerState::Stopped);
        broker.stop(Duration::ZERO, &cancel).await.unwrap();
        assert!(!broker.send_message(1_u32));
    }

    #[tokio::test]
    async fn stop_drains_queued_messages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let broker = recording_broker(&seen);
        for i in 0..5_u32 {
            assert!(broker.send_message(i));
        }
        let cancel = CancellationToken::new();
        broker.start(cancel.clone()).unwrap();
        broker.stop(Duration::ZERO, &cancel).await.unwrap();
        assert_eq!(*seen.lock(), [0, 1, 2, 3, 4]);
        assert_eq!(broker.queued(), 0);
    }

    #[tokio::test]
    async fn panicking_handler_is_reported_and_isolated() {
        let failures = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(AtomicUsize::new(0));
        let mut builder = BrokerBuilder::single_handler(QueueOptions::unbounded());
        {
            let handled = Arc::clone(&handled);
            builder.subscribe::<u32, _>(handler_fn(move |message: Arc<u32>, _| {
                let handled = Arc::clone(&handled);
                async move {
                    assert!(*message != 1, "boom");
                    handled.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }));
        }
        {
            let failures = Arc::clone(&failures);
            builder.on_handler_error(move |failure| {
                assert!(failure.error.message().contains("boom"));
                failures.fetch_add(1, Ordering::SeqCst);
            });
        }
        let broker = builder.build().unwrap();
        for i in 0..3_u32 {
            broker.send_message(i);
        }
        let cancel = CancellationToken::new();
        broker.start(cancel.clone()).unwrap();
        broker.stop(Duration::ZERO, &cancel).await.unwrap();

        assert_eq!(handled.load(Ordering::SeqCst), 2);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    /// Panics while building its future, before anything is polled.
    struct PanicsOnCall;

    impl MessageHandler<u32> for PanicsOnCall {
        fn handle<'life0, 'async_trait>(
            &'life0 self,
            _message: Arc<u32>,
            _cancel: CancellationToken,
        ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'async_trait>>
        where
            'life0: 'async_trait,
            Self: 'async_trait,
        {
            panic!("no future for you")
        }
    }

    #[tokio::test]
    async fn panic_while_creating_handler_future_is_isolated() {
        let failures = Arc::new(Mutex::new(Vec::new()));
        let handled = Arc::new(AtomicUsize::new(0));
        let mut builder = BrokerBuilder::multi_handler(QueueOptions::unbounded());
        builder.subscribe::<u32, _>(PanicsOnCall);
        {
            let handled = Arc::clone(&handled);
            builder.subscribe::<u32, _>(handler_fn(move |_: Arc<u32>, _| {
                let handled = Arc::clone(&handled);
                async move {
                    handled.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }));
        }
        {
            let failures = Arc::clone(&failures);
            builder.on_handler_error(move |failure| {
                failures.lock().push(failure.error.message().to_owned());
            });
        }
        let broker = builder.build().unwrap();
        for i in 0..2_u32 {
            broker.send_message(i);
        }
        let cancel = CancellationToken::new();
        broker.start(cancel.clone()).unwrap();
        broker.stop(Duration::ZERO, &cancel).await.unwrap();

        assert_eq!(handled.load(Ordering::SeqCst), 2);
        assert_eq!(
            *failures.lock(),
            ["handler panicked: no future for you"; 2]
        );
    }

    #[test]
    fn panic_message_reads_str_and_string() {
        let text: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(text.as_ref()), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(5_u8);
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
