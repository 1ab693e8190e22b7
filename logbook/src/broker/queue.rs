//! Queue between producers and the broker's consumer task.
//!
//! Producers push [`Envelope`]s from any thread; a single consumer takes them
//! one at a time, so a message stays counted against the capacity until the
//! consumer is ready for it. A bounded queue applies its [`FullMode`] when a
//! write finds it full.

use std::{
    any::{Any, TypeId},
    collections::VecDeque,
    fmt,
    sync::Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Error;

/// What a bounded queue does with a write when it is full.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FullMode {
    /// Async writes wait for space; non-blocking writes fail.
    #[default]
    Wait,
    /// Evict the oldest queued message to make room.
    DropOldest,
    /// Evict the most recently queued message to make room.
    DropNewest,
    /// Refuse the write.
    Reject,
}

/// Called with every message the queue discards.
pub type DropObserver = Arc<dyn Fn(Envelope) + Send + Sync>;

/// A type-tagged message in flight.
#[derive(Clone)]
pub struct Envelope {
    type_id: TypeId,
    type_name: &'static str,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Envelope {
    pub fn new<T>(message: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            payload: Arc::new(message),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }

    /// Returns the shared payload, or the envelope itself on a type mismatch.
    pub fn downcast<T>(self) -> Result<Arc<T>, Self>
    where
        T: Send + Sync + 'static,
    {
        let Self {
            type_id,
            type_name,
            payload,
        } = self;
        Arc::downcast(payload).map_err(|payload| Self {
            type_id,
            type_name,
            payload,
        })
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Result of a non-blocking write.
#[derive(Debug)]
pub(crate) enum TryWrite {
    Accepted,
    /// The queue is full and waits for space; the envelope is handed back.
    Full(Envelope),
    Rejected,
    Closed,
}

struct State {
    items: VecDeque<Envelope>,
    closed: bool,
}

pub(crate) struct MessageQueue {
    state: Mutex<State>,
    capacity: Option<usize>,
    full_mode: FullMode,
    readable: Notify,
    writable: Notify,
    on_drop: Option<DropObserver>,
}

impl MessageQueue {
    pub(crate) fn new(
        capacity: Option<usize>,
        full_mode: FullMode,
        on_drop: Option<DropObserver>,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            capacity,
            full_mode,
            readable: Notify::new(),
            writable: Notify::new(),
            on_drop,
        }
    }

    pub(crate) fn try_write(&self, envelope: Envelope) -> TryWrite {
        let (outcome, dropped) = {
            let mut state = self.state.lock();
            if state.closed {
                return TryWrite::Closed;
            }
            match self.capacity {
                Some(capacity) if state.items.len() >= capacity => match self.full_mode {
                    FullMode::Wait => return TryWrite::Full(envelope),
                    FullMode::DropOldest => {
                        let dropped = state.items.pop_front();
                        state.items.push_back(envelope);
                        (TryWrite::Accepted, dropped)
                    }
                    FullMode::DropNewest => {
                        let dropped = state.items.pop_back();
                        state.items.push_back(envelope);
                        (TryWrite::Accepted, dropped)
                    }
                    FullMode::Reject => (TryWrite::Rejected, Some(envelope)),
                },
                _ => {
                    state.items.push_back(envelope);
                    (TryWrite::Accepted, None)
                }
            }
        };

        if matches!(outcome, TryWrite::Accepted) {
            self.readable.notify_one();
        }
        if let Some(dropped) = dropped {
            debug!(
                message_type = dropped.type_name(),
                full_mode = ?self.full_mode,
                "Queue full, message dropped"
            );
            if let Some(observer) = &self.on_drop {
                observer(dropped);
            }
        }
        outcome
    }

    /// Writes `envelope`, waiting for space under [`FullMode::Wait`].
    ///
    /// Returns `false` when the queue is closed or refuses the write.
    pub(crate) async fn write(
        &self,
        mut envelope: Envelope,
        cancel: &CancellationToken,
    ) -> Result<bool, Error> {
        loop {
            // Registered before the attempt so a concurrent drain is not missed.
            let space = self.writable.notified();
            match self.try_write(envelope) {
                TryWrite::Accepted => return Ok(true),
                TryWrite::Rejected | TryWrite::Closed => return Ok(false),
                TryWrite::Full(returned) => envelope = returned,
            }
            tokio::select! {
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = space => {}
            }
        }
    }

    /// Takes the oldest queued message, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub(crate) async fn read(&self) -> Option<Envelope> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(envelope) = state.items.pop_front() {
                    drop(state);
                    self.writable.notify_waiters();
                    return Some(envelope);
                }
                if state.closed {
                    return None;
                }
            }
            self.readable.notified().await;
        }
    }

    /// Stops accepting writes. Queued messages stay readable.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.readable.notify_one();
        self.writable.notify_waiters();
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().items.len()
    }
}
