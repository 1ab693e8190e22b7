//! Handler traits and the per-type handler table.

use std::{
    any::TypeId,
    collections::HashMap,
    future::Future,
    marker::PhantomData,
    sync::Arc,
};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::queue::Envelope;
use crate::error::HandlerError;

/// Handles messages of type `T`.
///
/// The broker calls handlers one message at a time from its consumer task.
/// Long-running handlers should watch `cancel`.
#[async_trait]
pub trait MessageHandler<T>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
{
    async fn handle(&self, message: Arc<T>, cancel: CancellationToken) -> Result<(), HandlerError>;
}

/// Handles messages no typed handler is registered for.
#[async_trait]
pub trait FallbackHandler: Send + Sync + 'static {
    async fn handle(&self, envelope: Envelope, cancel: CancellationToken)
        -> Result<(), HandlerError>;
}

/// A [`MessageHandler`] backed by an async closure.
pub struct HandlerFn<F> {
    f: F,
}

/// Wraps `f` as a [`MessageHandler`].
pub fn handler_fn<T, F, Fut>(f: F) -> HandlerFn<F>
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<T, F, Fut> MessageHandler<T> for HandlerFn<F>
where
    T: Send + Sync + 'static,
    F: Fn(Arc<T>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, message: Arc<T>, cancel: CancellationToken) -> Result<(), HandlerError> {
        (self.f)(message, cancel).await
    }
}

/// A [`FallbackHandler`] backed by an async closure.
pub struct FallbackFn<F> {
    f: F,
}

/// Wraps `f` as a [`FallbackHandler`].
pub fn fallback_fn<F, Fut>(f: F) -> FallbackFn<F>
where
    F: Fn(Envelope, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    FallbackFn { f }
}

#[async_trait]
impl<F, Fut> FallbackHandler for FallbackFn<F>
where
    F: Fn(Envelope, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(
        &self,
        envelope: Envelope,
        cancel: CancellationToken,
    ) -> Result<(), HandlerError> {
        (self.f)(envelope, cancel).await
    }
}

/// How a broker maps message types to handlers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchStrategy {
    /// One handler per type, with an optional fallback for unhandled types.
    SingleHandler,
    /// Any number of handlers per type, all invoked, no fallback.
    MultiHandler,
}

pub(crate) type Invocation<'a> = BoxFuture<'a, Result<(), HandlerError>>;

pub(crate) trait ErasedHandler: Send + Sync {
    fn call<'a>(&'a self, envelope: &Envelope, cancel: &CancellationToken) -> Invocation<'a>;
}

struct Typed<T, H> {
    handler: H,
    _message: PhantomData<fn(T)>,
}

impl<T, H> ErasedHandler for Typed<T, H>
where
    T: Send + Sync + 'static,
    H: MessageHandler<T>,
{
    fn call<'a>(&'a self, envelope: &Envelope, cancel: &CancellationToken) -> Invocation<'a> {
        match envelope.clone().downcast::<T>() {
            Ok(message) => self.handler.handle(message, cancel.clone()),
            Err(envelope) => {
                let error = HandlerError::new(format!(
                    "handler for `{}` received `{}`",
                    std::any::type_name::<T>(),
                    envelope.type_name()
                ));
                Box::pin(async move { Err(error) })
            }
        }
    }
}

/// A registered handler owed one call for a message.
#[derive(Clone, Copy)]
pub(crate) enum Target<'a> {
    Typed(&'a dyn ErasedHandler),
    Fallback(&'a dyn FallbackHandler),
}

impl<'a> Target<'a> {
    /// Creates the handler's future. This runs handler code, so callers keep
    /// it inside the same panic boundary as the polling.
    pub(crate) fn call(self, envelope: &Envelope, cancel: &CancellationToken) -> Invocation<'a> {
        match self {
            Target::Typed(handler) => handler.call(envelope, cancel),
            Target::Fallback(handler) => handler.handle(envelope.clone(), cancel.clone()),
        }
    }
}

fn erase<T, H>(handler: H) -> Box<dyn ErasedHandler>
where
    T: Send + Sync + 'static,
    H: MessageHandler<T>,
{
    Box::new(Typed {
        handler,
        _message: PhantomData,
    })
}

/// Handlers by message type. Frozen once the broker is built.
pub(crate) enum HandlerTable {
    Single {
        handlers: HashMap<TypeId, Box<dyn ErasedHandler>>,
        fallback: Option<Box<dyn FallbackHandler>>,
    },
    Multi {
        handlers: HashMap<TypeId, Vec<Box<dyn ErasedHandler>>>,
    },
}

impl HandlerTable {
    pub(crate) fn new(strategy: DispatchStrategy) -> Self {
        match strategy {
            DispatchStrategy::SingleHandler => HandlerTable::Single {
                handlers: HashMap::new(),
                fallback: None,
            },
            DispatchStrategy::MultiHandler => HandlerTable::Multi {
                handlers: HashMap::new(),
            },
        }
    }

    pub(crate) fn strategy(&self) -> DispatchStrategy {
        match self {
            HandlerTable::Single { .. } => DispatchStrategy::SingleHandler,
            HandlerTable::Multi { .. } => DispatchStrategy::MultiHandler,
        }
    }

    /// Registers `handler` for `T`.
    ///
    /// A single-handler table refuses a second handler for the same type.
    pub(crate) fn subscribe<T, H>(&mut self, handler: H) -> bool
    where
        T: Send + Sync + 'static,
        H: MessageHandler<T>,
    {
        let key = TypeId::of::<T>();
        match self {
            HandlerTable::Single { handlers, .. } => {
                if handlers.contains_key(&key) {
                    return false;
                }
                handlers.insert(key, erase(handler));
                true
            }
            HandlerTable::Multi { handlers } => {
                handlers.entry(key).or_default().push(erase(handler));
                true
            }
        }
    }

    /// Removes every handler registered for `T`.
    pub(crate) fn unsubscribe<T: 'static>(&mut self) -> bool {
        let key = TypeId::of::<T>();
        match self {
            HandlerTable::Single { handlers, .. } => handlers.remove(&key).is_some(),
            HandlerTable::Multi { handlers } => handlers
                .remove(&key)
                .is_some_and(|removed| !removed.is_empty()),
        }
    }

    pub(crate) fn set_fallback(&mut self, handler: Box<dyn FallbackHandler>) -> bool {
        match self {
            HandlerTable::Single { fallback, .. } => {
                *fallback = Some(handler);
                true
            }
            HandlerTable::Multi { .. } => false,
        }
    }

    /// The handlers owed `envelope`, in registration order.
    pub(crate) fn targets(&self, envelope: &Envelope) -> Vec<Target<'_>> {
        let key = envelope.type_id();
        match self {
            HandlerTable::Single { handlers, fallback } => match handlers.get(&key) {
                Some(handler) => vec![Target::Typed(handler.as_ref())],
                None => match fallback {
                    Some(fallback) => vec![Target::Fallback(fallback.as_ref())],
                    None => Vec::new(),
                },
            },
            HandlerTable::Multi { handlers } => handlers
                .get(&key)
                .map(|registered| {
                    registered
                        .iter()
                        .map(|handler| Target::Typed(handler.as_ref()))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub(crate) fn handler_count<T: 'static>(&self) -> usize {
        let key = TypeId::of::<T>();
        match self {
            HandlerTable::Single { handlers, .. } => usize::from(handlers.contains_key(&key)),
            HandlerTable::Multi { handlers } => handlers.get(&key).map_or(0, Vec::len),
        }
    }
}
