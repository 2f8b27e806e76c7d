use super::types::Event;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

type SyncHandler = dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync;
type AsyncHandler = dyn Fn(Event) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Stable identity of a [`Callback`], shared by all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(Uuid);

impl CallbackId {
    /// Fresh, unique identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallbackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone)]
enum Handler {
    Sync(Arc<SyncHandler>),
    Async(Arc<AsyncHandler>),
}

/// Outcome of invoking a callback on the caller's context.
pub(crate) enum Invocation {
    /// Sync handler ran to completion.
    Done(anyhow::Result<()>),
    /// Async handler produced work that still has to be driven.
    Deferred(BoxFuture<'static, anyhow::Result<()>>),
}

/// A subscriber registered on the [`EventBus`](super::EventBus).
///
/// Equality and hashing go through [`CallbackId`], so a clone of a callback
/// is the same subscriber: subscribing it twice to one topic is a no-op and
/// any clone can be used to unsubscribe.
#[derive(Clone)]
pub struct Callback {
    id: CallbackId,
    label: Arc<str>,
    handler: Handler,
}

impl Callback {
    /// Synchronous subscriber, run directly by whoever delivers the event.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            id: CallbackId::new(),
            label: Arc::from(std::any::type_name::<F>()),
            handler: Handler::Sync(Arc::new(handler)),
        }
    }

    /// Asynchronous subscriber. The returned future is driven by the bus's
    /// scheduler, never awaited on the publisher.
    pub fn new_async<F, Fut>(handler: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            id: CallbackId::new(),
            label: Arc::from(std::any::type_name::<F>()),
            handler: Handler::Async(Arc::new(move |event| handler(event).boxed())),
        }
    }

    /// Replace the human readable label used in log lines. Identity is kept.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Identity of this callback.
    #[must_use]
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// Label used in log lines.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether this callback was built with [`Callback::new_async`].
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self.handler, Handler::Async(_))
    }

    pub(crate) fn invoke(&self, event: &Event) -> Invocation {
        match &self.handler {
            Handler::Sync(handler) => Invocation::Done(handler(event)),
            Handler::Async(handler) => Invocation::Deferred(handler(event.clone())),
        }
    }

    /// Whole delivery as one unit of work, for the scheduler.
    pub(crate) fn deliver(self, event: Event) -> BoxFuture<'static, anyhow::Result<()>> {
        async move {
            match self.invoke(&event) {
                Invocation::Done(result) => result,
                Invocation::Deferred(work) => work.await,
            }
        }
        .boxed()
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Callback {}

impl Hash for Callback {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("async", &self.is_async())
            .finish()
    }
}
