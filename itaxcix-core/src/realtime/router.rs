//! Client-side dispatch of decoded push messages
//!
//! At most one handler per [`MessageKind`] is active. Subscribing replaces
//! whatever handler was there before, and dropping the returned
//! [`Subscription`] removes the handler only if it is still the active one.
//! Messages with no handler are discarded; nothing is buffered for late
//! subscribers.
//!
//! Handlers run on the pump task, in arrival order. A panicking handler is
//! not caught here and takes the pump down with it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;

use super::decoder::{MessageKind, RealtimeMessage};

/// Callback invoked for every message of one kind
pub type Handler = Arc<dyn Fn(&RealtimeMessage) + Send + Sync>;

#[derive(Default)]
struct RouterInner {
    handlers: HashMap<MessageKind, (u64, Handler)>,
    next_id: u64,
}

type Shared = Arc<Mutex<RouterInner>>;

fn lock(inner: &Mutex<RouterInner>) -> std::sync::MutexGuard<'_, RouterInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routes decoded messages to the handler registered by the active screen
#[derive(Clone, Default)]
pub struct DispatchRouter {
    inner: Shared,
}

impl std::fmt::Debug for DispatchRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<MessageKind> = lock(&self.inner).handlers.keys().copied().collect();
        f.debug_struct("DispatchRouter")
            .field("handlers", &kinds)
            .finish()
    }
}

impl DispatchRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any current handler
    #[must_use = "the handler is removed when the subscription is dropped"]
    pub fn subscribe<F>(&self, kind: MessageKind, handler: F) -> Subscription
    where
        F: Fn(&RealtimeMessage) + Send + Sync + 'static,
    {
        let mut inner = lock(&self.inner);
        inner.next_id += 1;
        let id = inner.next_id;
        if inner
            .handlers
            .insert(kind, (id, Arc::new(handler)))
            .is_some()
        {
            tracing::debug!("Replaced handler for {}", kind);
        }

        Subscription {
            router: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    pub fn has_handler(&self, kind: MessageKind) -> bool {
        lock(&self.inner).handlers.contains_key(&kind)
    }

    /// Invoke the handler for this message, if any. Returns whether one ran.
    pub fn dispatch(&self, message: &RealtimeMessage) -> bool {
        let kind = message.kind();
        // Clone the handler out so it may subscribe or unsubscribe re-entrantly
        let handler = lock(&self.inner)
            .handlers
            .get(&kind)
            .map(|(_, handler)| Arc::clone(handler));

        match handler {
            Some(handler) => {
                handler(message);
                true
            }
            None => {
                tracing::debug!("No handler for {}; message dropped", kind);
                false
            }
        }
    }

    /// Drain `rx` in arrival order until every sender is gone
    pub async fn pump(&self, mut rx: mpsc::UnboundedReceiver<RealtimeMessage>) {
        while let Some(message) = rx.recv().await {
            self.dispatch(&message);
        }
        tracing::debug!("Dispatch pump finished");
    }
}

/// Keeps a handler registered; dropping it unregisters the handler
#[derive(Debug)]
pub struct Subscription {
    router: Weak<Mutex<RouterInner>>,
    kind: MessageKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> MessageKind {
        self.kind
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.router.upgrade() else {
            return;
        };
        let mut inner = lock(&inner);
        // A newer subscriber may have replaced us already
        if matches!(inner.handlers.get(&self.kind), Some((id, _)) if *id == self.id) {
            inner.handlers.remove(&self.kind);
        }
    }
}
