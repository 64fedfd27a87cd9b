//! Typed event signals.
//!
//! Each event kind gets its own [`Signal`], so handlers receive a concrete
//! payload type instead of looking events up by name. Subscribing returns a
//! [`SubscriptionId`] that is later handed back to `unsubscribe`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::connection::Connection;
use crate::irc::{self, Message};

/// Shared across all signals so an id can't remove another signal's handler.
static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A list of handlers for one event type.
///
/// `emit` holds a read lock while handlers run and `unsubscribe` takes the
/// write lock, so once `unsubscribe` returns the handler is not running and
/// never will again. Handlers must not subscribe or unsubscribe on the
/// signal that is calling them.
pub struct Signal<T> {
    name: &'static str,
    handlers: RwLock<Vec<(SubscriptionId, Handler<T>)>>,
}

impl<T> Signal<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Run `handler` after the handlers already registered.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed));
        let handler: Handler<T> = Arc::new(handler);
        self.handlers.write().push((id, handler));
        id
    }

    /// Run `handler` before every handler already registered.
    pub fn subscribe_first<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed));
        let handler: Handler<T> = Arc::new(handler);
        self.handlers.write().insert(0, (id, handler));
        id
    }

    /// Returns false if `id` wasn't subscribed here.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        before != handlers.len()
    }

    /// Call every handler in order. Returns how many ran.
    pub fn emit(&self, event: &T) -> usize {
        let handlers = self.handlers.read_recursive();
        for (_, handler) in handlers.iter() {
            handler(event);
        }
        tracing::trace!(signal = self.name, handlers = handlers.len(), "emitted");
        handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }
}

/// The server could not let us reach a nick or channel right now (437).
#[derive(Clone)]
pub struct TargetUnavailable {
    pub conn: Arc<dyn Connection>,
    /// Raw parameter string: `<me> <target> :<text>`.
    pub data: String,
}

/// A connection was torn down.
#[derive(Clone)]
pub struct Disconnected {
    pub conn: Arc<dyn Connection>,
}

/// The signals the rejoin subsystem listens to.
pub struct EventBus {
    pub target_unavailable: Signal<TargetUnavailable>,
    pub disconnected: Signal<Disconnected>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            target_unavailable: Signal::new("target unavailable"),
            disconnected: Signal::new("disconnected"),
        }
    }

    /// Route one parsed server message to the matching signal, if any.
    pub fn dispatch(&self, conn: &Arc<dyn Connection>, msg: &Message) {
        if msg.command == irc::ERR_UNAVAILRESOURCE {
            self.target_unavailable.emit(&TargetUnavailable {
                conn: Arc::clone(conn),
                data: msg.event_data(),
            });
        }
    }

    /// Parse a raw server line and dispatch it. Unparseable lines are dropped.
    pub fn dispatch_line(&self, conn: &Arc<dyn Connection>, line: &str) {
        match Message::parse(line) {
            Some(msg) => self.dispatch(conn, &msg),
            None => tracing::debug!(conn = conn.id(), line, "unparseable line"),
        }
    }

    pub fn disconnect(&self, conn: Arc<dyn Connection>) {
        self.disconnected.emit(&Disconnected { conn });
    }
}
