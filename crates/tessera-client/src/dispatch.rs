//! Fan-out of inbound events to handlers keyed by event kind.
//!
//! One table maps each [`EventKind`] to the handlers registered for it.
//! Every handler has the same signature: it receives the mutable context
//! `C` and the event. A failing handler is logged and skipped; the rest
//! still run.

use std::collections::HashMap;

use tessera_types::{EventKind, ServerEvent};
use tracing::{debug, warn};

use crate::error::HandlerError;

/// A registered event handler.
pub type Handler<C> = Box<dyn FnMut(&mut C, &ServerEvent) -> Result<(), HandlerError> + Send>;

/// Identifies one registration, for [`Dispatcher::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

/// Dispatch table.
pub struct Dispatcher<C> {
    handlers: HashMap<EventKind, Vec<(HandlerId, Handler<C>)>>,
    next_id: u64,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts: Vec<(EventKind, usize)> =
            self.handlers.iter().map(|(k, v)| (*k, v.len())).collect();
        counts.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("handlers", &counts)
            .finish()
    }
}

impl<C> Dispatcher<C> {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_id: 0,
        }
    }

    /// Register `handler` for every event of `kind`.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> HandlerId
    where
        F: FnMut(&mut C, &ServerEvent) -> Result<(), HandlerError> + Send + 'static,
    {
        self.next_id = self.next_id.wrapping_add(1);
        let id = HandlerId(self.next_id);
        self.handlers
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Remove one registration. Returns whether it existed.
    pub fn unsubscribe(&mut self, kind: EventKind, id: HandlerId) -> bool {
        let Some(handlers) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(registered, _)| *registered != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            self.handlers.remove(&kind);
        }
        removed
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every handler for its kind, in registration
    /// order. Returns how many handlers succeeded.
    pub fn dispatch(&mut self, ctx: &mut C, event: &ServerEvent) -> usize {
        let kind = event.kind();
        let Some(handlers) = self.handlers.get_mut(&kind) else {
            debug!(%kind, "no handlers for event");
            return 0;
        };
        let mut delivered: usize = 0;
        for (id, handler) in handlers.iter_mut() {
            match handler(ctx, event) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(e) => warn!(%kind, handler = id.0, error = %e, "event handler failed"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use tessera_types::EntityId;

    use super::*;
    use crate::error::StoreError;

    fn remove(id: &str) -> ServerEvent {
        ServerEvent::EntityRemove {
            id: EntityId::new(id),
        }
    }

    #[test]
    fn handlers_receive_their_kind_only() {
        let mut dispatcher: Dispatcher<Vec<String>> = Dispatcher::new();
        dispatcher.subscribe(EventKind::EntityRemove, |log, event| {
            if let ServerEvent::EntityRemove { id } = event {
                log.push(id.to_string());
            }
            Ok(())
        });
        let mut log = Vec::new();
        assert_eq!(dispatcher.dispatch(&mut log, &remove("a")), 1);
        assert_eq!(dispatcher.dispatch(&mut log, &ServerEvent::Pong), 0);
        assert_eq!(dispatcher.dispatch(&mut log, &remove("b")), 1);
        assert_eq!(log, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn failing_handler_does_not_block_others() {
        let mut dispatcher: Dispatcher<u32> = Dispatcher::new();
        dispatcher.subscribe(EventKind::EntityRemove, |_, _| {
            Err(StoreError::UnknownEntity(EntityId::new("x")).into())
        });
        dispatcher.subscribe(EventKind::EntityRemove, |count, _| {
            *count = count.saturating_add(1);
            Ok(())
        });
        let mut count = 0;
        assert_eq!(dispatcher.dispatch(&mut count, &remove("x")), 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn unsubscribe_removes_one_registration() {
        let mut dispatcher: Dispatcher<u32> = Dispatcher::new();
        let first = dispatcher.subscribe(EventKind::Pong, |n, _| {
            *n = n.saturating_add(1);
            Ok(())
        });
        let second = dispatcher.subscribe(EventKind::Pong, |n, _| {
            *n = n.saturating_add(10);
            Ok(())
        });
        assert_ne!(first, second);
        assert!(dispatcher.unsubscribe(EventKind::Pong, first));
        assert!(!dispatcher.unsubscribe(EventKind::Pong, first));
        assert!(!dispatcher.unsubscribe(EventKind::Connect, second));
        assert_eq!(dispatcher.handler_count(EventKind::Pong), 1);

        let mut n = 0;
        dispatcher.dispatch(&mut n, &ServerEvent::Pong);
        assert_eq!(n, 10);

        assert!(dispatcher.unsubscribe(EventKind::Pong, second));
        assert_eq!(dispatcher.handler_count(EventKind::Pong), 0);
    }
}
