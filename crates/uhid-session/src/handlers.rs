//! Per-event-kind handler registry.

use tracing::trace;
use uhid_protocol::{EventType, UhidEvent};

/// Callback invoked with each decoded inbound event of its registered kind.
pub type EventHandler = Box<dyn FnMut(&UhidEvent)>;

/// Identifier returned by registration, used to unregister one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u32);

impl HandlerId {
    pub fn get(self) -> u32 {
        self.0
    }
}

struct Registration {
    id: HandlerId,
    kind: EventType,
    handler: EventHandler,
}

/// Handlers are kept in registration order and dispatched in that order.
#[derive(Default)]
pub struct HandlerTable {
    next_id: u32,
    entries: Vec<Registration>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: EventType, handler: EventHandler) -> HandlerId {
        self.next_id = self.next_id.wrapping_add(1).max(1);
        let id = HandlerId(self.next_id);
        self.entries.push(Registration { id, kind, handler });
        id
    }

    pub fn unregister(&mut self, id: HandlerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calls every handler registered for the event's kind; returns how many ran.
    pub fn dispatch(&mut self, event: &UhidEvent) -> usize {
        let kind = event.event_type();
        let mut fired = 0;
        for entry in self.entries.iter_mut().filter(|entry| entry.kind == kind) {
            trace!(handler = entry.id.get(), event = %kind, "dispatching");
            (entry.handler)(event);
            fired += 1;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter(hits: &Rc<Cell<u32>>) -> EventHandler {
        let hits = Rc::clone(hits);
        Box::new(move |_| hits.set(hits.get() + 1))
    }

    #[test]
    fn test_dispatch_routes_by_kind() {
        let outputs = Rc::new(Cell::new(0));
        let features = Rc::new(Cell::new(0));
        let mut table = HandlerTable::new();
        table.register(EventType::Output, counter(&outputs));
        table.register(EventType::FEATURE, counter(&features));

        let fired = table.dispatch(&UhidEvent::zeroed(EventType::Output));

        assert_eq!(fired, 1);
        assert_eq!(outputs.get(), 1);
        assert_eq!(features.get(), 0);
    }

    #[test]
    fn test_unregister_removes_only_that_handler() {
        let hits = Rc::new(Cell::new(0));
        let mut table = HandlerTable::new();
        let first = table.register(EventType::Output, counter(&hits));
        table.register(EventType::Output, counter(&hits));

        assert!(table.unregister(first));
        assert!(!table.unregister(first));
        assert_eq!(table.dispatch(&UhidEvent::zeroed(EventType::Output)), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_ids_are_unique_and_nonzero() {
        let mut table = HandlerTable::new();
        let a = table.register(EventType::Start, Box::new(|_| {}));
        let b = table.register(EventType::Start, Box::new(|_| {}));
        assert_ne!(a, b);
        assert!(a.get() > 0);
        table.clear();
        assert!(table.is_empty());
    }
}
