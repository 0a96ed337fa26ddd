//! Global pointer listeners, independent of hit testing.

use std::collections::HashMap;

use super::{EventKind, ListenerId, PointerEvent};

type Listener = Box<dyn FnMut(&PointerEvent)>;

/// Listeners notified once per pointer input of their kind, whether or not
/// any node was hit. Owned by the [`EventManager`](super::EventManager).
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: EventKind, listener: impl FnMut(&PointerEvent) + 'static) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        for list in self.listeners.values_mut() {
            if let Some(pos) = list.iter().position(|(l, _)| *l == id) {
                drop(list.remove(pos));
                return true;
            }
        }
        false
    }

    /// Drop every listener.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Call every listener for `event.kind` in registration order. Returns
    /// how many ran.
    pub fn emit(&mut self, event: &PointerEvent) -> usize {
        let Some(list) = self.listeners.get_mut(&event.kind) else {
            return 0;
        };
        for (_, listener) in list.iter_mut() {
            listener(event);
        }
        list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn on_emit_off() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        let log = seen.clone();
        let id = bus.on(EventKind::TouchStart, move |e| log.borrow_mut().push(e.position));
        bus.on(EventKind::TouchEnd, |_| {});

        let down = PointerEvent::new(EventKind::TouchStart, Vec2::ONE, Vec2::ONE);
        assert_eq!(bus.emit(&down), 1);
        assert_eq!(*seen.borrow(), vec![Vec2::ONE]);

        assert!(bus.off(id));
        assert!(!bus.off(id));
        assert_eq!(bus.emit(&down), 0);
        assert_eq!(bus.listener_count(EventKind::TouchEnd), 1);

        bus.clear();
        assert_eq!(bus.listener_count(EventKind::TouchEnd), 0);
    }

    #[test]
    fn off_releases_the_listener_captures() {
        let held = Rc::new(());
        let mut bus = EventBus::new();
        let captured = held.clone();
        let first = bus.on(EventKind::Touching, move |_| {
            let _ = &captured;
        });
        let second = bus.on(EventKind::Touching, |_| {});
        assert_eq!(Rc::strong_count(&held), 2);

        assert!(bus.off(first));
        assert_eq!(Rc::strong_count(&held), 1);
        assert_eq!(bus.listener_count(EventKind::Touching), 1);
        assert!(bus.off(second));
    }
}
