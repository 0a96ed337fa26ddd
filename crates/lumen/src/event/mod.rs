//! # Events — Pointer Input, Hit Testing, and Bubbling
//!
//! Raw pointer input enters through the [`EventManager`]. Each press, drag or
//! release becomes one immutable [`PointerEvent`] in world coordinates and
//! goes to two audiences:
//!
//! ```text
//!   device (x, y) ──► ViewMetrics ──► world (x, y)
//!                                        │
//!                       ┌────────────────┴──────────────────┐
//!                       ▼                                   ▼
//!                   EventBus                     registered Spatial-2D nodes
//!               (every listener,                 front to back, active only:
//!                once per input)                 hit test ──► bubble to parents
//! ```
//!
//! ## Bubbling
//!
//! A hit node runs all of its own handlers, then hands the event to its
//! parent, and so on up the chain of Spatial-2D ancestors. A handler that
//! returns [`Propagation::Stop`] ends the climb once its node's handlers are
//! done; ancestors never see the event.
//!
//! ## Gestures
//!
//! ```text
//!   Idle ──down──► Down{start} ──move──► Down{start} ──up──► Idle
//!                      (TouchStart)    (Touching, delta)   (TouchEnd, delta)
//! ```
//!
//! Moves and releases while idle are ignored.
//!
//! ## Comparison
//!
//! - **DOM**: capture + bubble phases, `stopPropagation()` mutates the event.
//!   We only bubble, and stopping is a return value, so a handler cannot
//!   affect an event value someone else kept.
//! - **Bevy picking**: `Pointer<E>` events bubble through the entity
//!   hierarchy with `propagate(false)` to stop. Closest in spirit.

mod bus;
mod manager;

pub use bus::EventBus;
pub use manager::{EventManager, NodeHandler, ViewMetrics};

use serde::{Deserialize, Serialize};

use crate::math::Vec2;
use crate::scene::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Pointer pressed.
    TouchStart,
    /// Pointer moved while pressed.
    Touching,
    /// Pointer released.
    TouchEnd,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::TouchStart, EventKind::Touching, EventKind::TouchEnd];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::TouchStart => "touch_start",
            EventKind::Touching => "touching",
            EventKind::TouchEnd => "touch_end",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// One pointer event. Handlers get their own copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: EventKind,
    /// World position of the pointer.
    pub position: Vec2,
    /// Where the gesture started.
    pub start_position: Vec2,
    /// `position - start_position`. Zero for [`EventKind::TouchStart`].
    pub delta: Vec2,
    /// The node that was hit. `None` for event-bus listeners.
    pub target: Option<NodeId>,
    /// The node whose handlers are running; differs from `target` while
    /// bubbling.
    pub current: Option<NodeId>,
}

impl PointerEvent {
    pub fn new(kind: EventKind, position: Vec2, start_position: Vec2) -> Self {
        Self {
            kind,
            position,
            start_position,
            delta: position - start_position,
            target: None,
            current: None,
        }
    }

    pub fn x(&self) -> f32 {
        self.position.x
    }

    pub fn y(&self) -> f32 {
        self.position.y
    }
}

/// Returned by node handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    #[default]
    Continue,
    /// Finish this node's handlers, then stop bubbling.
    Stop,
}

/// Handle for removing a listener or handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(EventKind::from_name("click"), None);
    }

    #[test]
    fn delta_is_relative_to_start() {
        let e = PointerEvent::new(EventKind::Touching, Vec2::new(15.0, 5.0), Vec2::new(10.0, 10.0));
        assert_eq!(e.delta, Vec2::new(5.0, -5.0));
        assert_eq!((e.x(), e.y()), (15.0, 5.0));
    }
}
