use std::collections::HashMap;

use crate::config::HitPolicy;
use crate::error::SceneError;
use crate::math::{Size, Vec2};
use crate::scene::{NodeId, Scene};

use super::bus::EventBus;
use super::{EventKind, ListenerId, PointerEvent, Propagation};

/// A node-scoped event handler. Gets the scene so it can react by mutating
/// it.
pub type NodeHandler = Box<dyn FnMut(&mut Scene, &PointerEvent) -> Propagation>;

/// Maps device pointer positions to world positions.
///
/// `backing` is the surface size in pixels, `display` the size the surface
/// is shown at in the units pointer positions arrive in. Device Y grows
/// downward; world Y grows upward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewMetrics {
    pub backing: Size,
    pub display: Vec2,
}

impl ViewMetrics {
    pub fn new(backing: Size, display: Vec2) -> Self {
        Self { backing, display }
    }

    /// Display and backing sizes are the same.
    pub fn unscaled(size: Size) -> Self {
        Self::new(size, size.as_vec2())
    }

    pub fn to_world(&self, device: Vec2) -> Vec2 {
        let backing = self.backing.as_vec2();
        let display = if self.display.x > 0.0 && self.display.y > 0.0 {
            self.display
        } else {
            backing
        };
        Vec2::new(
            device.x / display.x * backing.x,
            (display.y - device.y) / display.y * backing.y,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Gesture {
    Idle,
    Down { start: Vec2 },
}

/// Routes pointer input to the event bus and to hit Spatial-2D nodes.
///
/// One per engine. Node handlers are registered here rather than on the
/// nodes, keyed by node and event kind; handlers of destroyed nodes are
/// dropped the next time their kind is dispatched.
pub struct EventManager {
    handlers: HashMap<(NodeId, EventKind), Vec<(ListenerId, NodeHandler)>>,
    /// Nodes with at least one handler, per kind, in registration order.
    registry: HashMap<EventKind, Vec<NodeId>>,
    bus: EventBus,
    metrics: ViewMetrics,
    policy: HitPolicy,
    gesture: Gesture,
    next_id: u64,
}

impl EventManager {
    pub fn new(metrics: ViewMetrics, policy: HitPolicy) -> Self {
        Self {
            handlers: HashMap::new(),
            registry: HashMap::new(),
            bus: EventBus::new(),
            metrics,
            policy,
            gesture: Gesture::Idle,
            next_id: 0,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn metrics(&self) -> ViewMetrics {
        self.metrics
    }

    pub fn set_metrics(&mut self, metrics: ViewMetrics) {
        self.metrics = metrics;
    }

    pub fn hit_policy(&self) -> HitPolicy {
        self.policy
    }

    pub fn set_hit_policy(&mut self, policy: HitPolicy) {
        self.policy = policy;
    }

    /// A press is in progress.
    pub fn is_pressed(&self) -> bool {
        matches!(self.gesture, Gesture::Down { .. })
    }

    /// Register `handler` for `kind` on `node`, which must be a live
    /// Spatial-2D node.
    pub fn on(
        &mut self,
        scene: &Scene,
        node: NodeId,
        kind: EventKind,
        handler: impl FnMut(&mut Scene, &PointerEvent) -> Propagation + 'static,
    ) -> Result<ListenerId, SceneError> {
        let Some(n) = scene.node(node) else {
            return Err(SceneError::StaleNode(node));
        };
        if !n.is_spatial2d() {
            return Err(SceneError::WrongKind {
                node,
                expected: "Spatial2d",
            });
        }
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.handlers
            .entry((node, kind))
            .or_default()
            .push((id, Box::new(handler)));
        let nodes = self.registry.entry(kind).or_default();
        if !nodes.contains(&node) {
            nodes.push(node);
        }
        Ok(id)
    }

    /// Remove one handler. The node leaves the registry for that kind when
    /// its last handler goes.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let Some((&key, list)) = self
            .handlers
            .iter_mut()
            .find(|(_, list)| list.iter().any(|(l, _)| *l == id))
        else {
            return false;
        };
        list.retain(|(l, _)| *l != id);
        if list.is_empty() {
            self.handlers.remove(&key);
            let (node, kind) = key;
            if let Some(nodes) = self.registry.get_mut(&kind) {
                nodes.retain(|n| *n != node);
            }
        }
        true
    }

    /// Remove every handler of `node`.
    pub fn remove_node(&mut self, node: NodeId) {
        self.handlers.retain(|(n, _), _| *n != node);
        for nodes in self.registry.values_mut() {
            nodes.retain(|n| *n != node);
        }
    }

    /// Drop every node handler; bus listeners stay. Used when the scene the
    /// handlers belong to is swapped out.
    pub fn clear_nodes(&mut self) {
        self.handlers.clear();
        self.registry.clear();
        self.gesture = Gesture::Idle;
    }

    /// Drop all handlers, bus listeners and gesture state.
    pub fn clear(&mut self) {
        self.handlers.clear();
        self.registry.clear();
        self.bus.clear();
        self.gesture = Gesture::Idle;
    }

    pub fn handler_count(&self, node: NodeId, kind: EventKind) -> usize {
        self.handlers.get(&(node, kind)).map_or(0, Vec::len)
    }

    // ── Raw input ───────────────────────────────────────────────────────

    /// Pointer pressed at `device`. Returns how many nodes were hit.
    pub fn pointer_down(&mut self, scene: &mut Scene, device: Vec2) -> usize {
        let position = self.metrics.to_world(device);
        self.gesture = Gesture::Down { start: position };
        self.dispatch(scene, PointerEvent::new(EventKind::TouchStart, position, position))
    }

    /// Pointer moved to `device`. Ignored unless pressed.
    pub fn pointer_move(&mut self, scene: &mut Scene, device: Vec2) -> usize {
        let Gesture::Down { start } = self.gesture else {
            return 0;
        };
        let position = self.metrics.to_world(device);
        self.dispatch(scene, PointerEvent::new(EventKind::Touching, position, start))
    }

    /// Pointer released at `device`. Ignored unless pressed.
    pub fn pointer_up(&mut self, scene: &mut Scene, device: Vec2) -> usize {
        let Gesture::Down { start } = self.gesture else {
            return 0;
        };
        let position = self.metrics.to_world(device);
        let hits = self.dispatch(scene, PointerEvent::new(EventKind::TouchEnd, position, start));
        self.gesture = Gesture::Idle;
        hits
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    /// Send `event` to the bus, then to the registered nodes it hits, front
    /// to back. Returns how many nodes were hit.
    pub fn dispatch(&mut self, scene: &mut Scene, event: PointerEvent) -> usize {
        self.bus.emit(&event);

        let candidates = self.candidates(scene, event.kind);
        let mut hits = 0;
        for node in candidates {
            if !scene.is_active(node) || !scene.hit_test(node, event.position) {
                continue;
            }
            hits += 1;
            log::trace!("{} hit node {node}", event.kind.name());
            self.propagate(scene, node, event);
            if self.policy == HitPolicy::FirstHit {
                break;
            }
        }
        hits
    }

    /// Registered nodes for `kind`, front-most first. Later in pre-order is
    /// drawn later, so it is in front.
    fn candidates(&mut self, scene: &Scene, kind: EventKind) -> Vec<NodeId> {
        let Some(nodes) = self.registry.get_mut(&kind) else {
            return Vec::new();
        };
        let before = nodes.len();
        nodes.retain(|n| scene.contains(*n));
        if nodes.len() != before {
            self.handlers
                .retain(|(n, k), _| *k != kind || scene.contains(*n));
        }
        if nodes.is_empty() {
            return Vec::new();
        }

        let order: HashMap<NodeId, usize> = scene
            .traverse()
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();
        let mut candidates: Vec<NodeId> = nodes
            .iter()
            .copied()
            .filter(|n| order.contains_key(n))
            .collect();
        candidates.sort_by_key(|n| std::cmp::Reverse(order[n]));
        candidates
    }

    /// Run handlers on `target`, then up its Spatial-2D ancestors until a
    /// handler stops the event.
    fn propagate(&mut self, scene: &mut Scene, target: NodeId, event: PointerEvent) {
        for node in scene.bubble_path(target) {
            if !scene.contains(node) {
                break;
            }
            let Some(list) = self.handlers.get_mut(&(node, event.kind)) else {
                continue;
            };
            let local = PointerEvent {
                target: Some(target),
                current: Some(node),
                ..event
            };
            let mut stop = false;
            for (_, handler) in list.iter_mut() {
                stop |= handler(scene, &local) == Propagation::Stop;
            }
            if stop {
                break;
            }
        }
    }
}
