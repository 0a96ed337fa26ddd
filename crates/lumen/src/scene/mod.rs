//! # Scene — The Node Arena and Its Traversals
//!
//! A [`Scene`] owns every node in one arena and keeps a root node (named
//! `"scene"`) as the traversal origin. Nodes are created detached with
//! [`Scene::spawn`] and become part of the drawn/hit-tested tree once attached
//! under the root, directly or through ancestors.
//!
//! ## Traversal Order
//!
//! All queries walk the live tree in pre-order, parent before children, first
//! child first. That order is the paint order for 2D (later nodes draw on top)
//! and decides which drawables end up adjacent in a batch. Nothing is cached:
//! each query reflects the graph at the moment it is called.
//!
//! ```text
//! scene
//! ├── background      → 1st
//! ├── panel           → 2nd
//! │   ├── icon        → 3rd
//! │   └── label       → 4th
//! └── cursor          → 5th   (drawn last, on top)
//! ```
//!
//! ## Comparison
//!
//! - **Godot**: `SceneTree` of heap nodes with parent pointers; similar
//!   pre-order draw order for `CanvasItem`s.
//! - **Bevy**: ECS entities with `Parent`/`Children` components, transforms
//!   propagated by a system once per frame. We propagate on every mutation.

mod camera;
mod hierarchy;
mod node;
mod script;
mod spatial2d;

pub use camera::{Camera, CameraView};
pub use node::{Node, NodeId, NodeKind};
pub use script::Script;
pub use spatial2d::{HierarchyRefs, Node2dOptions, NodeDesc, Spatial2d};

use crate::error::SceneError;

use node::NodeAllocator;

/// An arena of nodes plus the root they hang from.
pub struct Scene {
    allocator: NodeAllocator,
    slots: Vec<Option<Node>>,
    root: NodeId,
}

impl Scene {
    pub fn new() -> Self {
        let mut scene = Self {
            allocator: NodeAllocator::default(),
            slots: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        };
        scene.root = scene.spawn(Node::scene_root());
        scene
    }

    /// The traversal root.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Insert a detached node.
    pub fn spawn(&mut self, node: Node) -> NodeId {
        let id = self.allocator.allocate();
        let index = id.index as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        let mut node = node;
        node.parent = None;
        node.children.clear();
        node.world = node.local;
        self.slots[index] = Some(node);
        id
    }

    /// Insert a node and attach it under `parent`.
    pub fn spawn_child(&mut self, parent: NodeId, node: Node) -> Result<NodeId, SceneError> {
        if !self.contains(parent) {
            return Err(SceneError::StaleNode(parent));
        }
        let id = self.spawn(node);
        self.set_parent(id, parent)?;
        Ok(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.allocator.is_alive(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get(id.index as usize)?.as_ref()
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.slots.get_mut(id.index as usize)?.as_mut()
    }

    /// Number of live nodes, including the root.
    pub fn len(&self) -> usize {
        self.allocator.live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pre-order walk from `start`. Children of a node for which `descend`
    /// returns `false` are skipped, but the node itself is still visited.
    pub(crate) fn walk(
        &self,
        start: NodeId,
        mut descend: impl FnMut(&Node) -> bool,
        mut visit: impl FnMut(NodeId, &Node),
    ) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            visit(id, node);
            if descend(node) {
                stack.extend(node.children.iter().rev());
            }
        }
    }

    /// Every live node reachable from the root, in pre-order.
    pub fn traverse(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(self.root, |_| true, |id, _| out.push(id));
        out
    }

    /// Nodes with a 3D [`Mesh`](crate::render::Mesh), in pre-order.
    pub fn meshes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(self.root, |_| true, |id, node| {
            if node.mesh.is_some() {
                out.push(id);
            }
        });
        out
    }

    /// Active 2D nodes with a render component and a non-empty box, in
    /// pre-order. An inactive node hides its whole subtree.
    pub fn render_objects_2d(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(
            self.root,
            |node| node.active,
            |id, node| {
                if !node.active || node.render.is_none() {
                    return;
                }
                if node.spatial.is_some_and(|s| s.has_area()) {
                    out.push(id);
                }
            },
        );
        out
    }

    /// Camera nodes, in pre-order.
    pub fn cameras(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(self.root, |_| true, |id, node| {
            if node.kind == NodeKind::Camera {
                out.push(id);
            }
        });
        out
    }

    /// First node named `name` in pre-order.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.traverse()
            .into_iter()
            .find(|id| self.node(*id).is_some_and(|n| n.name == name))
    }

    /// Whether the node and all of its ancestors are active.
    pub fn is_active(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            match self.node(id) {
                Some(node) if node.active => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn set_active(&mut self, id: NodeId, active: bool) -> Result<(), SceneError> {
        let node = self
            .node_mut(id)
            .ok_or(SceneError::StaleNode(id))?;
        node.active = active;
        Ok(())
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), SceneError> {
        let node = self
            .node_mut(id)
            .ok_or(SceneError::StaleNode(id))?;
        node.name = name.into();
        Ok(())
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MaterialHandle;
    use crate::render2d::RenderComponent2d;

    fn sprite(name: &str, w: f32, h: f32) -> Node {
        Node::spatial2d(name, Node2dOptions::sized(w, h))
            .with_render(RenderComponent2d::quad(MaterialHandle::from_index(0)))
    }

    #[test]
    fn traversal_is_pre_order() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn_child(root, Node::new("a")).unwrap();
        let a1 = scene.spawn_child(a, Node::new("a1")).unwrap();
        let a2 = scene.spawn_child(a, Node::new("a2")).unwrap();
        let b = scene.spawn_child(root, Node::new("b")).unwrap();
        assert_eq!(scene.traverse(), vec![root, a, a1, a2, b]);
    }

    #[test]
    fn render_objects_skip_inactive_subtrees_and_empty_boxes() {
        let mut scene = Scene::new();
        let root = scene.root();
        let visible = scene.spawn_child(root, sprite("visible", 10.0, 10.0)).unwrap();
        let hidden = scene.spawn_child(root, sprite("hidden", 10.0, 10.0)).unwrap();
        let hidden_child = scene.spawn_child(hidden, sprite("hidden child", 10.0, 10.0)).unwrap();
        let _empty = scene.spawn_child(root, sprite("empty", 0.0, 0.0)).unwrap();
        let thin = scene.spawn_child(root, sprite("thin", 0.0, 5.0)).unwrap();
        let _bare = scene
            .spawn_child(root, Node::spatial2d("bare", Node2dOptions::sized(5.0, 5.0)))
            .unwrap();
        scene.set_active(hidden, false).unwrap();

        assert_eq!(scene.render_objects_2d(), vec![visible, thin]);
        assert!(!scene.is_active(hidden_child));
        assert!(scene.is_active(visible));
    }

    #[test]
    fn detached_nodes_are_not_traversed() {
        let mut scene = Scene::new();
        let root = scene.root();
        let loose = scene.spawn(sprite("loose", 10.0, 10.0));
        assert!(scene.render_objects_2d().is_empty());
        scene.set_parent(loose, root).unwrap();
        assert_eq!(scene.render_objects_2d(), vec![loose]);
    }

    #[test]
    fn cameras_and_find_by_name() {
        let mut scene = Scene::new();
        let root = scene.root();
        let holder = scene.spawn_child(root, Node::new("rig")).unwrap();
        let cam = scene
            .spawn_child(holder, Node::camera("main", Camera::default()))
            .unwrap();
        assert_eq!(scene.cameras(), vec![cam]);
        assert_eq!(scene.find_by_name("main"), Some(cam));
        assert_eq!(scene.find_by_name("missing"), None);
    }
}
