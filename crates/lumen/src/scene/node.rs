//! # Nodes — Handles, Storage Slots, and Capabilities
//!
//! A [`NodeId`] is a generational handle into a [`Scene`](super::Scene). The
//! scene owns every [`Node`]; parents refer to children (and back) by id, so
//! there are no reference cycles and no shared ownership.
//!
//! ## Design: Generational Handles
//!
//! Destroyed slots are recycled. Pairing each index with a generation means a
//! handle kept past `destroy` is detected as stale instead of silently
//! aliasing whatever node reuses the slot:
//!
//! ```text
//! NodeId { index: 5, generation: 0 }  ← original
//! NodeId { index: 5, generation: 1 }  ← after destroy + reuse
//! ```
//!
//! ## Design: Capability Records
//!
//! Every node carries the same transform state. What makes a node "2D" or a
//! "camera" is an explicit [`NodeKind`] tag plus an optional capability record
//! ([`Spatial2d`], [`Camera`]) that traversals query. A 3D mesh or a 2D render
//! component is another optional record.

use std::fmt;

use crate::math::{Mat4, Transform, Vec3};
use crate::render::Mesh;
use crate::render2d::RenderComponent2d;

use super::camera::Camera;
use super::script::{Script, ScriptSlot};
use super::spatial2d::{Node2dOptions, Spatial2d};

/// A handle to a node in a [`Scene`](super::Scene).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Hands out [`NodeId`]s and recycles destroyed slots.
///
/// ```text
/// generations: [0, 1, 0, 2, 0]   ← one generation per slot ever allocated
/// free_list:   [1, 3]             ← slots available for reuse
/// ```
#[derive(Debug, Default)]
pub(crate) struct NodeAllocator {
    generations: Vec<u32>,
    free_list: Vec<u32>,
}

impl NodeAllocator {
    pub fn allocate(&mut self) -> NodeId {
        if let Some(index) = self.free_list.pop() {
            // Generation was bumped on deallocate.
            let generation = self.generations[index as usize];
            NodeId { index, generation }
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// Returns `false` if `id` was already stale.
    pub fn deallocate(&mut self, id: NodeId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.generations[id.index as usize] += 1;
        self.free_list.push(id.index);
        true
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.generations
            .get(id.index as usize)
            .is_some_and(|g| *g == id.generation)
    }

    pub fn live_count(&self) -> usize {
        self.generations.len() - self.free_list.len()
    }
}

/// The kind tag traversals and event routing dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The traversal root of a [`Scene`](super::Scene).
    Scene,
    /// A plain transform node.
    Node,
    /// A 2D node with a box, an anchor, and a z rotation. Hit-testable.
    Spatial2d,
    Camera,
}

/// A node's state. Owned by its [`Scene`](super::Scene); mutate it through
/// scene methods so world matrices stay in sync.
pub struct Node {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) transform: Transform,
    pub(crate) local: Mat4,
    pub(crate) world: Mat4,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) active: bool,
    pub(crate) spatial: Option<Spatial2d>,
    pub(crate) camera: Option<Camera>,
    pub(crate) mesh: Option<Mesh>,
    pub(crate) render: Option<RenderComponent2d>,
    pub(crate) scripts: Vec<ScriptSlot>,
}

impl Node {
    /// A plain transform node at the origin.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Node)
    }

    /// A 2D node. The anchor is clamped to `[0, 1]`.
    pub fn spatial2d(name: impl Into<String>, options: Node2dOptions) -> Self {
        let mut node = Self::with_kind(name, NodeKind::Spatial2d);
        node.transform = Transform::from_xy(options.x, options.y).with_rotation_z(options.rotation);
        node.spatial = Some(Spatial2d::new(
            options.width,
            options.height,
            options.anchor,
            options.rotation,
        ));
        node.refresh_local();
        node
    }

    pub fn camera(name: impl Into<String>, camera: Camera) -> Self {
        let mut node = Self::with_kind(name, NodeKind::Camera);
        node.camera = Some(camera);
        node
    }

    pub(crate) fn scene_root() -> Self {
        Self::with_kind("scene", NodeKind::Scene)
    }

    fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::IDENTITY,
            local: Mat4::IDENTITY,
            world: Mat4::IDENTITY,
            parent: None,
            children: Vec::new(),
            active: true,
            spatial: None,
            camera: None,
            mesh: None,
            render: None,
            scripts: Vec::new(),
        }
    }

    /// Replace the starting transform. For 2D nodes only the z rotation of
    /// `transform` is meaningful.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        if let Some(spatial) = &mut self.spatial {
            spatial.rotation = transform.rotation.to_euler(glam::EulerRot::XYZ).2;
        }
        self.refresh_local();
        self
    }

    /// Attach a 2D render component. Only drawn on [`NodeKind::Spatial2d`] nodes.
    pub fn with_render(mut self, render: RenderComponent2d) -> Self {
        self.render = Some(render);
        self
    }

    pub fn with_script(mut self, script: impl Script + 'static) -> Self {
        self.scripts.push(ScriptSlot::new(Box::new(script)));
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }

    pub fn local_matrix(&self) -> Mat4 {
        self.local
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// This node's own flag. See [`Scene::is_active`](super::Scene::is_active)
    /// for the inherited value.
    pub fn active(&self) -> bool {
        self.active
    }

    pub fn spatial(&self) -> Option<&Spatial2d> {
        self.spatial.as_ref()
    }

    pub fn camera_params(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    pub fn render_component(&self) -> Option<&RenderComponent2d> {
        self.render.as_ref()
    }

    pub fn is_spatial2d(&self) -> bool {
        self.kind == NodeKind::Spatial2d
    }

    pub(crate) fn refresh_local(&mut self) {
        self.local = self.transform.matrix();
    }
}
