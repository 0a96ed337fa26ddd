//! # Spatial-2D Nodes — Boxes, Anchors, and Hit Testing
//!
//! A 2D node owns a `width × height` box. The anchor is the normalized point
//! inside that box where the node's local origin sits:
//!
//! ```text
//!   (0,1) ┌─────────────┐ (1,1)
//!         │             │
//!         │      ●      │   anchor (0.5, 0.5): origin at the centre
//!         │             │
//!   (0,0) └─────────────┘ (1,0)
//! ```
//!
//! So the local box is `x ∈ [-w·ax, w·(1-ax)]`, `y ∈ [-h·ay, h·(1-ay)]`.
//! Rendering and hit testing both use this box, through the node's world
//! matrix.
//!
//! ## Hit Testing
//!
//! [`Scene::hit_test`] maps the world point into node space with the inverse
//! world matrix and checks it against the local box, bounds inclusive. For an
//! unrotated, unscaled node this is the same as testing the world-space box
//! around the node's world origin; for rotated nodes it follows the rotated
//! box instead of its bounding rectangle.
//!
//! ## Bubbling
//!
//! [`Scene::bubble_path`] lists the node, then each ancestor for as long as
//! the ancestors are 2D nodes. A plain transform node or the scene root ends
//! the chain.

use std::collections::HashMap;

use crate::error::SceneError;
use crate::math::{Rect, Vec2, Vec3};

use super::node::{Node, NodeId};
use super::Scene;

/// The box of a [`NodeKind::Spatial2d`](super::NodeKind::Spatial2d) node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spatial2d {
    pub(crate) anchor: Vec2,
    pub(crate) width: f32,
    pub(crate) height: f32,
    pub(crate) rotation: f32,
}

impl Spatial2d {
    pub(crate) fn new(width: f32, height: f32, anchor: Vec2, rotation: f32) -> Self {
        Self {
            anchor: clamp_anchor(anchor),
            width,
            height,
            rotation,
        }
    }

    pub fn anchor(&self) -> Vec2 {
        self.anchor
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Rotation about Z in radians.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Zero-size boxes are never drawn.
    pub fn has_area(&self) -> bool {
        self.width != 0.0 || self.height != 0.0
    }

    /// The box in node space, offset by the anchor.
    pub fn local_rect(&self) -> Rect {
        Rect::new(
            -self.width * self.anchor.x,
            -self.height * self.anchor.y,
            self.width,
            self.height,
        )
    }

    /// Corners in node space, ordered left-bottom, right-bottom, left-top,
    /// right-top.
    pub fn local_corners(&self) -> [Vec2; 4] {
        let r = self.local_rect();
        let (min, max) = (r.min(), r.max());
        [
            min,
            Vec2::new(max.x, min.y),
            Vec2::new(min.x, max.y),
            max,
        ]
    }
}

fn clamp_anchor(anchor: Vec2) -> Vec2 {
    anchor.clamp(Vec2::ZERO, Vec2::ONE)
}

/// Construction parameters for a 2D node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node2dOptions {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Clamped to `[0, 1]` on each axis.
    pub anchor: Vec2,
    pub rotation: f32,
}

impl Node2dOptions {
    pub fn sized(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_anchor(mut self, x: f32, y: f32) -> Self {
        self.anchor = Vec2::new(x, y);
        self
    }
}

impl Default for Node2dOptions {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            anchor: Vec2::splat(0.5),
            rotation: 0.0,
        }
    }
}

/// A declarative description of a 2D subtree, for [`Scene::create_hierarchy`].
#[derive(Debug, Clone, Default)]
pub struct NodeDesc {
    pub name: String,
    pub options: Node2dOptions,
    /// Record the created node under this key in [`HierarchyRefs`].
    pub reference: Option<String>,
    pub children: Vec<NodeDesc>,
}

impl NodeDesc {
    pub fn new(name: impl Into<String>, options: Node2dOptions) -> Self {
        Self {
            name: name.into(),
            options,
            reference: None,
            children: Vec::new(),
        }
    }

    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeDesc>) -> Self {
        self.children.extend(children);
        self
    }
}

/// Nodes created by [`Scene::create_hierarchy`].
#[derive(Debug, Clone, Default)]
pub struct HierarchyRefs {
    /// Top-level nodes, in description order.
    pub roots: Vec<NodeId>,
    /// Nodes whose description carried a `reference`.
    pub refs: HashMap<String, NodeId>,
}

impl HierarchyRefs {
    pub fn get(&self, reference: &str) -> Option<NodeId> {
        self.refs.get(reference).copied()
    }
}

impl Scene {
    fn spatial_mut(&mut self, id: NodeId) -> Result<&mut Spatial2d, SceneError> {
        let node = self.node_mut(id).ok_or(SceneError::StaleNode(id))?;
        node.spatial.as_mut().ok_or(SceneError::WrongKind {
            node: id,
            expected: "2D",
        })
    }

    pub fn set_size(&mut self, id: NodeId, width: f32, height: f32) -> Result<(), SceneError> {
        let spatial = self.spatial_mut(id)?;
        spatial.width = width;
        spatial.height = height;
        Ok(())
    }

    /// Set the anchor; each axis is clamped to `[0, 1]`.
    pub fn set_anchor(&mut self, id: NodeId, anchor: Vec2) -> Result<(), SceneError> {
        self.spatial_mut(id)?.anchor = clamp_anchor(anchor);
        Ok(())
    }

    /// The node's box in node space.
    pub fn rect(&self, id: NodeId) -> Option<Rect> {
        self.node(id)?.spatial.map(|s| s.local_rect())
    }

    /// The axis-aligned world-space bounds of the node's box.
    pub fn world_rect(&self, id: NodeId) -> Option<Rect> {
        let node = self.node(id)?;
        let spatial = node.spatial?;
        let corners = spatial
            .local_corners()
            .map(|c| node.world.transform_point3(c.extend(0.0)).truncate());
        Some(Rect::bounding(&corners))
    }

    /// Whether `world_point` falls inside the node's box, bounds inclusive.
    /// Always `false` for stale or non-2D nodes.
    pub fn hit_test(&self, id: NodeId, world_point: Vec2) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let Some(spatial) = node.spatial else {
            return false;
        };
        let local = node
            .world
            .inverse()
            .transform_point3(Vec3::new(world_point.x, world_point.y, 0.0));
        spatial.local_rect().contains(local.truncate())
    }

    /// The node followed by its 2D ancestors, nearest first.
    pub fn bubble_path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = self.node(id).filter(|n| n.is_spatial2d()).map(|_| id);
        while let Some(id) = current {
            path.push(id);
            current = self
                .node(id)
                .and_then(|n| n.parent)
                .filter(|p| self.node(*p).is_some_and(Node::is_spatial2d));
        }
        path
    }

    /// Build 2D nodes from `descs` and attach them under `parent`.
    pub fn create_hierarchy(
        &mut self,
        parent: NodeId,
        descs: &[NodeDesc],
    ) -> Result<HierarchyRefs, SceneError> {
        let mut refs = HierarchyRefs::default();
        for desc in descs {
            let id = self.build_desc(parent, desc, &mut refs)?;
            refs.roots.push(id);
        }
        Ok(refs)
    }

    fn build_desc(
        &mut self,
        parent: NodeId,
        desc: &NodeDesc,
        refs: &mut HierarchyRefs,
    ) -> Result<NodeId, SceneError> {
        let id = self.spawn_child(parent, Node::spatial2d(desc.name.clone(), desc.options))?;
        if let Some(reference) = &desc.reference {
            refs.refs.insert(reference.clone(), id);
        }
        for child in &desc.children {
            self.build_desc(id, child, refs)?;
        }
        Ok(id)
    }
}
