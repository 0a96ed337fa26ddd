//! # Hierarchy — Attachment, Transform Propagation, and Destruction
//!
//! World matrices are kept current eagerly: every mutation that changes a
//! local matrix, or moves a node to a new parent, immediately recomputes the
//! world matrix of that node and its whole subtree, depth first.
//!
//! ```text
//! world(root)  = local(root)
//! world(child) = world(parent) * local(child)
//! ```
//!
//! Nothing is deferred, so any read between mutations (a render, a hit test,
//! a space conversion) sees settled matrices. The cost is `O(subtree)` per
//! mutation, fine for the shallow trees a 2D UI or small 3D scene builds.

use crate::error::SceneError;
use crate::math::{Mat4, Quat, Transform, Vec3};
use crate::render::{GraphicsDevice, Mesh};

use super::node::{NodeId, NodeKind};
use super::Scene;

impl Scene {
    /// Attach `child` under `parent` and recompute the subtree's world
    /// matrices.
    ///
    /// A node that already has a parent must be detached first with
    /// [`remove_from_parent`](Self::remove_from_parent). Attaching a node under
    /// itself or one of its descendants is rejected.
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) -> Result<(), SceneError> {
        let child_node = self.node(child).ok_or(SceneError::StaleNode(child))?;
        if !self.contains(parent) {
            return Err(SceneError::StaleNode(parent));
        }
        if child_node.parent.is_some() {
            log::warn!("rejected attach: node {child} already has a parent");
            return Err(SceneError::AlreadyAttached(child));
        }
        if child == parent || self.is_ancestor(child, parent) {
            log::warn!("rejected attach: {child} under {parent} would create a cycle");
            return Err(SceneError::WouldCreateCycle { child, parent });
        }

        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        self.update_world(child);
        Ok(())
    }

    /// Attach each node in `children` under `parent`, in order. Stops at the
    /// first failure; earlier attachments stay in place.
    pub fn add_children(&mut self, parent: NodeId, children: &[NodeId]) -> Result<(), SceneError> {
        for &child in children {
            self.set_parent(child, parent)?;
        }
        Ok(())
    }

    /// Detach `child` from its parent. Its world matrix becomes its local
    /// matrix. Detaching a root is a no-op.
    pub fn remove_from_parent(&mut self, child: NodeId) -> Result<(), SceneError> {
        let parent = self.node(child).ok_or(SceneError::StaleNode(child))?.parent;
        let Some(parent) = parent else {
            return Ok(());
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|c| *c != child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = None;
        }
        self.update_world(child);
        Ok(())
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.node(id).and_then(|n| n.parent);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.node(p).and_then(|n| n.parent);
        }
        false
    }

    // ── Transform setters ───────────────────────────────────────────────

    pub fn set_x(&mut self, id: NodeId, x: f32) -> Result<(), SceneError> {
        self.modify_transform(id, |t| t.translation.x = x)
    }

    pub fn set_y(&mut self, id: NodeId, y: f32) -> Result<(), SceneError> {
        self.modify_transform(id, |t| t.translation.y = y)
    }

    pub fn set_z(&mut self, id: NodeId, z: f32) -> Result<(), SceneError> {
        self.modify_transform(id, |t| t.translation.z = z)
    }

    pub fn set_position(&mut self, id: NodeId, position: Vec3) -> Result<(), SceneError> {
        self.modify_transform(id, |t| t.translation = position)
    }

    /// Translate by `delta` in the parent's space.
    pub fn translate(&mut self, id: NodeId, delta: Vec3) -> Result<(), SceneError> {
        self.modify_transform(id, |t| t.translation += delta)
    }

    /// Rotation about Z in radians. 2D nodes also record it on their box.
    pub fn set_rotation(&mut self, id: NodeId, radians: f32) -> Result<(), SceneError> {
        if let Some(spatial) = self.node_mut(id).and_then(|n| n.spatial.as_mut()) {
            spatial.rotation = radians;
        }
        self.modify_transform(id, |t| t.rotation = Quat::from_rotation_z(radians))
    }

    /// Replace the whole local transform. Not available on 2D nodes, whose
    /// rotation is about Z only.
    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> Result<(), SceneError> {
        let node = self.node(id).ok_or(SceneError::StaleNode(id))?;
        if node.kind == NodeKind::Spatial2d {
            return Err(SceneError::WrongKind {
                node: id,
                expected: "3D",
            });
        }
        self.modify_transform(id, |t| *t = transform)
    }

    fn modify_transform(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut Transform),
    ) -> Result<(), SceneError> {
        let node = self.node_mut(id).ok_or(SceneError::StaleNode(id))?;
        f(&mut node.transform);
        node.refresh_local();
        self.update_world(id);
        Ok(())
    }

    /// Recompute world matrices for `id` and its descendants, depth first.
    fn update_world(&mut self, id: NodeId) {
        let parent_world = self
            .node(id)
            .and_then(|n| n.parent)
            .and_then(|p| self.node(p))
            .map(|p| p.world);

        let mut stack: Vec<(NodeId, Option<Mat4>)> = vec![(id, parent_world)];
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.node_mut(id) else {
                continue;
            };
            node.world = match parent_world {
                Some(parent) => parent * node.local,
                None => node.local,
            };
            let world = node.world;
            stack.extend(node.children.iter().rev().map(|c| (*c, Some(world))));
        }
    }

    // ── Space conversion ────────────────────────────────────────────────

    /// Map a point from the node's space into world space.
    pub fn convert_to_world_space(&self, id: NodeId, local: Vec3) -> Result<Vec3, SceneError> {
        let node = self.node(id).ok_or(SceneError::StaleNode(id))?;
        Ok(node.world.transform_point3(local))
    }

    /// Map a world-space point into the node's space. The inverse is computed
    /// per call.
    pub fn convert_to_node_space(&self, id: NodeId, world: Vec3) -> Result<Vec3, SceneError> {
        let node = self.node(id).ok_or(SceneError::StaleNode(id))?;
        Ok(node.world.inverse().transform_point3(world))
    }

    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        self.node(id).map(|n| n.world)
    }

    // ── Drawables ───────────────────────────────────────────────────────

    /// Attach a 3D mesh, returning the one it replaces. The replaced mesh
    /// still owns its GPU buffers; release it with [`Mesh::destroy`].
    pub fn set_mesh(&mut self, id: NodeId, mesh: Mesh) -> Result<Option<Mesh>, SceneError> {
        let node = self.node_mut(id).ok_or(SceneError::StaleNode(id))?;
        if node.kind == NodeKind::Spatial2d {
            return Err(SceneError::WrongKind {
                node: id,
                expected: "3D",
            });
        }
        Ok(node.mesh.replace(mesh))
    }

    pub fn mesh_mut(&mut self, id: NodeId) -> Option<&mut Mesh> {
        self.node_mut(id)?.mesh.as_mut()
    }

    pub fn set_render_component(
        &mut self,
        id: NodeId,
        render: crate::render2d::RenderComponent2d,
    ) -> Result<(), SceneError> {
        let node = self.node_mut(id).ok_or(SceneError::StaleNode(id))?;
        if node.kind != NodeKind::Spatial2d {
            return Err(SceneError::WrongKind {
                node: id,
                expected: "2D",
            });
        }
        node.render = Some(render);
        Ok(())
    }

    pub fn render_component_mut(
        &mut self,
        id: NodeId,
    ) -> Option<&mut crate::render2d::RenderComponent2d> {
        self.node_mut(id)?.render.as_mut()
    }

    // ── Destruction ─────────────────────────────────────────────────────

    /// Destroy `id` and its subtree.
    ///
    /// Each node's mesh buffers are released, and each script's
    /// [`on_destroy`](super::Script::on_destroy) runs, before the slot is
    /// freed. Materials are shared and stay alive. Returns `false` (and does
    /// nothing) if `id` is already gone, so repeated calls are harmless.
    pub fn destroy(&mut self, id: NodeId, device: &mut dyn GraphicsDevice) -> bool {
        if !self.contains(id) {
            return false;
        }
        // Unlinking first keeps the parent's child list free of dead ids.
        let _ = self.remove_from_parent(id);

        let mut doomed = Vec::new();
        self.walk(id, |_| true, |id, _| doomed.push(id));

        for id in doomed {
            let Some(mut node) = self.slots.get_mut(id.index as usize).and_then(Option::take)
            else {
                continue;
            };
            if let Some(mesh) = node.mesh.as_mut() {
                mesh.destroy(device);
            }
            for slot in &mut node.scripts {
                slot.script.on_destroy(id);
            }
            self.allocator.deallocate(id);
            log::trace!("destroyed node {id} '{}'", node.name);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDevice;
    use crate::scene::{Node, Node2dOptions};

    fn translation(scene: &Scene, id: NodeId) -> Vec3 {
        scene.world_matrix(id).unwrap().w_axis.truncate()
    }

    #[test]
    fn child_follows_parent() {
        let mut scene = Scene::new();
        let root = scene.root();
        let parent = scene.spawn_child(root, Node::new("p")).unwrap();
        let child = scene.spawn_child(parent, Node::new("c")).unwrap();
        scene.set_x(child, 5.0).unwrap();
        scene.set_x(parent, 50.0).unwrap();
        assert!(translation(&scene, child).abs_diff_eq(Vec3::new(55.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn attaching_recomputes_subtree() {
        let mut scene = Scene::new();
        let a = scene.spawn(Node::new("a"));
        let b = scene.spawn(Node::new("b"));
        let c = scene.spawn(Node::new("c"));
        scene.set_position(a, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        scene.set_position(b, Vec3::new(2.0, 0.0, 0.0)).unwrap();
        scene.set_position(c, Vec3::new(3.0, 0.0, 0.0)).unwrap();
        scene.set_parent(c, b).unwrap();
        scene.set_parent(b, a).unwrap();
        assert!(translation(&scene, c).abs_diff_eq(Vec3::new(6.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn root_without_parent_still_moves_children() {
        let mut scene = Scene::new();
        let a = scene.spawn(Node::new("a"));
        let b = scene.spawn(Node::new("b"));
        scene.set_parent(b, a).unwrap();
        scene.set_y(a, 7.0).unwrap();
        assert!(translation(&scene, b).abs_diff_eq(Vec3::new(0.0, 7.0, 0.0), 1e-5));
    }

    #[test]
    fn rejects_double_attach_and_cycles() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn_child(root, Node::new("a")).unwrap();
        let b = scene.spawn_child(a, Node::new("b")).unwrap();
        assert_eq!(scene.set_parent(b, root), Err(SceneError::AlreadyAttached(b)));
        assert_eq!(
            scene.set_parent(a, a),
            Err(SceneError::AlreadyAttached(a)),
        );

        scene.remove_from_parent(a).unwrap();
        assert_eq!(
            scene.set_parent(a, b),
            Err(SceneError::WouldCreateCycle { child: a, parent: b })
        );
        assert_eq!(
            scene.set_parent(a, a),
            Err(SceneError::WouldCreateCycle { child: a, parent: a })
        );
    }

    #[test]
    fn remove_from_parent_resets_world() {
        let mut scene = Scene::new();
        let root = scene.root();
        let parent = scene.spawn_child(root, Node::new("p")).unwrap();
        scene.set_x(parent, 10.0).unwrap();
        let child = scene.spawn_child(parent, Node::new("c")).unwrap();
        scene.remove_from_parent(child).unwrap();
        assert!(scene.node(parent).unwrap().children().is_empty());
        assert_eq!(scene.world_matrix(child), Some(Mat4::IDENTITY));
    }

    /// Small deterministic generator so the property test needs no extra crate.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }

        fn below(&mut self, n: usize) -> usize {
            (self.next() % n as u64) as usize
        }

        fn unit(&mut self) -> f32 {
            (self.next() % 2001) as f32 / 1000.0 - 1.0
        }
    }

    fn assert_world_invariant(scene: &Scene, ids: &[NodeId]) {
        for &id in ids {
            let node = scene.node(id).unwrap();
            let expected = match node.parent() {
                Some(parent) => scene.world_matrix(parent).unwrap() * node.local_matrix(),
                None => node.local_matrix(),
            };
            assert!(
                node.world_matrix().abs_diff_eq(expected, 1e-3),
                "world matrix of {id} out of date"
            );
        }
    }

    #[test]
    fn world_matrix_invariant_survives_random_mutation() {
        let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
        let mut scene = Scene::new();
        let mut ids = vec![scene.root()];
        for i in 0..12 {
            ids.push(scene.spawn(Node::new(format!("n{i}"))));
        }

        for _ in 0..500 {
            let a = ids[rng.below(ids.len())];
            let b = ids[rng.below(ids.len())];
            match rng.below(4) {
                // Rejections (already attached, cycles) are fine; the
                // invariant must hold either way.
                0 => {
                    let _ = scene.set_parent(a, b);
                }
                1 => {
                    let _ = scene.remove_from_parent(a);
                }
                2 => scene
                    .translate(a, Vec3::new(rng.unit(), rng.unit(), rng.unit()) * 10.0)
                    .unwrap(),
                _ => scene.set_rotation(a, rng.unit() * std::f32::consts::PI).unwrap(),
            }
            assert_world_invariant(&scene, &ids);
        }
    }

    #[test]
    fn space_conversion_round_trip() {
        let mut scene = Scene::new();
        let root = scene.root();
        let parent = scene
            .spawn_child(root, Node::spatial2d("p", Node2dOptions::default().at(30.0, -4.0)))
            .unwrap();
        let child = scene
            .spawn_child(parent, Node::spatial2d("c", Node2dOptions::default().at(2.0, 9.0)))
            .unwrap();
        scene.set_rotation(child, 0.7).unwrap();
        let p = Vec3::new(12.5, -3.0, 0.0);
        let world = scene.convert_to_world_space(child, p).unwrap();
        let back = scene.convert_to_node_space(child, world).unwrap();
        assert!(back.abs_diff_eq(p, 1e-4));
    }

    #[test]
    fn set_mesh_rejects_2d_nodes() {
        let mut scene = Scene::new();
        let root = scene.root();
        let flat = scene
            .spawn_child(root, Node::spatial2d("flat", Node2dOptions::sized(1.0, 1.0)))
            .unwrap();
        let mesh = Mesh::new(crate::render::geometry::quad(1.0, 1.0), crate::render::MaterialHandle::from_index(0));
        assert!(matches!(
            scene.set_mesh(flat, mesh),
            Err(SceneError::WrongKind { .. })
        ));
    }

    #[test]
    fn destroy_is_recursive_and_idempotent() {
        let mut device = HeadlessDevice::new();
        let mut scene = Scene::new();
        let root = scene.root();
        let parent = scene.spawn_child(root, Node::new("p")).unwrap();
        let child = scene.spawn_child(parent, Node::new("c")).unwrap();
        assert_eq!(scene.len(), 3);

        assert!(scene.destroy(parent, &mut device));
        assert!(!scene.contains(parent));
        assert!(!scene.contains(child));
        assert!(scene.node(root).unwrap().children().is_empty());
        assert_eq!(scene.len(), 1);

        assert!(!scene.destroy(parent, &mut device));
        assert_eq!(scene.len(), 1);
    }
}
