//! Perspective cameras for 3D meshes.
//!
//! A camera is a node like any other: it is placed by its transform, and the
//! view matrix is the inverse of its world matrix. Only the first camera in
//! traversal order is used by the renderer.

use crate::math::{Mat4, Vec3};

use super::node::{NodeId, NodeKind};
use super::Scene;

/// Perspective projection parameters. `fov` is the vertical field of view in
/// radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov,
            aspect,
            near,
            far,
        }
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 1000.0)
    }
}

/// The matrices a mesh needs from its camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub projection: Mat4,
    /// World → view; the inverse of the camera's world matrix.
    pub view: Mat4,
    pub position: Vec3,
}

impl Scene {
    /// Projection, view and world position of a camera node.
    pub fn camera_view(&self, id: NodeId) -> Option<CameraView> {
        let node = self.node(id)?;
        if node.kind != NodeKind::Camera {
            return None;
        }
        let camera = node.camera?;
        Some(CameraView {
            projection: camera.projection(),
            view: node.world.inverse(),
            position: node.world.transform_point3(Vec3::ZERO),
        })
    }

    /// Update the aspect ratio of every camera, after a resize.
    pub fn set_camera_aspect(&mut self, aspect: f32) {
        for id in self.cameras() {
            if let Some(camera) = self.node_mut(id).and_then(|n| n.camera.as_mut()) {
                camera.aspect = aspect;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Node;

    #[test]
    fn view_is_inverse_of_world() {
        let mut scene = Scene::new();
        let root = scene.root();
        let cam = scene.spawn_child(root, Node::camera("cam", Camera::default())).unwrap();
        scene.set_position(cam, Vec3::new(0.0, 2.0, 10.0)).unwrap();

        let view = scene.camera_view(cam).unwrap();
        assert!(view.position.abs_diff_eq(Vec3::new(0.0, 2.0, 10.0), 1e-5));
        let origin_in_view = view.view.transform_point3(Vec3::new(0.0, 2.0, 0.0));
        assert!(origin_in_view.abs_diff_eq(Vec3::new(0.0, 0.0, -10.0), 1e-5));
    }

    #[test]
    fn non_camera_has_no_view() {
        let mut scene = Scene::new();
        let root = scene.root();
        let plain = scene.spawn_child(root, Node::new("plain")).unwrap();
        assert!(scene.camera_view(plain).is_none());
    }

    #[test]
    fn aspect_update_reaches_all_cameras() {
        let mut scene = Scene::new();
        let root = scene.root();
        let cam = scene.spawn_child(root, Node::camera("cam", Camera::default())).unwrap();
        scene.set_camera_aspect(2.0);
        assert_eq!(scene.node(cam).unwrap().camera_params().unwrap().aspect, 2.0);
    }
}
