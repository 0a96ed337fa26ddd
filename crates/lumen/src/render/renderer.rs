//! # Renderer — One Frame, Start to Finish
//!
//! [`Renderer::render`] draws a [`Scene`] in a fixed order:
//!
//! ```text
//!   begin_frame
//!   clear(clear_color)
//!   meshes      each scene mesh, drawn against the first camera
//!   2D          every drawable Spatial-2D node, pre-order, through the batcher
//!   flush       the trailing batch
//!   end_frame
//! ```
//!
//! The renderer owns the [`GraphicsDevice`], the [`MaterialStore`], the
//! [`TextureStore`] and the [`BatchRenderer`]. Scenes only hold handles into
//! them, so a scene can be swapped without touching GPU resources.
//!
//! ## Failure Handling
//!
//! A frame that fails part-way (a batch overflow under the `error` policy, a
//! lost surface) still ends: the pending batch is discarded and
//! `end_frame` runs before the error is returned. The caller decides whether
//! the error is fatal with [`RenderError::is_fatal`].

use std::path::Path;

use crate::config::EngineConfig;
use crate::error::{GraphicsError, RenderError, TextureError};
use crate::math::{Color, Size};
use crate::render2d::{BatchRenderer, Drawable2d, Quad2d};
use crate::scene::Scene;

use super::device::{GraphicsDevice, TextureId};
use super::material::{Material, MaterialHandle, MaterialStore};
use super::texture::{TextureInfo, TextureStore};

/// What the last frame cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Total draw calls: one per pass per mesh, one per pass per 2D batch.
    pub draw_calls: usize,
    pub meshes: usize,
    /// 2D batches flushed.
    pub batches: usize,
    /// 2D vertices and indices submitted.
    pub vertices: usize,
    pub indices: usize,
    pub overflow_flushes: usize,
}

pub struct Renderer<D: GraphicsDevice> {
    device: D,
    materials: MaterialStore,
    textures: TextureStore,
    batch: BatchRenderer,
    clear_color: Color,
    view_size: Size,
    stats: RenderStats,
}

impl<D: GraphicsDevice> Renderer<D> {
    /// Allocate the batch buffers and the fallback texture. Failure is fatal.
    pub fn new(mut device: D, config: &EngineConfig) -> Result<Self, GraphicsError> {
        let textures = TextureStore::new(&mut device)?;
        let batch = BatchRenderer::new(&mut device, config.batch, config.designed_size)?;
        device.set_viewport(config.view_size);
        Ok(Self {
            device,
            materials: MaterialStore::new(),
            textures,
            batch,
            clear_color: config.clear_color,
            view_size: config.view_size,
            stats: RenderStats::default(),
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn materials(&self) -> &MaterialStore {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut MaterialStore {
        &mut self.materials
    }

    pub fn add_material(&mut self, material: Material) -> MaterialHandle {
        self.materials.add(material)
    }

    /// Delete a material's programs and free its handle.
    pub fn remove_material(&mut self, handle: MaterialHandle) -> bool {
        self.materials.remove(handle, &mut self.device)
    }

    pub fn textures(&self) -> &TextureStore {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut TextureStore {
        &mut self.textures
    }

    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Result<TextureInfo, TextureError> {
        self.textures.load(&mut self.device, path)
    }

    pub fn white_texture(&self) -> TextureId {
        self.textures.white()
    }

    pub fn batch(&self) -> &BatchRenderer {
        &self.batch
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    pub fn view_size(&self) -> Size {
        self.view_size
    }

    /// Resize the viewport. The 2D projection keeps the designed size.
    pub fn set_view_size(&mut self, size: Size) {
        self.view_size = size;
        self.device.set_viewport(size);
    }

    pub fn set_designed_size(&mut self, size: Size) {
        self.batch.set_designed_size(size);
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Draw one frame of `scene`.
    pub fn render(&mut self, scene: &mut Scene) -> Result<RenderStats, RenderError> {
        self.device.begin_frame()?;
        self.device.clear(self.clear_color);
        self.batch.reset_stats();
        self.stats = RenderStats::default();

        let drawn = self.draw_scene(scene);
        if drawn.is_err() {
            self.batch.discard();
        }
        let ended = self.device.end_frame();

        let batch = self.batch.stats();
        self.stats.draw_calls += batch.draw_calls;
        self.stats.batches = batch.batches;
        self.stats.vertices = batch.vertices;
        self.stats.indices = batch.indices;
        self.stats.overflow_flushes = batch.overflow_flushes;

        drawn?;
        ended?;
        Ok(self.stats)
    }

    fn draw_scene(&mut self, scene: &mut Scene) -> Result<(), RenderError> {
        self.draw_meshes(scene)?;

        for id in scene.render_objects_2d() {
            let Some(node) = scene.node(id) else { continue };
            let (Some(spatial), Some(render)) = (node.spatial(), node.render_component()) else {
                continue;
            };
            let drawable = Drawable2d {
                material: render.material(),
                assembler: render.assembler(),
                quad: Quad2d {
                    world: node.world_matrix(),
                    width: spatial.width(),
                    height: spatial.height(),
                    anchor: spatial.anchor(),
                },
            };
            self.batch.render(&mut self.device, &mut self.materials, &drawable)?;
        }
        self.batch.flush(&mut self.device, &mut self.materials)
    }

    fn draw_meshes(&mut self, scene: &mut Scene) -> Result<(), RenderError> {
        let meshes = scene.meshes();
        if meshes.is_empty() {
            return Ok(());
        }
        let Some(camera) = scene
            .cameras()
            .first()
            .and_then(|id| scene.camera_view(*id))
        else {
            log::warn!("{} meshes but no camera; skipping 3D", meshes.len());
            return Ok(());
        };

        for id in meshes {
            let Some(world) = scene.world_matrix(id) else { continue };
            let Some(mesh) = scene.mesh_mut(id) else { continue };
            let Some(material) = self.materials.get_mut(mesh.material()) else {
                log::warn!("mesh on node {id} uses unknown material {}", mesh.material().index());
                continue;
            };
            mesh.render(&mut self.device, material, &camera, world)?;
            self.stats.meshes += 1;
            self.stats.draw_calls += material.effect().pass_count();
        }
        Ok(())
    }

    /// Delete every material, texture and batch buffer this renderer owns.
    pub fn destroy(&mut self) {
        self.materials.destroy_all(&mut self.device);
        self.textures.destroy(&mut self.device);
        self.batch.destroy(&mut self.device);
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Transform;
    use crate::render::geometry::cube;
    use crate::render::headless::Command;
    use crate::render::{builtin, HeadlessDevice, Mesh};
    use crate::render2d::RenderComponent2d;
    use crate::scene::{Camera, Node, Node2dOptions};

    fn renderer() -> Renderer<HeadlessDevice> {
        Renderer::new(HeadlessDevice::new(), &EngineConfig::default()).unwrap()
    }

    #[test]
    fn frame_order_is_clear_meshes_then_2d() {
        let mut r = renderer();
        let phong = r.add_material(builtin::phong_default());
        let flat = r.add_material(builtin::solid_color(Color::WHITE));

        let mut scene = Scene::new();
        let root = scene.root();
        let camera = Node::camera("camera", Camera::default())
            .with_transform(Transform::from_xyz(0.0, 0.0, 5.0));
        scene.spawn_child(root, camera).unwrap();
        let cube_node = scene.spawn_child(root, Node::new("cube")).unwrap();
        scene.set_mesh(cube_node, Mesh::new(cube(1.0), phong)).unwrap();
        let quad = Node::spatial2d("quad", Node2dOptions::sized(10.0, 10.0))
            .with_render(RenderComponent2d::quad(flat));
        scene.spawn_child(root, quad).unwrap();

        r.device_mut().clear_log();
        let stats = r.render(&mut scene).unwrap();
        assert_eq!(stats.meshes, 1);
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.draw_calls, 2);

        let cmds = r.device().commands();
        assert_eq!(cmds.first(), Some(&Command::BeginFrame));
        assert!(matches!(cmds[1], Command::Clear(_)));
        assert_eq!(cmds.last(), Some(&Command::EndFrame));
        let draws = r.device().draws();
        assert_eq!(draws[0].index_count, 36);
        assert_eq!(draws[1].index_count, 6);
        assert!(draws[0].state.depth.test && !draws[1].state.depth.test);
    }

    #[test]
    fn meshes_without_camera_are_skipped() {
        let mut r = renderer();
        let phong = r.add_material(builtin::phong_default());
        let mut scene = Scene::new();
        let id = scene.spawn_child(scene.root(), Node::new("cube")).unwrap();
        scene.set_mesh(id, Mesh::new(cube(1.0), phong)).unwrap();

        let stats = r.render(&mut scene).unwrap();
        assert_eq!(stats.meshes, 0);
        assert_eq!(r.device().draw_count(), 0);
        assert_eq!(r.device().frames(), 1);
    }

    #[test]
    fn inactive_and_empty_2d_nodes_are_not_drawn() {
        let mut r = renderer();
        let flat = r.add_material(builtin::solid_color(Color::WHITE));
        let mut scene = Scene::new();
        let root = scene.root();
        let hidden = scene
            .spawn_child(root, Node::spatial2d("hidden", Node2dOptions::sized(5.0, 5.0)).with_active(false))
            .unwrap();
        scene
            .spawn_child(
                hidden,
                Node::spatial2d("child", Node2dOptions::sized(5.0, 5.0))
                    .with_render(RenderComponent2d::quad(flat)),
            )
            .unwrap();
        scene
            .spawn_child(
                root,
                Node::spatial2d("empty", Node2dOptions::sized(0.0, 0.0))
                    .with_render(RenderComponent2d::quad(flat)),
            )
            .unwrap();

        let stats = r.render(&mut scene).unwrap();
        assert_eq!(stats.batches, 0);
        assert_eq!(r.device().draw_count(), 0);
    }

    #[test]
    fn quad_vertices_land_in_world_space() {
        let mut r = renderer();
        let flat = r.add_material(builtin::solid_color(Color::WHITE));
        let mut scene = Scene::new();
        let parent = scene
            .spawn_child(scene.root(), Node::spatial2d("parent", Node2dOptions::sized(0.0, 0.0).at(100.0, 50.0)))
            .unwrap();
        scene
            .spawn_child(
                parent,
                Node::spatial2d("child", Node2dOptions::sized(20.0, 10.0).at(10.0, 0.0))
                    .with_render(RenderComponent2d::quad(flat)),
            )
            .unwrap();

        r.render(&mut scene).unwrap();
        let position_buffer = r.device().draws()[0].attributes[0].1;
        let data = r.device().buffer_f32(position_buffer);
        // lb corner of a centered 20x10 box at (110, 50)
        assert_eq!(&data[0..3], &[100.0, 45.0, 0.0]);
        assert_eq!(&data[9..12], &[120.0, 55.0, 0.0]);
    }

    #[test]
    fn overflow_error_still_ends_the_frame() {
        let config = EngineConfig {
            batch: crate::config::BatchConfig {
                overflow: crate::config::OverflowPolicy::Error,
                ..crate::config::BatchConfig::for_quads(1)
            },
            ..EngineConfig::default()
        };
        let mut r = Renderer::new(HeadlessDevice::new(), &config).unwrap();
        let flat = r.add_material(builtin::solid_color(Color::WHITE));
        let mut scene = Scene::new();
        for name in ["a", "b"] {
            scene
                .spawn_child(
                    scene.root(),
                    Node::spatial2d(name, Node2dOptions::sized(1.0, 1.0))
                        .with_render(RenderComponent2d::quad(flat)),
                )
                .unwrap();
        }
        let err = r.render(&mut scene).unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(r.device().frames(), 1);
        assert_eq!(r.batch().pending_indices(), 0);
    }

    #[test]
    fn view_size_sets_viewport() {
        let mut r = renderer();
        r.set_view_size(Size::new(640, 480));
        assert_eq!(r.device().commands().last(), Some(&Command::SetViewport(Size::new(640, 480))));
    }

    #[test]
    fn destroy_releases_everything() {
        let mut r = renderer();
        let mut m = builtin::solid_color(Color::WHITE);
        m.compile(r.device_mut()).unwrap();
        r.add_material(m);
        r.destroy();
        let device = r.into_device();
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_programs(), 0);
        assert_eq!(device.live_textures(), 0);
    }
}
