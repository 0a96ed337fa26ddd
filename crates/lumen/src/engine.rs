//! # Engine — Scene, Renderer, Events, and the Frame Loop
//!
//! The [`Engine`] owns everything one running view needs: the active
//! [`Scene`], the [`Renderer`] (and through it the graphics device), the
//! [`EventManager`] and the frame [`Time`]. Nothing is global; two engines
//! can live side by side, which is how the tests run.
//!
//! ## One Frame
//!
//! ```text
//!   frame(dt) / tick()
//!     1. advance Time
//!     2. Scene::run_scripts(dt)        init once, then update, pre-order
//!     3. Renderer::render(scene)       clear → meshes → 2D batches → flush
//! ```
//!
//! The host (the winit runner, a test, a custom loop) decides when frames
//! happen; [`stop`](Engine::stop) makes further frames no-ops until
//! [`run`](Engine::run) is called again.
//!
//! ## Errors
//!
//! Construction fails with a [`GraphicsError`] if the batch buffers or the
//! fallback texture cannot be created. During frames, non-fatal
//! [`RenderError`]s (surface hiccups, batch overflow under the `error`
//! policy) are logged and the frame is skipped; fatal ones stop the engine
//! and are returned.

use std::path::Path;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::{GraphicsError, RenderError, SceneError, TextureError};
use crate::event::{EventKind, EventManager, ListenerId, PointerEvent, Propagation, ViewMetrics};
use crate::math::{Size, Vec2};
use crate::render::{
    GraphicsDevice, HeadlessDevice, Material, MaterialHandle, RenderStats, Renderer, TextureInfo,
};
use crate::scene::{NodeId, Scene};
use crate::time::Time;

pub struct Engine<D: GraphicsDevice> {
    config: EngineConfig,
    scene: Scene,
    renderer: Renderer<D>,
    events: EventManager,
    time: Time,
    running: bool,
}

impl Engine<HeadlessDevice> {
    /// An engine that draws into a recording device.
    pub fn headless(config: EngineConfig) -> Result<Self, GraphicsError> {
        Self::new(HeadlessDevice::new(), config)
    }
}

impl<D: GraphicsDevice> Engine<D> {
    pub fn new(device: D, config: EngineConfig) -> Result<Self, GraphicsError> {
        let renderer = Renderer::new(device, &config)?;
        let events = EventManager::new(ViewMetrics::unscaled(config.view_size), config.hit_policy);
        log::info!(
            "engine '{}' ready: view {}x{}, designed {}x{}",
            config.title,
            config.view_size.width,
            config.view_size.height,
            config.designed_size.width,
            config.designed_size.height
        );
        Ok(Self {
            config,
            scene: Scene::new(),
            renderer,
            events,
            time: Time::new(),
            running: false,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn renderer(&self) -> &Renderer<D> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<D> {
        &mut self.renderer
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventManager {
        &mut self.events
    }

    pub fn time(&self) -> &Time {
        &self.time
    }

    // ── Scenes ──────────────────────────────────────────────────────────

    /// Replace the active scene with an empty one. The old scene's meshes
    /// are released.
    pub fn create_scene(&mut self) -> &mut Scene {
        let old = self.set_scene(Scene::new());
        self.release_scene(old);
        &mut self.scene
    }

    /// Swap in `scene` and return the previous one, resources intact. Node
    /// event handlers belong to the old scene and are dropped; event-bus
    /// listeners stay.
    pub fn set_scene(&mut self, scene: Scene) -> Scene {
        log::info!("scene swapped ({} nodes)", scene.len());
        self.events.clear_nodes();
        let old = std::mem::replace(&mut self.scene, scene);
        let (w, h) = (self.config.view_size.width, self.config.view_size.height);
        if h > 0 {
            self.scene.set_camera_aspect(w as f32 / h as f32);
        }
        old
    }

    /// Destroy every node of a scene that is no longer active, releasing
    /// its GPU buffers.
    pub fn release_scene(&mut self, mut scene: Scene) {
        let root = scene.root();
        scene.destroy(root, self.renderer.device_mut());
    }

    /// Destroy `node` and its subtree in the active scene.
    pub fn destroy_node(&mut self, node: NodeId) -> bool {
        let destroyed = self.scene.destroy(node, self.renderer.device_mut());
        if destroyed {
            self.events.remove_node(node);
        }
        destroyed
    }

    // ── Resources ───────────────────────────────────────────────────────

    pub fn add_material(&mut self, material: Material) -> MaterialHandle {
        self.renderer.add_material(material)
    }

    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Result<TextureInfo, TextureError> {
        self.renderer.load_texture(path)
    }

    // ── View ────────────────────────────────────────────────────────────

    /// Resize the backing surface. Pointer input is assumed to arrive in
    /// the same units; use [`set_view_metrics`](Self::set_view_metrics) when
    /// it does not.
    pub fn set_view_size(&mut self, width: u32, height: u32) {
        let size = Size::new(width, height);
        log::info!("view resized to {width}x{height}");
        self.config.view_size = size;
        self.renderer.set_view_size(size);
        self.events.set_metrics(ViewMetrics::unscaled(size));
        if height > 0 {
            self.scene.set_camera_aspect(width as f32 / height as f32);
        }
    }

    pub fn set_view_metrics(&mut self, metrics: ViewMetrics) {
        self.events.set_metrics(metrics);
    }

    // ── Loop ────────────────────────────────────────────────────────────

    pub fn run(&mut self) {
        if !self.running {
            log::info!("engine '{}' running", self.config.title);
        }
        self.running = true;
    }

    pub fn stop(&mut self) {
        if self.running {
            log::info!("engine '{}' stopped after {} frames", self.config.title, self.time.frame_count());
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run one frame with a fixed `dt`. Returns `Ok(None)` when stopped or
    /// when a non-fatal error skipped the frame.
    pub fn frame(&mut self, dt: Duration) -> Result<Option<RenderStats>, RenderError> {
        if !self.running {
            return Ok(None);
        }
        self.time.advance(dt);
        self.step()
    }

    /// Run one frame timed by the wall clock.
    pub fn tick(&mut self) -> Result<Option<RenderStats>, RenderError> {
        if !self.running {
            return Ok(None);
        }
        self.time.update();
        self.step()
    }

    fn step(&mut self) -> Result<Option<RenderStats>, RenderError> {
        self.scene.run_scripts(self.time.delta_secs());
        match self.renderer.render(&mut self.scene) {
            Ok(stats) => Ok(Some(stats)),
            Err(e) if !e.is_fatal() => {
                log::warn!("frame {} skipped: {e}", self.time.frame_count());
                Ok(None)
            }
            Err(e) => {
                log::error!("fatal render error: {e}");
                self.running = false;
                Err(e)
            }
        }
    }

    // ── Input ───────────────────────────────────────────────────────────

    /// Register a pointer handler on a Spatial-2D node of the active scene.
    pub fn on(
        &mut self,
        node: NodeId,
        kind: EventKind,
        handler: impl FnMut(&mut Scene, &PointerEvent) -> Propagation + 'static,
    ) -> Result<ListenerId, SceneError> {
        self.events.on(&self.scene, node, kind, handler)
    }

    pub fn pointer_down(&mut self, device: Vec2) -> usize {
        self.events.pointer_down(&mut self.scene, device)
    }

    pub fn pointer_move(&mut self, device: Vec2) -> usize {
        self.events.pointer_move(&mut self.scene, device)
    }

    pub fn pointer_up(&mut self, device: Vec2) -> usize {
        self.events.pointer_up(&mut self.scene, device)
    }

    /// Stop, release the scene and every GPU resource.
    pub fn shutdown(&mut self) {
        self.stop();
        let old = self.set_scene(Scene::new());
        self.release_scene(old);
        self.events.clear();
        self.renderer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Color;
    use crate::render::builtin;
    use crate::render::geometry::cube;
    use crate::render::Mesh;
    use crate::render2d::RenderComponent2d;
    use crate::scene::{Node, Node2dOptions};

    fn engine() -> Engine<HeadlessDevice> {
        Engine::headless(EngineConfig::default()).unwrap()
    }

    #[test]
    fn frames_only_run_while_running() {
        let mut e = engine();
        assert_eq!(e.frame(Duration::from_millis(16)).unwrap(), None);
        e.run();
        assert!(e.frame(Duration::from_millis(16)).unwrap().is_some());
        e.stop();
        assert_eq!(e.frame(Duration::from_millis(16)).unwrap(), None);
        assert_eq!(e.renderer().device().frames(), 1);
        assert_eq!(e.time().frame_count(), 1);
    }

    #[test]
    fn scripts_run_before_render() {
        let mut e = engine();
        let flat = e.add_material(builtin::solid_color(Color::WHITE));
        let root = e.scene().root();
        let mover = Node::spatial2d("mover", Node2dOptions::sized(10.0, 10.0))
            .with_render(RenderComponent2d::quad(flat))
            .with_script(|scene: &mut Scene, id: NodeId, dt: f32| {
                scene.translate(id, crate::math::Vec3::new(100.0 * dt, 0.0, 0.0)).unwrap();
            });
        let id = e.scene_mut().spawn_child(root, mover).unwrap();
        e.run();
        e.frame(Duration::from_millis(500)).unwrap();
        assert_eq!(e.scene().node(id).unwrap().position().x, 50.0);
        // lb corner of the drawn quad already reflects the move
        let draw = &e.renderer().device().draws()[0];
        let data = e.renderer().device().buffer_f32(draw.attributes[0].1);
        assert_eq!(data[0], 45.0);
    }

    #[test]
    fn set_scene_returns_the_old_one() {
        let mut e = engine();
        let root = e.scene().root();
        e.scene_mut().spawn_child(root, Node::new("a")).unwrap();
        let old = e.set_scene(Scene::new());
        assert_eq!(old.len(), 2);
        assert_eq!(e.scene().len(), 1);
    }

    #[test]
    fn create_scene_releases_meshes() {
        let mut e = engine();
        let phong = e.add_material(builtin::phong_default());
        let root = e.scene().root();
        let id = e.scene_mut().spawn_child(root, Node::new("cube")).unwrap();
        e.scene_mut().set_mesh(id, Mesh::new(cube(1.0), phong)).unwrap();
        e.scene_mut()
            .spawn_child(root, Node::camera("cam", crate::scene::Camera::default()))
            .unwrap();
        e.run();
        e.frame(Duration::from_millis(16)).unwrap();
        let live = e.renderer().device().live_buffers();

        e.create_scene();
        assert_eq!(e.renderer().device().live_buffers(), live - 4);
        assert_eq!(e.renderer().device().double_deletes(), 0);
    }

    #[test]
    fn view_size_updates_pointer_mapping() {
        let mut e = engine();
        e.set_view_size(400, 200);
        assert_eq!(e.events().metrics().to_world(Vec2::new(0.0, 0.0)), Vec2::new(0.0, 200.0));
    }

    #[test]
    fn shutdown_releases_everything() {
        let mut e = engine();
        let flat = e.add_material(builtin::solid_color(Color::WHITE));
        let root = e.scene().root();
        e.scene_mut()
            .spawn_child(
                root,
                Node::spatial2d("q", Node2dOptions::sized(1.0, 1.0)).with_render(RenderComponent2d::quad(flat)),
            )
            .unwrap();
        e.run();
        e.frame(Duration::from_millis(16)).unwrap();
        e.shutdown();
        assert!(!e.is_running());
        let device = e.renderer().device();
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_programs(), 0);
        assert_eq!(device.live_textures(), 0);
    }
}
