//! # Mesh — 3D Drawables
//!
//! A [`Mesh`] pairs a [`Geometry`] with a material handle and owns the GPU
//! buffers the geometry lives in. It is attached to a plain (non-2D) node and
//! drawn once per frame against the scene's first camera.
//!
//! ## Upload Lifecycle
//!
//! ```text
//!   new()          first render()          set_uvs() + render()       destroy()
//!   ──────         ──────────────          ────────────────────       ─────────
//!   CPU only  ──►  create + fill all  ──►  write dirty attribute ──►  delete all
//!                  buffers                 buffers only               buffers once
//! ```
//!
//! Attribute buffers are bound by name per pass: a pass that never declares
//! `a_normal` simply does not get the normal buffer.

use crate::error::GraphicsError;
use crate::math::Mat4;
use crate::scene::CameraView;

use super::builtin::{LIGHT_DIRECTION, U_CAMERA_POS, U_LIGHT_DIR, U_PROJ, U_VIEW_INV, U_WORLD};
use super::device::{BufferId, BufferKind, GraphicsDevice, UniformValue};
use super::geometry::{ATTR_NORMAL, ATTR_POSITION, ATTR_UV, Geometry};
use super::material::{Material, MaterialHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MeshBuffers {
    position: BufferId,
    normal: Option<BufferId>,
    uv: Option<BufferId>,
    index: BufferId,
}

impl MeshBuffers {
    fn all(&self) -> impl Iterator<Item = BufferId> {
        [Some(self.position), self.normal, self.uv, Some(self.index)]
            .into_iter()
            .flatten()
    }
}

#[derive(Debug)]
pub struct Mesh {
    geometry: Geometry,
    material: MaterialHandle,
    buffers: Option<MeshBuffers>,
    destroyed: bool,
}

fn upload(
    device: &mut dyn GraphicsDevice,
    kind: BufferKind,
    data: &[u8],
) -> Result<BufferId, GraphicsError> {
    let buffer = device.create_buffer(kind, data.len())?;
    device.write_buffer(buffer, 0, data);
    Ok(buffer)
}

/// Create and fill every buffer `geometry` needs. Buffers created before a
/// failure are left in `created` for the caller to release.
fn create_buffers(
    device: &mut dyn GraphicsDevice,
    geometry: &Geometry,
    created: &mut Vec<BufferId>,
) -> Result<MeshBuffers, GraphicsError> {
    let mut upload_tracked = |kind, data: &[u8]| -> Result<BufferId, GraphicsError> {
        let buffer = upload(device, kind, data)?;
        created.push(buffer);
        Ok(buffer)
    };
    let position = upload_tracked(BufferKind::Vertex, bytemuck::cast_slice(geometry.positions()))?;
    let normal = if geometry.has_normals() {
        Some(upload_tracked(BufferKind::Vertex, bytemuck::cast_slice(geometry.normals()))?)
    } else {
        None
    };
    let uv = if geometry.has_uvs() {
        Some(upload_tracked(BufferKind::Vertex, bytemuck::cast_slice(geometry.uvs()))?)
    } else {
        None
    };
    let index = upload_tracked(BufferKind::Index, bytemuck::cast_slice(geometry.indices()))?;
    Ok(MeshBuffers {
        position,
        normal,
        uv,
        index,
    })
}

impl Mesh {
    pub fn new(geometry: Geometry, material: MaterialHandle) -> Self {
        Self {
            geometry,
            material,
            buffers: None,
            destroyed: false,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Changes made through the setters are picked up on the next draw.
    pub fn geometry_mut(&mut self) -> &mut Geometry {
        &mut self.geometry
    }

    pub fn material(&self) -> MaterialHandle {
        self.material
    }

    pub fn set_material(&mut self, material: MaterialHandle) {
        self.material = material;
    }

    pub fn is_uploaded(&self) -> bool {
        self.buffers.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn sync(&mut self, device: &mut dyn GraphicsDevice) -> Result<MeshBuffers, GraphicsError> {
        let g = &self.geometry;
        let buffers = match self.buffers {
            Some(buffers) => {
                if g.positions_dirty() {
                    device.write_buffer(buffers.position, 0, bytemuck::cast_slice(g.positions()));
                }
                if let (true, Some(normal)) = (g.normals_dirty(), buffers.normal) {
                    device.write_buffer(normal, 0, bytemuck::cast_slice(g.normals()));
                }
                if let (true, Some(uv)) = (g.uvs_dirty(), buffers.uv) {
                    device.write_buffer(uv, 0, bytemuck::cast_slice(g.uvs()));
                }
                buffers
            }
            None => {
                let mut created = Vec::new();
                match create_buffers(device, g, &mut created) {
                    Ok(buffers) => {
                        log::trace!("uploaded mesh ({} vertices)", g.vertex_count());
                        self.buffers = Some(buffers);
                        buffers
                    }
                    Err(e) => {
                        for buffer in created {
                            device.delete_buffer(buffer);
                        }
                        return Err(e);
                    }
                }
            }
        };
        self.geometry.clear_dirty();
        Ok(buffers)
    }

    /// Draw every pass of `material` with this mesh at `world`.
    ///
    /// Uploads on first use and re-syncs dirty attributes. Compiles the
    /// material if needed. A destroyed mesh draws nothing.
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        material: &mut Material,
        camera: &CameraView,
        world: Mat4,
    ) -> Result<(), GraphicsError> {
        if self.destroyed {
            return Ok(());
        }
        let buffers = self.sync(device)?;
        material.compile(device)?;

        let effect = material.effect();
        let index_count = self.geometry.index_count() as u32;
        let attributes = [
            (ATTR_POSITION, Some(buffers.position)),
            (ATTR_NORMAL, buffers.normal),
            (ATTR_UV, buffers.uv),
        ];
        let camera_uniforms = [
            (U_PROJ, UniformValue::Mat4(camera.projection)),
            (U_VIEW_INV, UniformValue::Mat4(camera.view)),
            (U_CAMERA_POS, UniformValue::Vec3(camera.position)),
            (U_LIGHT_DIR, UniformValue::Vec3(LIGHT_DIRECTION)),
            (U_WORLD, UniformValue::Mat4(world)),
        ];

        for pass in 0..effect.pass_count() {
            effect.use_pass(device, pass);
            for (name, buffer) in attributes {
                if let (Some(info), Some(buffer)) = (effect.attribute(name, pass), buffer) {
                    device.bind_vertex_attribute(info.location, buffer, info.format);
                }
            }
            device.bind_index_buffer(buffers.index);
            effect.apply_pipeline_state(device, pass);
            for (name, value) in &camera_uniforms {
                effect.set_property(device, pass, name, value);
            }
            material.apply_properties(device, pass);
            device.draw_elements(index_count);
        }
        Ok(())
    }

    /// Release the GPU buffers. Safe to call more than once.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        if let Some(buffers) = self.buffers.take() {
            for buffer in buffers.all() {
                device.delete_buffer(buffer);
            }
        }
    }
}
