//! # Render — Devices, Materials, Meshes, and the Frame
//!
//! ```text
//!   Renderer ──owns──► GraphicsDevice   (HeadlessDevice | WgpuDevice)
//!      │                    ▲
//!      ├──owns──► MaterialStore ──► Material ──► Effect ──► Pass ×N
//!      ├──owns──► TextureStore
//!      └──owns──► BatchRenderer (render2d)
//!
//!   Scene nodes hold Mesh / RenderComponent2d with MaterialHandles.
//! ```
//!
//! Everything GPU-facing is written against the [`GraphicsDevice`] trait,
//! so the whole pipeline runs unchanged against the recording
//! [`HeadlessDevice`] in tests.

pub mod builtin;
pub mod device;
mod effect;
pub mod geometry;
pub mod headless;
mod material;
mod mesh;
mod renderer;
pub mod state;
mod texture;
#[cfg(feature = "windowed")]
pub mod gpu;
#[cfg(feature = "windowed")]
mod wgpu_device;

pub use device::{
    BufferId, BufferKind, CompiledProgram, GraphicsDevice, ProgramId, ShaderSource, TextureId,
    UniformKind, UniformValue, VertexFormat,
};
pub use effect::{Effect, Pass};
pub use geometry::Geometry;
pub use headless::HeadlessDevice;
pub use material::{Material, MaterialHandle, MaterialStore};
pub use mesh::Mesh;
pub use renderer::{RenderStats, Renderer};
pub use state::{BlendFactor, BlendState, CompareFunction, CullMode, DepthState, PipelineState};
pub use texture::{TextureInfo, TextureStore};
#[cfg(feature = "windowed")]
pub use wgpu_device::WgpuDevice;
