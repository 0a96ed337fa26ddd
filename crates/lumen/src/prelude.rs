//! Convenience re-exports: `use lumen::prelude::*` for the common items.

pub use crate::config::{BatchConfig, EngineConfig, HitPolicy, OverflowPolicy};
pub use crate::engine::Engine;
pub use crate::error::{GraphicsError, RenderError, SceneError, TextureError};
pub use crate::event::{EventKind, PointerEvent, Propagation, ViewMetrics};
pub use crate::logging::{LoggingConfig, init_logging};
pub use crate::math::{Color, Mat4, Quat, Rect, Size, Transform, Vec2, Vec3, Vec4};
pub use crate::render::{
    GraphicsDevice, HeadlessDevice, Material, MaterialHandle, Mesh, RenderStats, builtin, geometry,
};
pub use crate::render2d::RenderComponent2d;
pub use crate::scene::{Camera, Node, Node2dOptions, NodeId, Scene, Script};
pub use crate::time::Time;

#[cfg(feature = "windowed")]
pub use crate::render::WgpuDevice;
#[cfg(feature = "windowed")]
pub use crate::window::run;
