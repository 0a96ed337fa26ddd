//! # Graphics Device — The Contract the Renderer Draws Through
//!
//! Everything the renderer, meshes and materials do on the GPU goes through
//! the [`GraphicsDevice`] trait: create and fill buffers, compile programs,
//! set uniforms, bind attributes, toggle pipeline state, draw indexed
//! triangles. The trait mirrors a classic immediate-mode API on purpose; a
//! backend is free to record and replay the calls instead of executing them.
//!
//! Two implementations ship with the crate:
//!
//! - [`HeadlessDevice`](super::HeadlessDevice) records every call. Used by
//!   tests and tools, needs no GPU.
//! - `WgpuDevice` (feature `windowed`) records the calls per frame and
//!   replays them as one `wgpu` render pass.
//!
//! ## Programs and Reflection
//!
//! A [`ShaderSource`] declares its vertex attributes and uniforms alongside
//! the WGSL code. Compiling it yields a [`CompiledProgram`] whose tables map
//! names to device locations. Materials look uniforms and attributes up by
//! name in those tables, per pass.

use std::borrow::Cow;

use crate::error::GraphicsError;
use crate::math::{Color, Mat4, Size, Vec2, Vec3, Vec4};

use super::state::PipelineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Layout of one vertex attribute. All attributes are tightly packed `f32`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
}

impl VertexFormat {
    pub fn components(self) -> usize {
        match self {
            VertexFormat::Float32x2 => 2,
            VertexFormat::Float32x3 => 3,
        }
    }

    pub fn stride(self) -> usize {
        self.components() * std::mem::size_of::<f32>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Texture,
}

/// A value for a uniform (or a material property, which is a uniform by name).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    Texture(TextureId),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
            UniformValue::Texture(_) => UniformKind::Texture,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

impl From<Color> for UniformValue {
    fn from(c: Color) -> Self {
        UniformValue::Vec4(c.to_vec4())
    }
}

impl From<TextureId> for UniformValue {
    fn from(t: TextureId) -> Self {
        UniformValue::Texture(t)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: Cow<'static, str>,
    pub format: VertexFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: Cow<'static, str>,
    pub kind: UniformKind,
}

/// WGSL source plus the attribute and uniform declarations it exposes.
///
/// Attributes are bound to `@location(i)` in declaration order. Non-texture
/// uniforms are packed, in declaration order, into one uniform block at
/// `@group(0) @binding(0)`; at most one texture uniform is bound at
/// `@group(1)` (texture at binding 0, sampler at binding 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub label: Cow<'static, str>,
    pub wgsl: Cow<'static, str>,
    pub attributes: Vec<AttributeDecl>,
    pub uniforms: Vec<UniformDecl>,
}

impl ShaderSource {
    pub fn new(label: impl Into<Cow<'static, str>>, wgsl: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: label.into(),
            wgsl: wgsl.into(),
            attributes: Vec::new(),
            uniforms: Vec::new(),
        }
    }

    pub fn attribute(mut self, name: impl Into<Cow<'static, str>>, format: VertexFormat) -> Self {
        self.attributes.push(AttributeDecl {
            name: name.into(),
            format,
        });
        self
    }

    pub fn uniform(mut self, name: impl Into<Cow<'static, str>>, kind: UniformKind) -> Self {
        self.uniforms.push(UniformDecl {
            name: name.into(),
            kind,
        });
        self
    }
}

/// Where a uniform lives: its program and its slot in that program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub program: ProgramId,
    pub slot: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformInfo {
    pub name: String,
    pub kind: UniformKind,
    pub location: UniformLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name: String,
    pub format: VertexFormat,
    pub location: u32,
}

/// A linked program and its reflection tables.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledProgram {
    pub id: ProgramId,
    pub uniforms: Vec<UniformInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl CompiledProgram {
    /// Build the tables a backend reports for `source`: attribute `i` at
    /// location `i`, uniform `i` at slot `i`.
    pub fn reflect(id: ProgramId, source: &ShaderSource) -> Self {
        Self {
            id,
            uniforms: source
                .uniforms
                .iter()
                .enumerate()
                .map(|(slot, u)| UniformInfo {
                    name: u.name.to_string(),
                    kind: u.kind,
                    location: UniformLocation {
                        program: id,
                        slot: slot as u32,
                    },
                })
                .collect(),
            attributes: source
                .attributes
                .iter()
                .enumerate()
                .map(|(location, a)| AttributeInfo {
                    name: a.name.to_string(),
                    format: a.format,
                    location: location as u32,
                })
                .collect(),
        }
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformInfo> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// GPU operations the engine needs. Calls between
/// [`begin_frame`](Self::begin_frame) and [`end_frame`](Self::end_frame) make
/// up one frame.
///
/// Setting state against a program or buffer that does not exist is a no-op,
/// never an error: the render loop may get there before lazy initialization
/// does.
pub trait GraphicsDevice {
    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> Result<BufferId, GraphicsError>;
    /// Write `data` at byte `offset`, growing the buffer if needed.
    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]);
    fn delete_buffer(&mut self, buffer: BufferId);

    fn compile_program(&mut self, source: &ShaderSource) -> Result<CompiledProgram, GraphicsError>;
    fn delete_program(&mut self, program: ProgramId);
    fn use_program(&mut self, program: ProgramId);
    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue);

    fn bind_vertex_attribute(&mut self, location: u32, buffer: BufferId, format: VertexFormat);
    fn bind_index_buffer(&mut self, buffer: BufferId);
    fn set_pipeline_state(&mut self, state: &PipelineState);
    /// Draw `index_count` `u32` indices from the bound index buffer.
    fn draw_elements(&mut self, index_count: u32);

    fn clear(&mut self, color: Color);
    fn set_viewport(&mut self, size: Size);

    /// Upload an RGBA8 image.
    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, GraphicsError>;
    fn delete_texture(&mut self, texture: TextureId);

    fn begin_frame(&mut self) -> Result<(), GraphicsError>;
    fn end_frame(&mut self) -> Result<(), GraphicsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflection_assigns_locations_in_declaration_order() {
        let source = ShaderSource::new("test", "")
            .attribute("a_position", VertexFormat::Float32x3)
            .attribute("a_uv", VertexFormat::Float32x2)
            .uniform("u_proj", UniformKind::Mat4)
            .uniform("u_tex", UniformKind::Texture);
        let program = CompiledProgram::reflect(ProgramId(7), &source);
        assert_eq!(program.attribute("a_uv").unwrap().location, 1);
        let tex = program.uniform("u_tex").unwrap();
        assert_eq!(tex.location, UniformLocation { program: ProgramId(7), slot: 1 });
        assert!(program.uniform("u_color").is_none());
    }

    #[test]
    fn uniform_value_kinds() {
        assert_eq!(UniformValue::from(1.0).kind(), UniformKind::Float);
        assert_eq!(UniformValue::from(Color::WHITE).kind(), UniformKind::Vec4);
        assert_eq!(UniformValue::from(TextureId(3)).kind(), UniformKind::Texture);
    }
}
