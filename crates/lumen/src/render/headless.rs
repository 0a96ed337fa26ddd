//! A [`GraphicsDevice`] that records instead of drawing.
//!
//! [`HeadlessDevice`] keeps buffer contents, bound state and a log of every
//! call, so renderer behaviour can be asserted without a GPU: how many draw
//! calls a frame issued, which program and pipeline state each used, what
//! indices were uploaded, whether a buffer was released twice.

use std::collections::{HashMap, HashSet};

use crate::error::GraphicsError;
use crate::math::{Color, Size};

use super::device::{
    BufferId, BufferKind, CompiledProgram, GraphicsDevice, ProgramId, ShaderSource, TextureId,
    UniformLocation, UniformValue, VertexFormat,
};
use super::state::PipelineState;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginFrame,
    EndFrame,
    Clear(Color),
    SetViewport(Size),
    CreateBuffer { buffer: BufferId, kind: BufferKind, size: usize },
    WriteBuffer { buffer: BufferId, offset: usize, len: usize },
    DeleteBuffer(BufferId),
    CompileProgram { program: ProgramId, label: String },
    DeleteProgram(ProgramId),
    UseProgram(ProgramId),
    SetUniform { location: UniformLocation, value: UniformValue },
    BindAttribute { location: u32, buffer: BufferId, format: VertexFormat },
    BindIndexBuffer(BufferId),
    SetPipelineState(PipelineState),
    DrawElements { index_count: u32 },
    CreateTexture { texture: TextureId, width: u32, height: u32 },
    DeleteTexture(TextureId),
}

/// State captured at a draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: Option<ProgramId>,
    pub index_count: u32,
    pub state: PipelineState,
    pub attributes: Vec<(u32, BufferId, VertexFormat)>,
    pub index_buffer: Option<BufferId>,
    /// Uniform values of the bound program at draw time, by slot.
    pub uniforms: HashMap<u32, UniformValue>,
}

#[derive(Debug, Default)]
pub struct HeadlessDevice {
    commands: Vec<Command>,
    draws: Vec<DrawRecord>,
    buffers: HashMap<BufferId, (BufferKind, Vec<u8>)>,
    programs: HashMap<ProgramId, String>,
    textures: HashMap<TextureId, (u32, u32)>,
    uniforms: HashMap<ProgramId, HashMap<u32, UniformValue>>,
    deleted_buffers: HashSet<BufferId>,
    double_deletes: usize,
    next_id: u32,
    bound_program: Option<ProgramId>,
    bound_attributes: HashMap<u32, (BufferId, VertexFormat)>,
    bound_index: Option<BufferId>,
    state: PipelineState,
    frames: u64,
    /// Make every `create_buffer` fail.
    pub fail_buffers: bool,
    /// Make `compile_program` fail for programs with this label.
    pub fail_program: Option<String>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    /// Forget recorded commands and draws; resources stay alive.
    pub fn clear_log(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    pub fn buffer_data(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|(_, data)| data.as_slice())
    }

    /// Buffer contents read back as `f32`s.
    pub fn buffer_f32(&self, buffer: BufferId) -> Vec<f32> {
        self.buffer_data(buffer)
            .map(|d| d.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect())
            .unwrap_or_default()
    }

    /// Buffer contents read back as `u32`s.
    pub fn buffer_u32(&self, buffer: BufferId) -> Vec<u32> {
        self.buffer_data(buffer)
            .map(|d| d.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect())
            .unwrap_or_default()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Buffers deleted after they were already gone.
    pub fn double_deletes(&self) -> usize {
        self.double_deletes
    }

    pub fn compile_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::CompileProgram { .. }))
            .count()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> Result<BufferId, GraphicsError> {
        if self.fail_buffers {
            return Err(GraphicsError::BufferCreation(format!(
                "headless device refused a {size}-byte {kind:?} buffer"
            )));
        }
        let buffer = BufferId(self.next());
        self.buffers.insert(buffer, (kind, vec![0; size]));
        self.commands.push(Command::CreateBuffer { buffer, kind, size });
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) {
        let Some((_, bytes)) = self.buffers.get_mut(&buffer) else {
            return;
        };
        let end = offset + data.len();
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[offset..end].copy_from_slice(data);
        self.commands.push(Command::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            self.deleted_buffers.insert(buffer);
        } else if self.deleted_buffers.contains(&buffer) {
            self.double_deletes += 1;
        }
        self.commands.push(Command::DeleteBuffer(buffer));
    }

    fn compile_program(&mut self, source: &ShaderSource) -> Result<CompiledProgram, GraphicsError> {
        if self.fail_program.as_deref() == Some(&*source.label) {
            return Err(GraphicsError::ProgramCreation {
                label: source.label.to_string(),
                reason: String::from("headless device rejected the program"),
            });
        }
        let program = ProgramId(self.next());
        self.programs.insert(program, source.label.to_string());
        self.commands.push(Command::CompileProgram {
            program,
            label: source.label.to_string(),
        });
        Ok(CompiledProgram::reflect(program, source))
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        self.uniforms.remove(&program);
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
        self.commands.push(Command::DeleteProgram(program));
    }

    fn use_program(&mut self, program: ProgramId) {
        if !self.programs.contains_key(&program) {
            return;
        }
        self.bound_program = Some(program);
        self.commands.push(Command::UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue) {
        if !self.programs.contains_key(&location.program) {
            return;
        }
        self.uniforms
            .entry(location.program)
            .or_default()
            .insert(location.slot, *value);
        self.commands.push(Command::SetUniform {
            location,
            value: *value,
        });
    }

    fn bind_vertex_attribute(&mut self, location: u32, buffer: BufferId, format: VertexFormat) {
        self.bound_attributes.insert(location, (buffer, format));
        self.commands.push(Command::BindAttribute {
            location,
            buffer,
            format,
        });
    }

    fn bind_index_buffer(&mut self, buffer: BufferId) {
        self.bound_index = Some(buffer);
        self.commands.push(Command::BindIndexBuffer(buffer));
    }

    fn set_pipeline_state(&mut self, state: &PipelineState) {
        self.state = *state;
        self.commands.push(Command::SetPipelineState(*state));
    }

    fn draw_elements(&mut self, index_count: u32) {
        let mut attributes: Vec<_> = self
            .bound_attributes
            .iter()
            .map(|(loc, (buf, fmt))| (*loc, *buf, *fmt))
            .collect();
        attributes.sort_by_key(|(loc, _, _)| *loc);
        let uniforms = self
            .bound_program
            .and_then(|p| self.uniforms.get(&p))
            .cloned()
            .unwrap_or_default();
        self.draws.push(DrawRecord {
            program: self.bound_program,
            index_count,
            state: self.state,
            attributes,
            index_buffer: self.bound_index,
            uniforms,
        });
        self.commands.push(Command::DrawElements { index_count });
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(Command::Clear(color));
    }

    fn set_viewport(&mut self, size: Size) {
        self.commands.push(Command::SetViewport(size));
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, GraphicsError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(GraphicsError::TextureCreation(format!(
                "{width}x{height} texture needs {expected} bytes, got {}",
                rgba.len()
            )));
        }
        let texture = TextureId(self.next());
        self.textures.insert(texture, (width, height));
        self.commands.push(Command::CreateTexture {
            texture,
            width,
            height,
        });
        Ok(texture)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.commands.push(Command::DeleteTexture(texture));
    }

    fn begin_frame(&mut self) -> Result<(), GraphicsError> {
        self.bound_attributes.clear();
        self.bound_index = None;
        self.commands.push(Command::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GraphicsError> {
        self.frames += 1;
        self.commands.push(Command::EndFrame);
        Ok(())
    }
}
