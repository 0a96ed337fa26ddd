//! # WgpuDevice — Replaying Immediate-Mode Calls on wgpu
//!
//! The [`GraphicsDevice`] contract is stateful and immediate: bind a
//! program, set uniforms, bind attributes, draw. wgpu wants pipelines,
//! bind groups and a render pass recorded up front. This backend bridges
//! the two by recording.
//!
//! ```text
//!   begin_frame          acquire the surface texture
//!   set_uniform/bind_*   update the current binding state (CPU only)
//!   draw_elements        snapshot the state into a Draw, pack uniforms
//!   write_buffer         CPU shadow copy; if a pending draw reads the
//!                        buffer, submit the pending draws first
//!   end_frame            submit the remaining draws, present
//! ```
//!
//! A "segment" is one render pass plus one queue submission. Splitting the
//! frame on buffer rewrites keeps the batcher's pattern (fill, flush,
//! refill the same buffers) correct: `queue.write_buffer` lands before the
//! next submission, so each segment sees the contents its draws were
//! recorded against.
//!
//! ## Uniform Packing
//!
//! Non-texture uniforms of a program live in one block at
//! `@group(0) @binding(0)`, in declaration order, with WGSL alignment:
//!
//! | kind  | align | size |
//! |-------|-------|------|
//! | f32   | 4     | 4    |
//! | vec2  | 8     | 8    |
//! | vec3  | 16    | 12   |
//! | vec4  | 16    | 16   |
//! | mat4  | 16    | 64   |
//!
//! Each draw gets its own slot in a per-segment uniform arena, addressed by
//! a dynamic offset. Textures bind at `@group(1)`; draws without one get a
//! 1×1 white texture.

use std::collections::HashMap;
use std::num::NonZeroU64;

use crate::error::GraphicsError;
use crate::math::{Color, Size};

use super::device::{
    BufferId, BufferKind, CompiledProgram, GraphicsDevice, ProgramId, ShaderSource, TextureId,
    UniformKind, UniformLocation, UniformValue, VertexFormat,
};
use super::gpu::{DEPTH_FORMAT, GpuContext};
use super::state::{BlendFactor, CompareFunction, CullMode, PipelineState};

fn align_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

fn uniform_align_size(kind: UniformKind) -> Option<(u32, u32)> {
    match kind {
        UniformKind::Float => Some((4, 4)),
        UniformKind::Vec2 => Some((8, 8)),
        UniformKind::Vec3 => Some((16, 12)),
        UniformKind::Vec4 => Some((16, 16)),
        UniformKind::Mat4 => Some((16, 64)),
        UniformKind::Texture => None,
    }
}

/// Byte offsets of each uniform slot in the block (`None` for textures) and
/// the block size, rounded up to 16.
fn uniform_block_layout(kinds: &[UniformKind]) -> (Vec<Option<u32>>, u32) {
    let mut cursor = 0;
    let offsets = kinds
        .iter()
        .map(|&kind| {
            let (align, size) = uniform_align_size(kind)?;
            let offset = align_up(cursor, align);
            cursor = offset + size;
            Some(offset)
        })
        .collect();
    (offsets, align_up(cursor, 16).max(16))
}

fn write_uniform(block: &mut [u8], offset: usize, value: &UniformValue) {
    let mut floats = [0.0f32; 16];
    let len = match value {
        UniformValue::Float(v) => {
            floats[0] = *v;
            1
        }
        UniformValue::Vec2(v) => {
            floats[..2].copy_from_slice(&v.to_array());
            2
        }
        UniformValue::Vec3(v) => {
            floats[..3].copy_from_slice(&v.to_array());
            3
        }
        UniformValue::Vec4(v) => {
            floats[..4].copy_from_slice(&v.to_array());
            4
        }
        UniformValue::Mat4(v) => {
            floats = v.to_cols_array();
            16
        }
        UniformValue::Texture(_) => return,
    };
    let bytes: &[u8] = bytemuck::cast_slice(&floats[..len]);
    if let Some(dst) = block.get_mut(offset..offset + bytes.len()) {
        dst.copy_from_slice(bytes);
    }
}

fn to_vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
    }
}

fn to_compare(compare: CompareFunction) -> wgpu::CompareFunction {
    match compare {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

fn to_blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

fn to_color(color: Color) -> wgpu::Color {
    wgpu::Color {
        r: f64::from(color.r),
        g: f64::from(color.g),
        b: f64::from(color.b),
        a: f64::from(color.a),
    }
}

// ── Resources ───────────────────────────────────────────────────────────

struct GpuBuffer {
    kind: BufferKind,
    shadow: Vec<u8>,
    buffer: Option<wgpu::Buffer>,
    dirty: bool,
}

impl GpuBuffer {
    /// Push the shadow copy to the GPU, reallocating when it outgrew the
    /// buffer.
    fn upload(&mut self, gpu: &GpuContext) {
        if !self.dirty || self.shadow.is_empty() {
            return;
        }
        let len = align_up(self.shadow.len() as u32, wgpu::COPY_BUFFER_ALIGNMENT as u32) as usize;
        self.shadow.resize(len, 0);
        let fits = self.buffer.as_ref().is_some_and(|b| b.size() >= len as u64);
        if !fits {
            let usage = match self.kind {
                BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
                BufferKind::Index => wgpu::BufferUsages::INDEX,
            };
            self.buffer = Some(gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("lumen buffer"),
                size: len as u64,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        if let Some(buffer) = &self.buffer {
            gpu.queue.write_buffer(buffer, 0, &self.shadow);
        }
        self.dirty = false;
    }
}

struct GpuProgram {
    label: String,
    module: wgpu::ShaderModule,
    attributes: Vec<VertexFormat>,
    kinds: Vec<UniformKind>,
    offsets: Vec<Option<u32>>,
    block_size: u32,
    /// Last value set per uniform slot. Persists across draws and frames.
    values: Vec<Option<UniformValue>>,
}

struct GpuTexture {
    bind_group: wgpu::BindGroup,
}

/// One recorded draw call.
struct Draw {
    program: ProgramId,
    state: PipelineState,
    vertex_buffers: Vec<BufferId>,
    index_buffer: BufferId,
    index_count: u32,
    uniforms: Vec<u8>,
    texture: Option<TextureId>,
}

/// [`GraphicsDevice`] on top of wgpu. See the module docs for how calls are
/// recorded and replayed.
pub struct WgpuDevice {
    gpu: GpuContext,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    white: wgpu::BindGroup,

    buffers: HashMap<BufferId, GpuBuffer>,
    programs: HashMap<ProgramId, GpuProgram>,
    textures: HashMap<TextureId, GpuTexture>,
    pipelines: HashMap<(ProgramId, PipelineState), wgpu::RenderPipeline>,
    next_id: u32,

    // Binding state.
    program: Option<ProgramId>,
    attributes: Vec<Option<BufferId>>,
    index_buffer: Option<BufferId>,
    state: PipelineState,
    viewport: Option<Size>,

    // Frame state.
    frame: Option<wgpu::SurfaceTexture>,
    pending_clear: Option<Color>,
    first_segment: bool,
    draws: Vec<Draw>,
}

impl WgpuDevice {
    pub fn new(gpu: GpuContext) -> Result<Self, GraphicsError> {
        let uniform_layout = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform block layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("linear sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white = upload_texture(&gpu, &texture_layout, &sampler, 1, 1, &[255; 4])?;

        Ok(Self {
            gpu,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            sampler,
            white,
            buffers: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            pipelines: HashMap::new(),
            next_id: 0,
            program: None,
            attributes: Vec::new(),
            index_buffer: None,
            state: PipelineState::default(),
            viewport: None,
            frame: None,
            pending_clear: None,
            first_segment: true,
            draws: Vec::new(),
        })
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    /// Reconfigure the surface for a new window size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn pipeline(&mut self, program: ProgramId, state: PipelineState) -> Option<&wgpu::RenderPipeline> {
        if !self.pipelines.contains_key(&(program, state)) {
            let compiled = self.programs.get(&program)?;
            let pipeline = build_pipeline(
                &self.gpu,
                &self.pipeline_layout,
                compiled,
                state,
            );
            log::debug!("built pipeline for '{}' ({state:?})", compiled.label);
            self.pipelines.insert((program, state), pipeline);
        }
        self.pipelines.get(&(program, state))
    }

    /// Encode and submit the recorded draws as one render pass.
    fn submit_segment(&mut self) {
        let Some(frame) = &self.frame else {
            self.draws.clear();
            return;
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        for buffer in self.buffers.values_mut() {
            buffer.upload(&self.gpu);
        }

        let draws = std::mem::take(&mut self.draws);
        for draw in &draws {
            self.pipeline(draw.program, draw.state);
        }

        let alignment = self.gpu.device.limits().min_uniform_buffer_offset_alignment;
        let largest = draws.iter().map(|d| d.uniforms.len() as u32).max().unwrap_or(16);
        let stride = align_up(largest.max(16), alignment);
        let arena_len = stride as u64 * draws.len().max(1) as u64;
        let mut arena = vec![0u8; arena_len as usize];
        for (i, draw) in draws.iter().enumerate() {
            let start = i * stride as usize;
            arena[start..start + draw.uniforms.len()].copy_from_slice(&draw.uniforms);
        }
        let arena_buffer = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform arena"),
            size: arena_len,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.gpu.queue.write_buffer(&arena_buffer, 0, &arena);
        let uniform_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform arena bind group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &arena_buffer,
                    offset: 0,
                    size: NonZeroU64::new(u64::from(stride)),
                }),
            }],
        });

        let (color_load, depth_load) = match (self.first_segment, self.pending_clear.take()) {
            (_, Some(color)) => (wgpu::LoadOp::Clear(to_color(color)), wgpu::LoadOp::Clear(1.0)),
            (true, None) => (wgpu::LoadOp::Clear(wgpu::Color::BLACK), wgpu::LoadOp::Clear(1.0)),
            (false, None) => (wgpu::LoadOp::Load, wgpu::LoadOp::Load),
        };
        self.first_segment = false;

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.gpu.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(size) = self.viewport {
                let (w, h) = self.gpu.surface_size();
                pass.set_viewport(
                    0.0,
                    0.0,
                    size.width.min(w).max(1) as f32,
                    size.height.min(h).max(1) as f32,
                    0.0,
                    1.0,
                );
            }

            for (i, draw) in draws.iter().enumerate() {
                let Some(pipeline) = self.pipelines.get(&(draw.program, draw.state)) else {
                    continue;
                };
                let Some(index) = self.buffers.get(&draw.index_buffer).and_then(|b| b.buffer.as_ref())
                else {
                    continue;
                };
                let vertex: Option<Vec<&wgpu::Buffer>> = draw
                    .vertex_buffers
                    .iter()
                    .map(|id| self.buffers.get(id).and_then(|b| b.buffer.as_ref()))
                    .collect();
                let Some(vertex) = vertex else {
                    continue;
                };
                let texture = draw
                    .texture
                    .and_then(|t| self.textures.get(&t))
                    .map_or(&self.white, |t| &t.bind_group);

                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &uniform_group, &[i as u32 * stride]);
                pass.set_bind_group(1, texture, &[]);
                for (slot, buffer) in vertex.into_iter().enumerate() {
                    pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
    }
}

fn upload_texture(
    gpu: &GpuContext,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> Result<wgpu::BindGroup, GraphicsError> {
    if width == 0 || height == 0 || rgba.len() != (width * height * 4) as usize {
        return Err(GraphicsError::TextureCreation(format!(
            "{width}x{height} image needs {} bytes, got {}",
            width * height * 4,
            rgba.len()
        )));
    }
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("lumen texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("texture bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    }))
}

fn build_pipeline(
    gpu: &GpuContext,
    layout: &wgpu::PipelineLayout,
    program: &GpuProgram,
    state: PipelineState,
) -> wgpu::RenderPipeline {
    let attributes: Vec<[wgpu::VertexAttribute; 1]> = program
        .attributes
        .iter()
        .enumerate()
        .map(|(location, format)| {
            [wgpu::VertexAttribute {
                offset: 0,
                shader_location: location as u32,
                format: to_vertex_format(*format),
            }]
        })
        .collect();
    let buffers: Vec<wgpu::VertexBufferLayout> = program
        .attributes
        .iter()
        .zip(&attributes)
        .map(|(format, attribute)| wgpu::VertexBufferLayout {
            array_stride: format.stride() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attribute,
        })
        .collect();

    let blend = state.blend.enabled.then(|| {
        let component = wgpu::BlendComponent {
            src_factor: to_blend_factor(state.blend.src),
            dst_factor: to_blend_factor(state.blend.dst),
            operation: wgpu::BlendOperation::Add,
        };
        wgpu::BlendState {
            color: component,
            alpha: component,
        }
    });

    gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(program.label.as_str()),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &program.module,
            entry_point: Some("vs_main"),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: gpu.surface_format(),
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: match state.cull {
                CullMode::None => None,
                CullMode::Front => Some(wgpu::Face::Front),
                CullMode::Back => Some(wgpu::Face::Back),
            },
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: state.depth.write,
            depth_compare: if state.depth.test {
                to_compare(state.depth.compare)
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

impl GraphicsDevice for WgpuDevice {
    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> Result<BufferId, GraphicsError> {
        let id = BufferId(self.next());
        self.buffers.insert(
            id,
            GpuBuffer {
                kind,
                shadow: vec![0; size],
                buffer: None,
                dirty: size > 0,
            },
        );
        Ok(id)
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) {
        let pending = self.draws.iter().any(|d| {
            d.index_buffer == buffer || d.vertex_buffers.contains(&buffer)
        });
        if pending {
            self.submit_segment();
        }
        let Some(target) = self.buffers.get_mut(&buffer) else {
            return;
        };
        let end = offset + data.len();
        if target.shadow.len() < end {
            target.shadow.resize(end, 0);
        }
        target.shadow[offset..end].copy_from_slice(data);
        target.dirty = true;
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_none() {
            log::warn!("buffer {buffer:?} deleted twice");
        }
    }

    fn compile_program(&mut self, source: &ShaderSource) -> Result<CompiledProgram, GraphicsError> {
        self.gpu.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(source.label.as_ref()),
            source: wgpu::ShaderSource::Wgsl(source.wgsl.clone()),
        });
        if let Some(err) = pollster::block_on(self.gpu.device.pop_error_scope()) {
            return Err(GraphicsError::ProgramCreation {
                label: source.label.to_string(),
                reason: err.to_string(),
            });
        }
        let textures = source.uniforms.iter().filter(|u| u.kind == UniformKind::Texture).count();
        if textures > 1 {
            return Err(GraphicsError::ProgramCreation {
                label: source.label.to_string(),
                reason: format!("{textures} texture uniforms, at most one is supported"),
            });
        }

        let id = ProgramId(self.next());
        let kinds: Vec<UniformKind> = source.uniforms.iter().map(|u| u.kind).collect();
        let (offsets, block_size) = uniform_block_layout(&kinds);
        log::debug!("compiled program '{}' ({block_size}-byte uniform block)", source.label);
        self.programs.insert(
            id,
            GpuProgram {
                label: source.label.to_string(),
                module,
                attributes: source.attributes.iter().map(|a| a.format).collect(),
                values: vec![None; kinds.len()],
                kinds,
                offsets,
                block_size,
            },
        );
        Ok(CompiledProgram::reflect(id, source))
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_none() {
            log::warn!("program {program:?} deleted twice");
        }
        self.pipelines.retain(|(p, _), _| *p != program);
        if self.program == Some(program) {
            self.program = None;
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.programs.contains_key(&program) {
            self.program = Some(program);
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue) {
        let Some(program) = self.programs.get_mut(&location.program) else {
            return;
        };
        let slot = location.slot as usize;
        match program.kinds.get(slot) {
            Some(kind) if *kind == value.kind() => program.values[slot] = Some(*value),
            Some(kind) => log::warn!(
                "'{}' uniform slot {slot} is {kind:?}, got {:?}",
                program.label,
                value.kind()
            ),
            None => {}
        }
    }

    fn bind_vertex_attribute(&mut self, location: u32, buffer: BufferId, _format: VertexFormat) {
        let location = location as usize;
        if self.attributes.len() <= location {
            self.attributes.resize(location + 1, None);
        }
        self.attributes[location] = Some(buffer);
    }

    fn bind_index_buffer(&mut self, buffer: BufferId) {
        self.index_buffer = Some(buffer);
    }

    fn set_pipeline_state(&mut self, state: &PipelineState) {
        self.state = *state;
    }

    fn draw_elements(&mut self, index_count: u32) {
        if self.frame.is_none() || index_count == 0 {
            return;
        }
        let (Some(program_id), Some(index_buffer)) = (self.program, self.index_buffer) else {
            return;
        };
        let Some(program) = self.programs.get(&program_id) else {
            return;
        };
        let vertex_buffers: Option<Vec<BufferId>> = (0..program.attributes.len())
            .map(|location| self.attributes.get(location).copied().flatten())
            .collect();
        let Some(vertex_buffers) = vertex_buffers else {
            log::warn!("'{}' drawn with unbound attributes, skipped", program.label);
            return;
        };

        let mut uniforms = vec![0u8; program.block_size as usize];
        let mut texture = None;
        for (slot, value) in program.values.iter().enumerate() {
            match (value, program.offsets[slot]) {
                (Some(UniformValue::Texture(t)), _) => texture = Some(*t),
                (Some(value), Some(offset)) => write_uniform(&mut uniforms, offset as usize, value),
                _ => {}
            }
        }

        self.draws.push(Draw {
            program: program_id,
            state: self.state,
            vertex_buffers,
            index_buffer,
            index_count,
            uniforms,
            texture,
        });
    }

    fn clear(&mut self, color: Color) {
        if !self.draws.is_empty() {
            self.submit_segment();
        }
        self.pending_clear = Some(color);
    }

    fn set_viewport(&mut self, size: Size) {
        self.viewport = Some(size);
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId, GraphicsError> {
        let bind_group = upload_texture(&self.gpu, &self.texture_layout, &self.sampler, width, height, rgba)?;
        let id = TextureId(self.next());
        self.textures.insert(id, GpuTexture { bind_group });
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_none() {
            log::warn!("texture {texture:?} deleted twice");
        }
    }

    fn begin_frame(&mut self) -> Result<(), GraphicsError> {
        self.draws.clear();
        self.first_segment = true;
        self.pending_clear = None;
        match self.gpu.surface.get_current_texture() {
            Ok(frame) => {
                self.frame = Some(frame);
                Ok(())
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (w, h) = self.gpu.surface_size();
                self.gpu.resize(w, h);
                Err(GraphicsError::Surface("surface lost, reconfigured".into()))
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(GraphicsError::DeviceRequest("out of GPU memory".into())),
            Err(e) => Err(GraphicsError::Surface(e.to_string())),
        }
    }

    fn end_frame(&mut self) -> Result<(), GraphicsError> {
        if self.frame.is_none() {
            return Ok(());
        }
        if !self.draws.is_empty() || self.first_segment || self.pending_clear.is_some() {
            self.submit_segment();
        }
        if let Some(frame) = self.frame.take() {
            frame.present();
        }
        Ok(())
    }
}
