//! # Effect — Compiled Programs, One per Pass
//!
//! An [`Effect`] is an ordered list of [`Pass`]es. Each pass pairs a shader
//! with the pipeline state it draws under. Drawing with an effect means, for
//! every pass in order: use the pass's program, bind attributes by name, set
//! pipeline state, set uniforms, draw.
//!
//! ## Lazy Compilation
//!
//! Effects start uncompiled. The first draw compiles every pass against the
//! device and keeps the reflection tables ([`CompiledProgram`]); later calls
//! to [`compile`](Effect::compile) return immediately. If any pass fails, the
//! programs already built for earlier passes are deleted and the effect stays
//! uncompiled.
//!
//! Until compilation, uniform and program calls are silent no-ops. The render
//! loop can touch an effect before it is ready without special-casing it.

use crate::error::GraphicsError;

use super::device::{AttributeInfo, CompiledProgram, GraphicsDevice, ShaderSource, UniformValue};
use super::state::PipelineState;

#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    pub shader: ShaderSource,
    pub state: PipelineState,
}

impl Pass {
    pub fn new(shader: ShaderSource, state: PipelineState) -> Self {
        Self { shader, state }
    }
}

#[derive(Debug)]
pub struct Effect {
    label: String,
    passes: Vec<Pass>,
    programs: Vec<CompiledProgram>,
}

impl Effect {
    pub fn new(label: impl Into<String>, passes: Vec<Pass>) -> Self {
        Self {
            label: label.into(),
            passes,
            programs: Vec::new(),
        }
    }

    /// A single-pass effect.
    pub fn single(shader: ShaderSource, state: PipelineState) -> Self {
        let label = shader.label.to_string();
        Self::new(label, vec![Pass::new(shader, state)])
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn is_compiled(&self) -> bool {
        !self.passes.is_empty() && self.programs.len() == self.passes.len()
    }

    pub fn program(&self, pass: usize) -> Option<&CompiledProgram> {
        self.programs.get(pass)
    }

    /// Compile every pass. Does nothing if already compiled.
    pub fn compile(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), GraphicsError> {
        if self.is_compiled() {
            return Ok(());
        }
        let mut programs = Vec::with_capacity(self.passes.len());
        for pass in &self.passes {
            match device.compile_program(&pass.shader) {
                Ok(program) => programs.push(program),
                Err(e) => {
                    log::error!("effect '{}' failed to compile: {e}", self.label);
                    for program in programs {
                        device.delete_program(program.id);
                    }
                    return Err(e);
                }
            }
        }
        log::debug!("compiled effect '{}' ({} passes)", self.label, programs.len());
        self.programs = programs;
        Ok(())
    }

    /// Make `pass`'s program current.
    pub fn use_pass(&self, device: &mut dyn GraphicsDevice, pass: usize) {
        if let Some(program) = self.programs.get(pass) {
            device.use_program(program.id);
        }
    }

    pub fn apply_pipeline_state(&self, device: &mut dyn GraphicsDevice, pass: usize) {
        if let Some(pass) = self.passes.get(pass) {
            device.set_pipeline_state(&pass.state);
        }
    }

    /// Attribute `name` as reflected by `pass`'s program. Passes may place
    /// the same attribute at different locations.
    pub fn attribute(&self, name: &str, pass: usize) -> Option<&AttributeInfo> {
        self.programs.get(pass)?.attribute(name)
    }

    /// Set uniform `name` on `pass`'s program. Unknown names, mismatched value
    /// kinds and uncompiled effects are ignored; returns whether the value was
    /// sent to the device.
    pub fn set_property(
        &self,
        device: &mut dyn GraphicsDevice,
        pass: usize,
        name: &str,
        value: &UniformValue,
    ) -> bool {
        let Some(uniform) = self.programs.get(pass).and_then(|p| p.uniform(name)) else {
            return false;
        };
        if uniform.kind != value.kind() {
            log::trace!(
                "effect '{}': '{name}' expects {:?}, got {:?}",
                self.label,
                uniform.kind,
                value.kind()
            );
            return false;
        }
        device.set_uniform(uniform.location, value);
        true
    }

    /// Delete the compiled programs. The effect can be compiled again.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        for program in self.programs.drain(..) {
            device.delete_program(program.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Mat4;
    use crate::render::device::{UniformKind, VertexFormat};
    use crate::render::HeadlessDevice;

    fn two_pass() -> Effect {
        let base = ShaderSource::new("base", "")
            .attribute("a_position", VertexFormat::Float32x3)
            .attribute("a_uv", VertexFormat::Float32x2)
            .uniform("u_proj", UniformKind::Mat4);
        let outline = ShaderSource::new("outline", "")
            .attribute("a_uv", VertexFormat::Float32x2)
            .attribute("a_position", VertexFormat::Float32x3)
            .uniform("u_width", UniformKind::Float);
        Effect::new(
            "two-pass",
            vec![
                Pass::new(base, PipelineState::default()),
                Pass::new(outline, PipelineState::transparent_2d()),
            ],
        )
    }

    #[test]
    fn compile_is_lazy_and_idempotent() {
        let mut device = HeadlessDevice::new();
        let mut effect = two_pass();
        assert!(!effect.is_compiled());
        effect.compile(&mut device).unwrap();
        effect.compile(&mut device).unwrap();
        assert!(effect.is_compiled());
        assert_eq!(device.compile_count(), 2);
    }

    #[test]
    fn attributes_resolve_per_pass() {
        let mut device = HeadlessDevice::new();
        let mut effect = two_pass();
        effect.compile(&mut device).unwrap();
        assert_eq!(effect.attribute("a_position", 0).unwrap().location, 0);
        assert_eq!(effect.attribute("a_position", 1).unwrap().location, 1);
        assert!(effect.attribute("a_normal", 0).is_none());
    }

    #[test]
    fn set_property_ignores_unknown_and_uncompiled() {
        let mut device = HeadlessDevice::new();
        let mut effect = two_pass();
        let proj = UniformValue::Mat4(Mat4::IDENTITY);
        assert!(!effect.set_property(&mut device, 0, "u_proj", &proj));

        effect.compile(&mut device).unwrap();
        assert!(effect.set_property(&mut device, 0, "u_proj", &proj));
        assert!(!effect.set_property(&mut device, 0, "u_missing", &proj));
        assert!(!effect.set_property(&mut device, 1, "u_proj", &proj));
        assert!(!effect.set_property(&mut device, 1, "u_width", &proj));
        assert!(effect.set_property(&mut device, 1, "u_width", &UniformValue::Float(2.0)));
    }

    #[test]
    fn failed_pass_cleans_up_earlier_programs() {
        let mut device = HeadlessDevice::new();
        device.fail_program = Some("outline".into());
        let mut effect = two_pass();
        assert!(effect.compile(&mut device).is_err());
        assert!(!effect.is_compiled());
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn destroy_releases_programs() {
        let mut device = HeadlessDevice::new();
        let mut effect = two_pass();
        effect.compile(&mut device).unwrap();
        effect.destroy(&mut device);
        effect.destroy(&mut device);
        assert!(!effect.is_compiled());
        assert_eq!(device.live_programs(), 0);
    }
}
