//! # Materials — Effects Plus the Values to Draw Them With
//!
//! A [`Material`] wraps an [`Effect`] with a list of named property values
//! (uniforms). Properties persist on the material: they can be set before the
//! effect is compiled and are re-applied on every draw.
//!
//! Materials are shared. Nodes refer to one through a [`MaterialHandle`] into
//! the [`MaterialStore`], so any number of nodes can draw with the same
//! material, and the 2D batcher can tell "same material" by comparing
//! handles.
//!
//! ## Comparison
//!
//! - **three.js**: `Material` objects are shared by reference between meshes;
//!   uniforms live on the material. Same model.
//! - **Bevy**: `Handle<M: Material>` into `Assets<M>`. Same handle idea,
//!   minus our per-pass programs.

use crate::error::GraphicsError;

use super::device::{GraphicsDevice, UniformValue};
use super::effect::Effect;

/// Handle to a material in the [`MaterialStore`]. Lightweight and `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialHandle(pub(crate) usize);

impl MaterialHandle {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct Material {
    name: String,
    effect: Effect,
    properties: Vec<(String, UniformValue)>,
}

impl Material {
    pub fn new(name: impl Into<String>, effect: Effect) -> Self {
        Self {
            name: name.into(),
            effect,
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<UniformValue>) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    /// Store a property value. Names the effect does not declare are kept and
    /// ignored at draw time.
    pub fn set_property(&mut self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        match self.properties.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.properties.push((name.to_owned(), value)),
        }
    }

    pub fn property(&self, name: &str) -> Option<UniformValue> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn properties(&self) -> &[(String, UniformValue)] {
        &self.properties
    }

    pub fn is_compiled(&self) -> bool {
        self.effect.is_compiled()
    }

    pub fn compile(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), GraphicsError> {
        self.effect.compile(device)
    }

    /// Send every stored property to `pass`'s program.
    pub fn apply_properties(&self, device: &mut dyn GraphicsDevice, pass: usize) {
        for (name, value) in &self.properties {
            self.effect.set_property(device, pass, name, value);
        }
    }

    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        self.effect.destroy(device);
    }
}

/// Owns every material; hands out [`MaterialHandle`]s.
#[derive(Debug, Default)]
pub struct MaterialStore {
    materials: Vec<Option<Material>>,
}

impl MaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, material: Material) -> MaterialHandle {
        let handle = MaterialHandle(self.materials.len());
        log::debug!("material {} '{}' added", handle.0, material.name);
        self.materials.push(Some(material));
        handle
    }

    pub fn get(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle.0)?.as_ref()
    }

    pub fn get_mut(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.materials.get_mut(handle.0)?.as_mut()
    }

    /// Store a property on a material. Returns `false` for unknown handles.
    pub fn set_property(
        &mut self,
        handle: MaterialHandle,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> bool {
        match self.get_mut(handle) {
            Some(material) => {
                material.set_property(name, value);
                true
            }
            None => false,
        }
    }

    /// Remove a material and delete its programs. Nodes still pointing at the
    /// handle stop drawing.
    pub fn remove(&mut self, handle: MaterialHandle, device: &mut dyn GraphicsDevice) -> bool {
        let Some(mut material) = self.materials.get_mut(handle.0).and_then(Option::take) else {
            return false;
        };
        material.destroy(device);
        true
    }

    pub fn len(&self) -> usize {
        self.materials.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every material's programs. Slots stay reserved so old handles
    /// never resolve to a later material.
    pub fn destroy_all(&mut self, device: &mut dyn GraphicsDevice) {
        for slot in &mut self.materials {
            if let Some(mut material) = slot.take() {
                material.destroy(device);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Vec3, Vec4};
    use crate::render::device::{ShaderSource, UniformKind};
    use crate::render::headless::Command;
    use crate::render::state::PipelineState;
    use crate::render::HeadlessDevice;

    fn tinted() -> Material {
        let shader = ShaderSource::new("tint", "").uniform("u_color", UniformKind::Vec4);
        Material::new("tint", Effect::single(shader, PipelineState::default()))
    }

    #[test]
    fn properties_persist_across_compile() {
        let mut device = HeadlessDevice::new();
        let mut material = tinted().with_property("u_color", Vec4::ONE);
        material.set_property("u_color", Vec4::new(1.0, 0.0, 0.0, 1.0));
        material.set_property("u_unused", Vec3::ZERO);
        assert_eq!(material.properties().len(), 2);

        material.compile(&mut device).unwrap();
        material.effect().use_pass(&mut device, 0);
        material.apply_properties(&mut device, 0);

        let sets: Vec<_> = device
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::SetUniform { value, .. } => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(sets, vec![UniformValue::Vec4(Vec4::new(1.0, 0.0, 0.0, 1.0))]);
    }

    #[test]
    fn store_handles() {
        let mut device = HeadlessDevice::new();
        let mut store = MaterialStore::new();
        let a = store.add(tinted());
        let b = store.add(tinted());
        assert_ne!(a, b);
        assert!(store.set_property(a, "u_color", Vec4::ZERO));
        assert_eq!(store.get(a).unwrap().property("u_color"), Some(UniformValue::Vec4(Vec4::ZERO)));

        store.get_mut(b).unwrap().compile(&mut device).unwrap();
        assert!(store.remove(b, &mut device));
        assert!(!store.remove(b, &mut device));
        assert!(store.get(b).is_none());
        assert!(!store.set_property(b, "u_color", Vec4::ZERO));
        assert_eq!(store.len(), 1);
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn handles_stay_dead_after_destroy_all() {
        let mut device = HeadlessDevice::new();
        let mut store = MaterialStore::new();
        let old = store.add(tinted());
        store.get_mut(old).unwrap().compile(&mut device).unwrap();

        store.destroy_all(&mut device);
        assert!(store.is_empty());
        assert_eq!(device.live_programs(), 0);

        let fresh = store.add(tinted().with_property("u_color", Vec4::ONE));
        assert_ne!(old, fresh);
        assert!(store.get(old).is_none());
        assert!(!store.set_property(old, "u_color", Vec4::ZERO));
        assert_eq!(store.get(fresh).unwrap().property("u_color"), Some(UniformValue::Vec4(Vec4::ONE)));
    }
}
