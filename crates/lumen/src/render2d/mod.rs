//! # 2D Rendering — Batched Quads for Spatial-2D Nodes
//!
//! A Spatial-2D node becomes drawable when it carries a
//! [`RenderComponent2d`]: a material handle plus the [`VertexAssembler`] that
//! turns the node's box into vertices. Each frame the renderer walks the
//! scene's 2D render list in pre-order and hands every node to the
//! [`BatchRenderer`], which merges runs of same-material nodes into single
//! draw calls.
//!
//! The renderer never reorders anything. Siblings later in the tree draw on
//! top, and draw-call count depends on how well the tree keeps same-material
//! nodes next to each other.

mod assembler;
mod batch;

pub use assembler::{BatchBuffers, Quad2d, QuadAssembler, VertexAssembler};
pub use batch::{BatchRenderer, BatchStats, Drawable2d};

use crate::render::MaterialHandle;

pub struct RenderComponent2d {
    material: MaterialHandle,
    assembler: Box<dyn VertexAssembler>,
}

impl RenderComponent2d {
    /// The node's full box with the whole texture mapped onto it.
    pub fn quad(material: MaterialHandle) -> Self {
        Self::new(material, QuadAssembler::default())
    }

    pub fn new(material: MaterialHandle, assembler: impl VertexAssembler + 'static) -> Self {
        Self {
            material,
            assembler: Box::new(assembler),
        }
    }

    pub fn material(&self) -> MaterialHandle {
        self.material
    }

    pub fn set_material(&mut self, material: MaterialHandle) {
        self.material = material;
    }

    pub fn assembler(&self) -> &dyn VertexAssembler {
        self.assembler.as_ref()
    }

    pub fn set_assembler(&mut self, assembler: impl VertexAssembler + 'static) {
        self.assembler = Box::new(assembler);
    }
}
