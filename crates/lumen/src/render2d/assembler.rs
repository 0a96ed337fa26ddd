//! Vertex assembly: turning a 2D node's box into batch geometry.
//!
//! An assembler writes one primitive into the shared [`BatchBuffers`]. The
//! only assembler the engine ships, [`QuadAssembler`], emits the node's box
//! as four world-space corners and two triangles:
//!
//! ```text
//!   lt(2) ────── rt(3)        indices: 0 1 2   2 1 3
//!    │  ╲         │           uv:  lb (0,0)  rb (1,0)
//!    │    ╲       │                lt (0,1)  rt (1,1)
//!    │      ╲     │
//!   lb(0) ────── rb(1)
//! ```
//!
//! Indices are written relative to the batch's current vertex count, so a
//! batch of K quads is one contiguous index range.

use crate::math::{Mat4, Vec2, Vec3};

/// What an assembler needs to know about the node being drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad2d {
    pub world: Mat4,
    pub width: f32,
    pub height: f32,
    pub anchor: Vec2,
}

impl Quad2d {
    /// Corners in local space: lb, rb, lt, rt.
    pub fn local_corners(&self) -> [Vec2; 4] {
        let left = -self.width * self.anchor.x;
        let bottom = -self.height * self.anchor.y;
        let right = left + self.width;
        let top = bottom + self.height;
        [
            Vec2::new(left, bottom),
            Vec2::new(right, bottom),
            Vec2::new(left, top),
            Vec2::new(right, top),
        ]
    }
}

/// CPU-side batch storage. Capacity is reserved once; the vectors' lengths
/// are the write cursors.
#[derive(Debug, Default)]
pub struct BatchBuffers {
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl BatchBuffers {
    pub fn with_capacity(vertices: usize, indices: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices),
            uvs: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(indices),
        }
    }

    /// Vertex write cursor.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Index write cursor.
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.uvs.clear();
        self.indices.clear();
    }
}

pub trait VertexAssembler {
    fn vertex_count(&self) -> usize {
        4
    }

    fn index_count(&self) -> usize {
        6
    }

    /// Append exactly `vertex_count()` vertices and `index_count()` indices.
    fn assemble(&self, quad: &Quad2d, out: &mut BatchBuffers);
}

/// Emits the node's box with UVs spanning `uv_min..uv_max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadAssembler {
    pub uv_min: Vec2,
    pub uv_max: Vec2,
}

impl QuadAssembler {
    /// Sample a sub-rectangle of the texture, e.g. one atlas frame.
    pub fn with_uv_rect(uv_min: Vec2, uv_max: Vec2) -> Self {
        Self { uv_min, uv_max }
    }
}

impl Default for QuadAssembler {
    fn default() -> Self {
        Self {
            uv_min: Vec2::ZERO,
            uv_max: Vec2::ONE,
        }
    }
}

impl VertexAssembler for QuadAssembler {
    fn assemble(&self, quad: &Quad2d, out: &mut BatchBuffers) {
        let base = out.vertex_count() as u32;
        for corner in quad.local_corners() {
            let p = quad.world.transform_point3(Vec3::new(corner.x, corner.y, 0.0));
            out.positions.push(p.to_array());
        }
        let (lo, hi) = (self.uv_min, self.uv_max);
        out.uvs.extend_from_slice(&[[lo.x, lo.y], [hi.x, lo.y], [lo.x, hi.y], [hi.x, hi.y]]);
        out.indices
            .extend([0, 1, 2, 2, 1, 3].map(|i| base + i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_at(x: f32, y: f32) -> Quad2d {
        Quad2d {
            world: Mat4::from_translation(Vec3::new(x, y, 0.0)),
            width: 10.0,
            height: 4.0,
            anchor: Vec2::splat(0.5),
        }
    }

    #[test]
    fn corners_follow_anchor() {
        let mut q = quad_at(0.0, 0.0);
        q.anchor = Vec2::ZERO;
        assert_eq!(q.local_corners()[0], Vec2::ZERO);
        assert_eq!(q.local_corners()[3], Vec2::new(10.0, 4.0));
    }

    #[test]
    fn indices_are_offset_by_existing_vertices() {
        let mut out = BatchBuffers::with_capacity(8, 12);
        let asm = QuadAssembler::default();
        asm.assemble(&quad_at(0.0, 0.0), &mut out);
        asm.assemble(&quad_at(100.0, 50.0), &mut out);

        assert_eq!(out.vertex_count(), 8);
        assert_eq!(&out.indices[6..], &[4, 5, 6, 6, 5, 7]);
        assert_eq!(out.positions[4], [95.0, 48.0, 0.0]);
        assert_eq!(out.positions[7], [105.0, 52.0, 0.0]);
        assert_eq!(out.uvs[1], [1.0, 0.0]);
    }

    #[test]
    fn rotation_moves_corners() {
        let q = Quad2d {
            world: Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2),
            width: 2.0,
            height: 2.0,
            anchor: Vec2::ZERO,
        };
        let mut out = BatchBuffers::default();
        QuadAssembler::default().assemble(&q, &mut out);
        let rb = Vec3::from_array(out.positions[1]);
        assert!(rb.abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));
    }
}
