//! # Geometry — Vertex Attributes for 3D Meshes
//!
//! A [`Geometry`] keeps each attribute in its own array (positions, normals,
//! UVs) plus a `u32` index list. Separate arrays map one-to-one onto the
//! separately bound vertex buffers a [`Mesh`](super::Mesh) uploads, so
//! replacing one attribute only re-uploads that buffer.
//!
//! ## Dirty Flags
//!
//! Each `set_*` call marks its attribute dirty. The mesh checks the flags
//! before drawing, re-uploads what changed, and clears them. The index list
//! and vertex count are fixed at construction; replacements must keep the
//! same vertex count.
//!
//! ## Built-In Shapes
//!
//! [`quad`], [`plane`] and [`cube`] generate centered primitives with
//! counter-clockwise winding and outward normals. Cube faces get their own
//! four vertices so each face can carry its own normal.

use crate::math::Vec3;

/// Attribute names shaders bind geometry by.
pub const ATTR_POSITION: &str = "a_position";
pub const ATTR_NORMAL: &str = "a_normal";
pub const ATTR_UV: &str = "a_uv";

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    indices: Vec<u32>,
    positions_dirty: bool,
    normals_dirty: bool,
    uvs_dirty: bool,
    x_range: f32,
    y_range: f32,
}

impl Geometry {
    /// `normals` and `uvs` may be empty; otherwise they must match
    /// `positions` in length.
    pub fn new(
        positions: Vec<[f32; 3]>,
        normals: Vec<[f32; 3]>,
        uvs: Vec<[f32; 2]>,
        indices: Vec<u32>,
    ) -> Self {
        let mut geometry = Self {
            positions,
            normals,
            uvs,
            indices,
            positions_dirty: false,
            normals_dirty: false,
            uvs_dirty: false,
            x_range: 0.0,
            y_range: 0.0,
        };
        geometry.compute_range();
        geometry
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.uvs
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    /// Width of the positions' extent along X.
    pub fn x_range(&self) -> f32 {
        self.x_range
    }

    /// Height of the positions' extent along Y.
    pub fn y_range(&self) -> f32 {
        self.y_range
    }

    pub fn set_positions(&mut self, positions: Vec<[f32; 3]>) {
        self.positions = positions;
        self.positions_dirty = true;
        self.compute_range();
    }

    pub fn set_normals(&mut self, normals: Vec<[f32; 3]>) {
        self.normals = normals;
        self.normals_dirty = true;
    }

    pub fn set_uvs(&mut self, uvs: Vec<[f32; 2]>) {
        self.uvs = uvs;
        self.uvs_dirty = true;
    }

    pub fn positions_dirty(&self) -> bool {
        self.positions_dirty
    }

    pub fn normals_dirty(&self) -> bool {
        self.normals_dirty
    }

    pub fn uvs_dirty(&self) -> bool {
        self.uvs_dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.positions_dirty = false;
        self.normals_dirty = false;
        self.uvs_dirty = false;
    }

    fn compute_range(&mut self) {
        let Some(first) = self.positions.first() else {
            self.x_range = 0.0;
            self.y_range = 0.0;
            return;
        };
        let first = Vec3::from_array(*first);
        let (min, max) = self
            .positions
            .iter()
            .map(|p| Vec3::from_array(*p))
            .fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        self.x_range = max.x - min.x;
        self.y_range = max.y - min.y;
    }
}

/// A `width × height` quad in the XY plane facing +Z.
pub fn quad(width: f32, height: f32) -> Geometry {
    let (w, h) = (width * 0.5, height * 0.5);
    Geometry::new(
        vec![[-w, -h, 0.0], [w, -h, 0.0], [w, h, 0.0], [-w, h, 0.0]],
        vec![[0.0, 0.0, 1.0]; 4],
        vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        vec![0, 1, 2, 2, 3, 0],
    )
}

/// A square in the XZ plane facing +Y.
pub fn plane(size: f32) -> Geometry {
    let h = size * 0.5;
    Geometry::new(
        vec![[-h, 0.0, h], [h, 0.0, h], [h, 0.0, -h], [-h, 0.0, -h]],
        vec![[0.0, 1.0, 0.0]; 4],
        vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        vec![0, 1, 2, 0, 2, 3],
    )
}

/// A cube with side length `size`, centered at the origin. 24 vertices, 36
/// indices.
pub fn cube(size: f32) -> Geometry {
    let h = size * 0.5;
    // (normal, u axis, v axis)
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let corners = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];
    let face_uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut uvs = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u_dir, v_dir) in faces {
        let (n, u, v) = (
            Vec3::from_array(normal),
            Vec3::from_array(u_dir),
            Vec3::from_array(v_dir),
        );
        let base = positions.len() as u32;
        for (corner, uv) in corners.iter().zip(face_uvs) {
            let p = n * h + u * corner[0] * h + v * corner[1] * h;
            positions.push(p.to_array());
            normals.push(normal);
            uvs.push(uv);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    Geometry::new(positions, normals, uvs, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_shape() {
        let g = cube(2.0);
        assert_eq!(g.vertex_count(), 24);
        assert_eq!(g.index_count(), 36);
        assert_eq!(g.x_range(), 2.0);
        assert_eq!(g.y_range(), 2.0);
        assert!(g.indices().iter().all(|i| (*i as usize) < g.vertex_count()));
    }

    #[test]
    fn cube_faces_wind_outward() {
        let g = cube(1.0);
        for tri in g.indices().chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from_array(g.positions()[i as usize]));
            let normal = Vec3::from_array(g.normals()[tri[0] as usize]);
            assert!((b - a).cross(c - a).dot(normal) > 0.0);
        }
    }

    #[test]
    fn setters_mark_only_their_attribute_dirty() {
        let mut g = quad(2.0, 4.0);
        assert_eq!((g.x_range(), g.y_range()), (2.0, 4.0));
        g.set_uvs(vec![[0.5, 0.5]; 4]);
        assert!(g.uvs_dirty());
        assert!(!g.positions_dirty() && !g.normals_dirty());

        g.set_positions(vec![[0.0, 0.0, 0.0], [3.0, 0.0, 0.0], [3.0, 1.0, 0.0], [0.0, 1.0, 0.0]]);
        assert!(g.positions_dirty());
        assert_eq!((g.x_range(), g.y_range()), (3.0, 1.0));

        g.clear_dirty();
        assert!(!g.positions_dirty() && !g.uvs_dirty());
    }
}
