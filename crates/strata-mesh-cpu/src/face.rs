use strata_geom::Vec3;

use crate::uv::UvRect;

/// Faces a terrain tile can expose. Tiles sit on the ground, so there is no
/// bottom face.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Face {
    Top = 0,
    PosX = 1,
    NegX = 2,
    PosZ = 3,
    NegZ = 4,
}

impl Face {
    pub const LATERAL: [Face; 4] = [Face::PosX, Face::NegX, Face::PosZ, Face::NegZ];

    /// Returns the `[0..5)` index of this face.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns the unit-normal vector for this face.
    #[inline]
    pub fn normal(self) -> Vec3 {
        match self {
            Face::Top => Vec3::new(0.0, 1.0, 0.0),
            Face::PosX => Vec3::new(1.0, 0.0, 0.0),
            Face::NegX => Vec3::new(-1.0, 0.0, 0.0),
            Face::PosZ => Vec3::new(0.0, 0.0, 1.0),
            Face::NegZ => Vec3::new(0.0, 0.0, -1.0),
        }
    }

    /// Returns the horizontal grid delta `(dx, dz)` when stepping out of this face.
    #[inline]
    pub fn delta(self) -> (i32, i32) {
        match self {
            Face::Top => (0, 0),
            Face::PosX => (1, 0),
            Face::NegX => (-1, 0),
            Face::PosZ => (0, 1),
            Face::NegZ => (0, -1),
        }
    }

    #[inline]
    pub fn is_lateral(self) -> bool {
        !matches!(self, Face::Top)
    }

    /// True when this face of tile `(x, z)` lies on the outer ring of a
    /// `size`-wide chunk and points out of it.
    #[inline]
    pub fn on_chunk_boundary(self, x: usize, z: usize, size: usize) -> bool {
        match self {
            Face::Top => false,
            Face::PosX => x + 1 == size,
            Face::NegX => x == 0,
            Face::PosZ => z + 1 == size,
            Face::NegZ => z == 0,
        }
    }
}

/// Transient quad for one emitted face. Corners run `a, b, c, d` around the
/// perimeter; `a` maps to the UV rect's `(u0, v0)` and `c` to `(u1, v1)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceDescriptor {
    pub corners: [Vec3; 4],
    pub normal: Vec3,
    pub uv: UvRect,
}

impl FaceDescriptor {
    /// Point at parametric `(s, t)` across the face (`s` along `a→b`, `t` along `a→d`).
    #[inline]
    pub fn point(&self, s: f32, t: f32) -> Vec3 {
        let [a, b, _, d] = self.corners;
        a + (b - a) * s + (d - a) * t
    }

    #[inline]
    pub fn uv_at(&self, s: f32, t: f32) -> (f32, f32) {
        self.uv.lerp(s, t)
    }

    /// Lengths of the `a→b` and `a→d` edges.
    #[inline]
    pub fn edge_lengths(&self) -> (f32, f32) {
        let [a, b, _, d] = self.corners;
        ((b - a).length(), (d - a).length())
    }
}
