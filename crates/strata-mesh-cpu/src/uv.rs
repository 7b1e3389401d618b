use std::collections::HashMap;

use strata_tiles::TextureRef;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl UvRect {
    pub const UNIT: UvRect = UvRect {
        u0: 0.0,
        v0: 0.0,
        u1: 1.0,
        v1: 1.0,
    };

    #[inline]
    pub const fn new(u0: f32, v0: f32, u1: f32, v1: f32) -> Self {
        Self { u0, v0, u1, v1 }
    }

    #[inline]
    pub fn lerp(&self, s: f32, t: f32) -> (f32, f32) {
        (
            self.u0 + (self.u1 - self.u0) * s,
            self.v0 + (self.v1 - self.v0) * t,
        )
    }

    /// Shrinks the rect by `inset` of its own width/height on every edge, so a
    /// unit cell with inset 0.001 becomes `[0.001, 0.999]`.
    #[inline]
    pub fn inset(&self, inset: f32) -> UvRect {
        let du = (self.u1 - self.u0) * inset;
        let dv = (self.v1 - self.v0) * inset;
        UvRect::new(self.u0 + du, self.v0 + dv, self.u1 - du, self.v1 - dv)
    }
}

/// Texture atlas collaborator: where a texture lives inside the shared atlas.
pub trait TextureRegions {
    fn region(&self, tex: &TextureRef) -> UvRect;
}

/// Every texture spans the whole unit cell (one texture per material).
#[derive(Clone, Copy, Debug, Default)]
pub struct UnitRegions;

impl TextureRegions for UnitRegions {
    #[inline]
    fn region(&self, _tex: &TextureRef) -> UvRect {
        UvRect::UNIT
    }
}

impl TextureRegions for HashMap<TextureRef, UvRect> {
    #[inline]
    fn region(&self, tex: &TextureRef) -> UvRect {
        self.get(tex).copied().unwrap_or(UvRect::UNIT)
    }
}

/// How tile faces are mapped into texture space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UvLayout {
    /// Each face samples its texture's atlas region.
    #[default]
    Atlas,
    /// Each chunk is painted into one canvas of `chunk_size * tile_resolution`
    /// pixels; tile `(x, z)` owns the pixel block starting at
    /// `(x * tile_resolution, z * tile_resolution)`.
    Canvas { tile_resolution: u32 },
}

/// UV rect for tile `(x, z)` inside its chunk canvas.
///
/// The rect is inset by half a texel so sampling stays inside the tile's own
/// pixel block and matches the canvas painter's layout exactly.
pub fn canvas_tile_rect(x: usize, z: usize, chunk_size: usize, tile_resolution: u32) -> UvRect {
    let res = tile_resolution.max(1) as f32;
    let width = chunk_size as f32 * res;
    let px0 = x as f32 * res + 0.5;
    let pz0 = z as f32 * res + 0.5;
    let px1 = (x + 1) as f32 * res - 0.5;
    let pz1 = (z + 1) as f32 * res - 0.5;
    UvRect::new(px0 / width, pz0 / width, px1 / width, pz1 / width)
}
