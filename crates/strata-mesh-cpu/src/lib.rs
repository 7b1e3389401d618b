//! CPU meshing crate: tile face culling, chunk mesh building and edge welding.
#![forbid(unsafe_code)]

mod build;
pub mod constants;
mod corners;
mod face;
mod mesh_build;
mod neighbors;
pub mod uv;
mod weld;

use std::collections::HashMap;

use strata_geom::Aabb;
use strata_tiles::ChunkKey;

pub use build::{BuildConfig, build_chunk_mesh};
pub use corners::{RoundedCorners, chamfered_outline};
pub use face::{Face, FaceDescriptor};
pub use mesh_build::MeshBuild;
pub use neighbors::{NeighborsLoaded, Occluder, resolve_face};
pub use uv::{TextureRegions, UnitRegions, UvLayout, UvRect};
pub use weld::{WeldStats, weld_mesh};

/// Surface buckets a chunk's geometry is split into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Surface {
    /// Land tops.
    Top,
    /// Lateral faces inside the chunk.
    Side,
    /// Lateral faces on the chunk's outer ring, pointing out of it.
    Edge,
    /// Tops of water tiles, drawn by the water shader.
    Water,
}

impl Surface {
    pub const ALL: [Surface; 4] = [Surface::Top, Surface::Side, Surface::Edge, Surface::Water];
}

/// Local coordinate of a tile slot the builder could not draw.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SkippedCell {
    pub x: usize,
    pub z: usize,
}

pub struct ChunkMesh {
    pub key: ChunkKey,
    pub bbox: Aabb,
    pub parts: HashMap<Surface, MeshBuild>,
    /// Registry snapshot this mesh was culled against.
    pub neighbors: NeighborsLoaded,
    pub skipped: Vec<SkippedCell>,
    pub faces_emitted: usize,
    pub faces_culled: usize,
    pub welded: bool,
}

impl ChunkMesh {
    #[inline]
    pub fn part(&self, surface: Surface) -> Option<&MeshBuild> {
        self.parts.get(&surface)
    }

    pub fn vertex_count(&self) -> usize {
        self.parts.values().map(MeshBuild::vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.parts.values().map(MeshBuild::triangle_count).sum()
    }

    /// Welds every part; see [`weld_mesh`].
    pub fn weld(&mut self, epsilon: f32) -> WeldStats {
        let mut total = WeldStats::default();
        for surface in Surface::ALL {
            if let Some(mb) = self.parts.get_mut(&surface) {
                let s = weld_mesh(mb, epsilon);
                total.merged_vertices += s.merged_vertices;
                total.dropped_triangles += s.dropped_triangles;
            }
        }
        self.welded = true;
        total
    }
}
