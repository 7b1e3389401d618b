use std::collections::HashMap;
use std::time::Instant;

use strata_geom::{Aabb, Vec3};
use strata_tiles::{ChunkKey, ChunkPresence, TileCell, TileGrid};

use crate::constants::{
    DEFAULT_DEPRESSION_DEPTH, DEFAULT_UV_INSET, MIN_SIDE_SPAN, OPAQUE_ALPHA, SNAP_DIVISIONS,
};
use crate::corners::{RoundedCorners, emit_face};
use crate::face::{Face, FaceDescriptor};
use crate::mesh_build::MeshBuild;
use crate::neighbors::{NeighborsLoaded, resolve_face};
use crate::uv::{TextureRegions, UvLayout, UvRect, canvas_tile_rect};
use crate::{ChunkMesh, SkippedCell, Surface};

/// Parameters shared by every chunk build.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BuildConfig {
    /// World units per tile along X and Z.
    pub stride: f32,
    pub depression_depth: f32,
    /// Elevation side faces start from when nothing lower is adjacent.
    pub floor: f32,
    pub uv_inset: f32,
    pub uv_layout: UvLayout,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            stride: 1.0,
            depression_depth: DEFAULT_DEPRESSION_DEPTH,
            floor: 0.0,
            uv_inset: DEFAULT_UV_INSET,
            uv_layout: UvLayout::Atlas,
        }
    }
}

impl BuildConfig {
    /// Grid that stored coordinates are snapped to.
    #[inline]
    pub fn snap_quantum(&self) -> f32 {
        self.stride / SNAP_DIVISIONS
    }
}

#[inline]
fn light_rgba(cell: &TileCell) -> [u8; 4] {
    let lv = (cell.lighting.clamp(0.0, 1.0) * 255.0).round() as u8;
    [lv, lv, lv, OPAQUE_ALPHA]
}

/// UV rect for one face of tile `(x, z)`.
fn face_uv(
    cell: &TileCell,
    face: Face,
    x: usize,
    z: usize,
    size: usize,
    cfg: &BuildConfig,
    regions: &dyn TextureRegions,
) -> UvRect {
    match cfg.uv_layout {
        UvLayout::Canvas { tile_resolution } => canvas_tile_rect(x, z, size, tile_resolution),
        UvLayout::Atlas => {
            let tex = if face.is_lateral() {
                &cell.middle
            } else {
                &cell.top
            };
            regions.region(tex).inset(cfg.uv_inset)
        }
    }
}

/// Quad for `face` of the tile spanning `[x0, x1] x [z0, z1]`, with lateral
/// faces covering elevations `[bottom, top]`. Lateral corners run top-left,
/// top-right, bottom-right, bottom-left as seen from outside.
fn face_quad(face: Face, x0: f32, x1: f32, z0: f32, z1: f32, bottom: f32, top: f32) -> [Vec3; 4] {
    match face {
        Face::Top => [
            Vec3::new(x0, top, z0),
            Vec3::new(x1, top, z0),
            Vec3::new(x1, top, z1),
            Vec3::new(x0, top, z1),
        ],
        Face::PosX => [
            Vec3::new(x1, top, z1),
            Vec3::new(x1, top, z0),
            Vec3::new(x1, bottom, z0),
            Vec3::new(x1, bottom, z1),
        ],
        Face::NegX => [
            Vec3::new(x0, top, z0),
            Vec3::new(x0, top, z1),
            Vec3::new(x0, bottom, z1),
            Vec3::new(x0, bottom, z0),
        ],
        Face::PosZ => [
            Vec3::new(x0, top, z1),
            Vec3::new(x1, top, z1),
            Vec3::new(x1, bottom, z1),
            Vec3::new(x0, bottom, z1),
        ],
        Face::NegZ => [
            Vec3::new(x1, top, z0),
            Vec3::new(x0, top, z0),
            Vec3::new(x0, bottom, z0),
            Vec3::new(x1, bottom, z0),
        ],
    }
}

/// Builds the CPU mesh for one chunk.
///
/// Every valid tile gets a top face. Each lateral face is asked of
/// [`resolve_face`]; when nothing hides it, it spans from the adjacent tile's
/// elevation (or the floor, across an open chunk boundary) up to this tile's
/// elevation. Invalid slots are skipped and reported in
/// [`ChunkMesh::skipped`]; the rest of the chunk is still built.
pub fn build_chunk_mesh<P: ChunkPresence + ?Sized>(
    grid: &TileGrid,
    key: ChunkKey,
    presence: &P,
    corners: &RoundedCorners,
    cfg: &BuildConfig,
    regions: &dyn TextureRegions,
) -> ChunkMesh {
    let t0 = Instant::now();
    let size = grid.size();
    let stride = cfg.stride;
    let quantum = cfg.snap_quantum();
    let radius = corners.world_radius(stride);
    let (ox, oz) = key.world_origin(size, stride);

    let mut parts: HashMap<Surface, MeshBuild> = HashMap::new();
    let mut skipped = Vec::new();
    let mut faces_emitted = 0usize;
    let mut faces_culled = 0usize;

    for (x, z, slot) in grid.iter() {
        let Some(cell) = slot else {
            skipped.push(SkippedCell { x, z });
            continue;
        };
        let elevation = cell.elevation(cfg.depression_depth);
        let rgba = light_rgba(cell);
        let x0 = ox + x as f32 * stride;
        let x1 = ox + (x + 1) as f32 * stride;
        let z0 = oz + z as f32 * stride;
        let z1 = oz + (z + 1) as f32 * stride;

        let top_surface = if cell.water {
            Surface::Water
        } else {
            Surface::Top
        };
        let top = FaceDescriptor {
            corners: face_quad(Face::Top, x0, x1, z0, z1, elevation, elevation),
            normal: Face::Top.normal(),
            uv: face_uv(cell, Face::Top, x, z, size, cfg, regions),
        };
        emit_face(
            parts.entry(top_surface).or_default(),
            &top,
            radius,
            rgba,
            quantum,
        );
        faces_emitted += 1;

        for face in Face::LATERAL {
            let (dx, dz) = face.delta();
            let (nx, nz) = (x as i32 + dx, z as i32 + dz);
            if resolve_face(
                grid,
                nx,
                nz,
                elevation,
                face,
                presence,
                key,
                cfg.depression_depth,
            )
            .is_some()
            {
                faces_culled += 1;
                continue;
            }
            let bottom = grid
                .get_signed(nx, nz)
                .filter(|nb| nb.occludes())
                .map(|nb| nb.elevation(cfg.depression_depth))
                .unwrap_or(cfg.floor)
                .max(cfg.floor);
            if elevation - bottom <= MIN_SIDE_SPAN {
                faces_culled += 1;
                continue;
            }
            let surface = if face.on_chunk_boundary(x, z, size) {
                Surface::Edge
            } else {
                Surface::Side
            };
            let desc = FaceDescriptor {
                corners: face_quad(face, x0, x1, z0, z1, bottom, elevation),
                normal: face.normal(),
                uv: face_uv(cell, face, x, z, size, cfg, regions),
            };
            emit_face(
                parts.entry(surface).or_default(),
                &desc,
                radius,
                rgba,
                quantum,
            );
            faces_emitted += 1;
        }
    }

    if !skipped.is_empty() {
        log::warn!(
            "chunk ({}, {}, {}) skipped {} malformed tile(s) while meshing",
            key.x,
            key.z,
            key.render_order,
            skipped.len()
        );
    }

    let mut bbox = Aabb::empty();
    for mb in parts.values() {
        for p in mb.positions() {
            bbox.include(p);
        }
    }

    let ms = t0.elapsed().as_millis();
    log::debug!(target: "perf", "ms={} chunk_build key=({}, {}, {}) size={} faces={} culled={} rounded={}", ms, key.x, key.z, key.render_order, size, faces_emitted, faces_culled, radius > 0.0);

    ChunkMesh {
        key,
        bbox,
        parts,
        neighbors: NeighborsLoaded::from_presence(key, presence),
        skipped,
        faces_emitted,
        faces_culled,
        welded: false,
    }
}
