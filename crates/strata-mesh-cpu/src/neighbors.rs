use strata_tiles::{ChunkKey, ChunkPresence, TileGrid};

use crate::face::Face;

/// Which horizontal neighbors were resident when a chunk was built. Stored on
/// the mesh so a later registry change can tell whether a rebuild is due.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NeighborsLoaded {
    pub neg_x: bool,
    pub pos_x: bool,
    pub neg_z: bool,
    pub pos_z: bool,
}

impl NeighborsLoaded {
    #[inline]
    pub const fn empty() -> Self {
        Self {
            neg_x: false,
            pos_x: false,
            neg_z: false,
            pos_z: false,
        }
    }

    #[inline]
    pub const fn horizontal(neg_x: bool, pos_x: bool, neg_z: bool, pos_z: bool) -> Self {
        Self {
            neg_x,
            pos_x,
            neg_z,
            pos_z,
        }
    }

    /// A neighbor past the edge of the coordinate range counts as absent.
    pub fn from_presence<P: ChunkPresence + ?Sized>(key: ChunkKey, presence: &P) -> Self {
        let loaded = |k: Option<ChunkKey>| k.is_some_and(|k| presence.is_loaded(k));
        Self {
            neg_x: loaded(key.checked_offset(-1, 0)),
            pos_x: loaded(key.checked_offset(1, 0)),
            neg_z: loaded(key.checked_offset(0, -1)),
            pos_z: loaded(key.checked_offset(0, 1)),
        }
    }
}

/// What hides a face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Occluder {
    /// A tile in the same grid whose top reaches at least the face's top.
    Tile { elevation: f32 },
    /// A resident neighbor chunk; its contents are not inspected.
    Boundary,
}

impl Occluder {
    /// Sentinel returned for any face that crosses into a loaded neighbor.
    pub const BOUNDARY: Occluder = Occluder::Boundary;
}

/// Decides whether the face of a tile looking at local cell `(x, z)` is hidden.
///
/// `(x, z)` is the cell the face looks into and `depth` is the elevation of the
/// face's top edge. Cells inside the grid are judged from local data alone:
/// a valid, non-water tile at an elevation of at least `depth` hides the face.
/// Cells outside the grid map to a neighbor chunk; if that chunk is loaded the
/// seam is treated as covered, otherwise the boundary is open and the face
/// must be drawn.
pub fn resolve_face<P: ChunkPresence + ?Sized>(
    grid: &TileGrid,
    x: i32,
    z: i32,
    depth: f32,
    face: Face,
    presence: &P,
    this_chunk: ChunkKey,
    depression_depth: f32,
) -> Option<Occluder> {
    if grid.contains_local(x, z) {
        let nb = grid.get_signed(x, z)?;
        if !nb.occludes() {
            return None;
        }
        let elevation = nb.elevation(depression_depth);
        return (elevation >= depth).then_some(Occluder::Tile { elevation });
    }
    let size = grid.size() as i32;
    let (dx, dz) = match face {
        Face::PosX | Face::NegX => (x.div_euclid(size), 0),
        Face::PosZ | Face::NegZ => (0, z.div_euclid(size)),
        Face::Top => return None,
    };
    match this_chunk.checked_offset(dx, dz) {
        Some(neighbor) if presence.is_loaded(neighbor) => Some(Occluder::BOUNDARY),
        _ => None,
    }
}
