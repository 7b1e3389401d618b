use std::collections::VecDeque;

use hashbrown::HashMap;
use strata_mesh_cpu::{ChunkMesh, RoundedCorners, Surface};
use strata_optimize::{ChunkDrawPlan, ObjectId, PlacedObject};
use strata_shadow::ShadowBehavior;
use strata_tiles::{ChunkKey, GridError, TileCell, TileGrid};

/// Tile replacement waiting to be applied.
#[derive(Clone, Debug, PartialEq)]
pub struct TileEdit {
    pub x: usize,
    pub z: usize,
    pub cell: TileCell,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// A build is in flight; the edit lands when it completes.
    Queued,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildStateError {
    #[error("a build is already in flight for this chunk")]
    AlreadyBuilding,
    #[error("no build is in flight for this chunk")]
    NotBuilding,
}

/// Everything the engine owns for one loaded chunk.
pub struct ChunkRecord {
    pub key: ChunkKey,
    grid: TileGrid,
    corners: RoundedCorners,
    mesh: Option<ChunkMesh>,
    shadows: HashMap<Surface, ShadowBehavior>,
    shadow_optimized: bool,
    objects: Vec<PlacedObject>,
    plan: Option<ChunkDrawPlan>,
    building: bool,
    pending_edits: VecDeque<TileEdit>,
    mesh_dirty: bool,
    plan_dirty: bool,
    rev: u64,
    built_rev: u64,
}

impl ChunkRecord {
    pub fn new(key: ChunkKey, grid: TileGrid, corners: RoundedCorners) -> Self {
        Self {
            key,
            grid,
            corners,
            mesh: None,
            shadows: HashMap::new(),
            shadow_optimized: false,
            objects: Vec::new(),
            plan: None,
            building: false,
            pending_edits: VecDeque::new(),
            mesh_dirty: true,
            plan_dirty: false,
            rev: 1,
            built_rev: 0,
        }
    }

    #[inline]
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    #[inline]
    pub fn corners(&self) -> &RoundedCorners {
        &self.corners
    }

    #[inline]
    pub fn mesh(&self) -> Option<&ChunkMesh> {
        self.mesh.as_ref()
    }

    pub(crate) fn mesh_mut(&mut self) -> Option<&mut ChunkMesh> {
        self.mesh.as_mut()
    }

    #[inline]
    pub fn shadow(&self, surface: Surface) -> Option<&ShadowBehavior> {
        self.shadows.get(&surface)
    }

    pub(crate) fn set_shadows(&mut self, shadows: HashMap<Surface, ShadowBehavior>) {
        self.shadows = shadows;
    }

    #[inline]
    pub fn is_welded(&self) -> bool {
        self.mesh.as_ref().is_some_and(|m| m.welded)
    }

    #[inline]
    pub fn is_shadow_optimized(&self) -> bool {
        self.shadow_optimized
    }

    pub(crate) fn set_shadow_optimized(&mut self, on: bool) {
        self.shadow_optimized = on;
    }

    #[inline]
    pub fn objects(&self) -> &[PlacedObject] {
        &self.objects
    }

    #[inline]
    pub fn plan(&self) -> Option<&ChunkDrawPlan> {
        self.plan.as_ref()
    }

    #[inline]
    pub fn is_building(&self) -> bool {
        self.building
    }

    #[inline]
    pub fn pending_edit_count(&self) -> usize {
        self.pending_edits.len()
    }

    #[inline]
    pub fn needs_mesh(&self) -> bool {
        self.mesh_dirty || self.mesh.is_none()
    }

    #[inline]
    pub fn needs_plan(&self) -> bool {
        self.plan_dirty
    }

    /// Edit revision and the revision of the grid the current mesh was built from.
    #[inline]
    pub fn revisions(&self) -> (u64, u64) {
        (self.rev, self.built_rev)
    }

    pub fn mark_mesh_dirty(&mut self) {
        self.mesh_dirty = true;
    }

    pub fn mark_plan_dirty(&mut self) {
        self.plan_dirty = true;
    }

    /// Replaces one tile, or queues the replacement while a build is in flight.
    pub fn edit_tile(
        &mut self,
        x: usize,
        z: usize,
        cell: TileCell,
    ) -> Result<EditOutcome, GridError> {
        if x >= self.grid.size() || z >= self.grid.size() {
            return Err(GridError::OutOfBounds {
                x,
                z,
                size: self.grid.size(),
            });
        }
        if self.building {
            self.pending_edits.push_back(TileEdit { x, z, cell });
            return Ok(EditOutcome::Queued);
        }
        self.grid.replace(x, z, cell)?;
        self.rev += 1;
        self.mesh_dirty = true;
        Ok(EditOutcome::Applied)
    }

    /// Locks the grid against edits and hands it out for meshing.
    pub fn begin_build(&mut self) -> Result<&TileGrid, BuildStateError> {
        if self.building {
            return Err(BuildStateError::AlreadyBuilding);
        }
        self.building = true;
        self.built_rev = self.rev;
        Ok(&self.grid)
    }

    /// Installs the finished mesh, unlocks the grid and applies the edits
    /// that queued up meanwhile. Returns how many edits were applied; if any,
    /// the chunk is dirty again.
    pub fn complete_build(&mut self, mesh: ChunkMesh) -> Result<usize, BuildStateError> {
        if !self.building {
            return Err(BuildStateError::NotBuilding);
        }
        self.building = false;
        self.mesh = Some(mesh);
        self.shadow_optimized = false;
        self.mesh_dirty = false;
        let mut applied = 0usize;
        while let Some(edit) = self.pending_edits.pop_front() {
            match self.grid.replace(edit.x, edit.z, edit.cell) {
                Ok(_) => applied += 1,
                Err(e) => log::warn!("chunk {:?}: dropping queued edit: {}", self.key, e),
            }
        }
        if applied > 0 {
            self.rev += 1;
            self.mesh_dirty = true;
        }
        Ok(applied)
    }

    pub fn place_object(&mut self, obj: PlacedObject) {
        self.objects.retain(|o| o.id != obj.id);
        self.objects.push(obj);
        self.plan_dirty = true;
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Option<PlacedObject> {
        let pos = self.objects.iter().position(|o| o.id == id)?;
        self.plan_dirty = true;
        Some(self.objects.remove(pos))
    }

    pub(crate) fn install_plan(&mut self, plan: ChunkDrawPlan) {
        self.plan = Some(plan);
        self.plan_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_mesh_cpu::{BuildConfig, UnitRegions, build_chunk_mesh};

    fn record() -> ChunkRecord {
        ChunkRecord::new(
            ChunkKey::default(),
            TileGrid::filled(4, TileCell::solid(1.0, "grass")),
            RoundedCorners::SHARP,
        )
    }

    fn build(r: &mut ChunkRecord) -> ChunkMesh {
        let key = r.key;
        let grid = r.begin_build().unwrap();
        build_chunk_mesh(
            grid,
            key,
            &[key][..],
            &RoundedCorners::SHARP,
            &BuildConfig::default(),
            &UnitRegions,
        )
    }

    #[test]
    fn edits_during_build_wait_for_completion() {
        let mut r = record();
        let mesh = build(&mut r);
        assert!(r.is_building());
        let out = r.edit_tile(1, 1, TileCell::solid(3.0, "rock")).unwrap();
        assert_eq!(out, EditOutcome::Queued);
        assert_eq!(r.grid().get(1, 1).map(|c| c.height), Some(1.0));

        assert_eq!(r.complete_build(mesh), Ok(1));
        assert_eq!(r.grid().get(1, 1).map(|c| c.height), Some(3.0));
        assert!(r.needs_mesh());
        assert_eq!(r.pending_edit_count(), 0);
    }

    #[test]
    fn edits_outside_a_build_apply_at_once() {
        let mut r = record();
        let mesh = build(&mut r);
        r.complete_build(mesh).unwrap();
        assert!(!r.needs_mesh());
        let out = r.edit_tile(0, 0, TileCell::solid(2.0, "rock")).unwrap();
        assert_eq!(out, EditOutcome::Applied);
        assert!(r.needs_mesh());
        assert!(r.edit_tile(9, 0, TileCell::solid(2.0, "rock")).is_err());
    }

    #[test]
    fn build_lock_is_exclusive() {
        let mut r = record();
        let mesh = build(&mut r);
        assert_eq!(r.begin_build().err(), Some(BuildStateError::AlreadyBuilding));
        r.complete_build(mesh).unwrap();
        let again = build_chunk_mesh(
            r.grid(),
            r.key,
            &[r.key][..],
            &RoundedCorners::SHARP,
            &BuildConfig::default(),
            &UnitRegions,
        );
        assert_eq!(r.complete_build(again).err(), Some(BuildStateError::NotBuilding));
    }
}
