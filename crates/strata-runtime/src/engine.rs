use std::time::Instant;

use hashbrown::{HashMap, HashSet};
use strata_geom::Vec3;
use strata_mesh_cpu::{
    ChunkMesh, NeighborsLoaded, RoundedCorners, Surface, TextureRegions, UnitRegions, WeldStats,
    build_chunk_mesh,
};
use strata_optimize::{
    ChunkDrawPlan, LodCacheStats, Model, ModelLibrary, ObjectId, OptimizeDiagnostic, PlacedObject,
    RenderOptimizer,
};
use strata_shadow::{
    CasterKind, NormalTreatment, ShadowBehavior, ShadowCaster, ShadowConfig, SurfaceClass,
    attenuate_edge_normals, classify,
};
use strata_tiles::{ChunkData, ChunkKey, DefectReason, TileCell};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::record::{ChunkRecord, EditOutcome};
use crate::scheduler::{Clock, FrameBudget, FrameScheduler, MonotonicClock, TickReport};

const HORIZONTAL: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Non-fatal problem recorded while loading, building or optimizing.
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    MalformedCell {
        chunk: ChunkKey,
        x: usize,
        z: usize,
        reason: DefectReason,
    },
    Fallback(OptimizeDiagnostic),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EngineStats {
    pub chunks: usize,
    pub queued: usize,
    pub meshes_built: u64,
    pub plans_built: u64,
    pub vertices: usize,
    pub triangles: usize,
    pub objects: usize,
    pub draw_units: usize,
    pub lod_cache: LodCacheStats,
}

/// Single-threaded facade over chunk storage, meshing, shadow policy and the
/// render optimizer. Host loops call [`Engine::tick`] once per frame.
pub struct Engine {
    cfg: EngineConfig,
    chunks: HashMap<ChunkKey, ChunkRecord>,
    scheduler: FrameScheduler,
    optimizer: RenderOptimizer,
    models: ModelLibrary,
    regions: Box<dyn TextureRegions>,
    clock: Box<dyn Clock>,
    viewer: Vec3,
    diagnostics: Vec<Diagnostic>,
    meshes_built: u64,
    plans_built: u64,
}

impl Engine {
    pub fn new(cfg: EngineConfig) -> Result<Self, EngineError> {
        Self::with_parts(cfg, Box::new(UnitRegions), Box::new(MonotonicClock::new()))
    }

    pub fn with_parts(
        cfg: EngineConfig,
        regions: Box<dyn TextureRegions>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, EngineError> {
        cfg.validate()?;
        Ok(Self {
            optimizer: RenderOptimizer::new(cfg.optimizer),
            cfg,
            chunks: HashMap::new(),
            scheduler: FrameScheduler::new(),
            models: ModelLibrary::new(),
            regions,
            clock,
            viewer: Vec3::ZERO,
            diagnostics: Vec::new(),
            meshes_built: 0,
            plans_built: 0,
        })
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    #[inline]
    pub fn chunk(&self, key: ChunkKey) -> Option<&ChunkRecord> {
        self.chunks.get(&key)
    }

    pub fn chunk_keys(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.chunks.keys().copied()
    }

    #[inline]
    pub fn draw_plan(&self, key: ChunkKey) -> Option<&ChunkDrawPlan> {
        self.chunks.get(&key).and_then(ChunkRecord::plan)
    }

    #[inline]
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    #[inline]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Loads a chunk. Malformed cells are reported as diagnostics and left
    /// empty; the chunk itself still loads.
    pub fn add_chunk(
        &mut self,
        data: ChunkData,
        corners: Option<RoundedCorners>,
    ) -> Result<ChunkKey, EngineError> {
        let key = data.key();
        if self.chunks.contains_key(&key) {
            return Err(EngineError::DuplicateChunk(key));
        }
        let ingested = data.into_grid(self.cfg.chunk_size)?;
        for d in &ingested.defects {
            self.diagnostics.push(Diagnostic::MalformedCell {
                chunk: key,
                x: d.local_x,
                z: d.local_z,
                reason: d.reason,
            });
        }
        let corners = corners.unwrap_or_default();
        self.chunks
            .insert(key, ChunkRecord::new(key, ingested.grid, corners));
        self.scheduler.enqueue(key);
        self.requeue_neighbors(key);
        log::info!(
            "chunk ({}, {}, {}) loaded: {} defect(s), rounded={}",
            key.x,
            key.z,
            key.render_order,
            ingested.defects.len(),
            corners.enabled
        );
        Ok(key)
    }

    /// Unloads a chunk, cancelling its queued work. Neighbors are rebuilt so
    /// their faces toward it reappear.
    pub fn remove_chunk(&mut self, key: ChunkKey) -> Result<ChunkRecord, EngineError> {
        let record = self
            .chunks
            .remove(&key)
            .ok_or(EngineError::UnknownChunk(key))?;
        self.scheduler.cancel(key);
        self.requeue_neighbors(key);
        log::info!("chunk ({}, {}, {}) unloaded", key.x, key.z, key.render_order);
        Ok(record)
    }

    pub fn edit_tile(
        &mut self,
        key: ChunkKey,
        x: usize,
        z: usize,
        cell: TileCell,
    ) -> Result<EditOutcome, EngineError> {
        let record = self
            .chunks
            .get_mut(&key)
            .ok_or(EngineError::UnknownChunk(key))?;
        let outcome = record.edit_tile(x, z, cell)?;
        self.scheduler.enqueue(key);
        Ok(outcome)
    }

    pub fn place_object(&mut self, key: ChunkKey, obj: PlacedObject) -> Result<(), EngineError> {
        let record = self
            .chunks
            .get_mut(&key)
            .ok_or(EngineError::UnknownChunk(key))?;
        record.place_object(obj);
        self.scheduler.enqueue(key);
        Ok(())
    }

    pub fn remove_object(
        &mut self,
        key: ChunkKey,
        id: ObjectId,
    ) -> Result<Option<PlacedObject>, EngineError> {
        let record = self
            .chunks
            .get_mut(&key)
            .ok_or(EngineError::UnknownChunk(key))?;
        let removed = record.remove_object(id);
        if removed.is_some() {
            self.scheduler.enqueue(key);
        }
        Ok(removed)
    }

    /// Adds or replaces a model. Chunks that use it are re-optimized.
    pub fn register_model(&mut self, model: Model) -> Option<Model> {
        let id = model.id;
        let previous = self.models.register(model);
        if previous.is_some() {
            self.optimizer.invalidate_model(id);
        }
        for (key, record) in self.chunks.iter_mut() {
            if record.objects().iter().any(|o| o.model == id) {
                record.mark_plan_dirty();
                self.scheduler.enqueue(*key);
            }
        }
        previous
    }

    /// Moves the viewer; chunks holding objects are re-optimized since LOD
    /// depends on distance.
    pub fn set_viewer_position(&mut self, viewer: Vec3) {
        if viewer == self.viewer {
            return;
        }
        self.viewer = viewer;
        for (key, record) in self.chunks.iter_mut() {
            if !record.objects().is_empty() {
                record.mark_plan_dirty();
                self.scheduler.enqueue(*key);
            }
        }
    }

    /// Runs one frame of queued work under the configured budget.
    pub fn tick(&mut self) -> TickReport {
        let budget = self.cfg.frame;
        self.tick_with(&budget)
    }

    /// Runs one frame of queued work under `budget` instead of the configured
    /// one.
    pub fn tick_with(&mut self, budget: &FrameBudget) -> TickReport {
        let Engine {
            cfg,
            chunks,
            scheduler,
            optimizer,
            models,
            regions,
            clock,
            viewer,
            diagnostics,
            meshes_built,
            plans_built,
        } = self;
        let mut worker = Worker {
            cfg,
            chunks,
            optimizer,
            models,
            regions: regions.as_ref(),
            viewer: *viewer,
            diagnostics,
            meshes_built,
            plans_built,
            requeue: Vec::new(),
        };
        let report = scheduler.tick(budget, clock.as_ref(), |key| worker.run(key));
        for key in std::mem::take(&mut worker.requeue) {
            scheduler.enqueue(key);
        }
        report
    }

    /// Ticks until nothing is queued or `max_ticks` frames have passed.
    pub fn run_until_idle(&mut self, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while !self.scheduler.is_empty() && ticks < max_ticks {
            self.tick();
            ticks += 1;
        }
        ticks
    }

    pub fn set_shadows_enabled(&mut self, on: bool) {
        let shadows = self.cfg.shadows.with_shadows_enabled(on);
        self.apply_shadow_config(shadows);
    }

    /// `true` selects the global bias mode, `false` the per-surface one.
    pub fn set_terrain_shadow_bias(&mut self, on: bool) {
        let shadows = self.cfg.shadows.with_terrain_bias(on);
        self.apply_shadow_config(shadows);
    }

    /// `true` selects the per-surface bias mode, `false` the global one.
    pub fn set_per_material_shadow_bias(&mut self, on: bool) {
        let shadows = self.cfg.shadows.with_per_material_bias(on);
        self.apply_shadow_config(shadows);
    }

    fn apply_shadow_config(&mut self, shadows: ShadowConfig) {
        if shadows == self.cfg.shadows {
            return;
        }
        log::info!(
            "shadows: enabled={} bias={:?}",
            shadows.shadows_enabled,
            shadows.bias_mode
        );
        self.cfg = self.cfg.clone().with_shadows(shadows);
        for record in self.chunks.values_mut() {
            reclassify(record, &shadows);
        }
    }

    /// Welds every loaded mesh now and every mesh built from here on.
    pub fn weld_chunk_edges(&mut self) -> WeldStats {
        self.cfg = self.cfg.clone().with_auto_weld(true);
        let eps = self.cfg.weld_epsilon;
        let mut total = WeldStats::default();
        for record in self.chunks.values_mut() {
            let reattenuate = record.is_shadow_optimized();
            let Some(mesh) = record.mesh_mut() else {
                continue;
            };
            let s = mesh.weld(eps);
            // Welding recomputes normals, which undoes edge attenuation.
            if reattenuate && let Some(edge) = mesh.parts.get_mut(&Surface::Edge) {
                attenuate_edge_normals(edge);
            }
            total.merged_vertices += s.merged_vertices;
            total.dropped_triangles += s.dropped_triangles;
        }
        log::info!(
            "weld: merged {} vertices, dropped {} triangles",
            total.merged_vertices,
            total.dropped_triangles
        );
        total
    }

    /// Turns on edge-normal attenuation and applies it to every loaded mesh
    /// that does not have it yet. Returns how many chunks changed.
    pub fn optimize_chunk_shadows(&mut self) -> usize {
        let shadows = self.cfg.shadows.with_optimize_chunk_shadows(true);
        self.cfg = self.cfg.clone().with_shadows(shadows);
        let mut changed = 0;
        for record in self.chunks.values_mut() {
            if record.is_shadow_optimized() {
                continue;
            }
            let Some(mesh) = record.mesh_mut() else {
                continue;
            };
            if let Some(edge) = mesh.parts.get_mut(&Surface::Edge) {
                attenuate_edge_normals(edge);
            }
            record.set_shadow_optimized(true);
            reclassify(record, &shadows);
            changed += 1;
        }
        changed
    }

    /// Switches between atlas and per-chunk canvas UVs; every chunk is rebuilt.
    pub fn set_canvas_texture_mode(&mut self, enabled: bool, tile_resolution: u32) {
        self.cfg = self
            .cfg
            .clone()
            .with_canvas_textures(enabled, tile_resolution);
        for (key, record) in self.chunks.iter_mut() {
            record.mark_mesh_dirty();
            self.scheduler.enqueue(*key);
        }
    }

    /// Shadow casters for the current scene: one per chunk surface and one per
    /// placed object. Pass them to [`strata_shadow::DepthPass::begin`].
    pub fn shadow_casters(&self) -> Vec<ShadowCaster> {
        let mut out = Vec::new();
        let mut next_id = 0u64;
        let mut keys: Vec<ChunkKey> = self.chunks.keys().copied().collect();
        keys.sort();
        for key in keys {
            let Some(record) = self.chunks.get(&key) else {
                continue;
            };
            for surface in Surface::ALL {
                let Some(behavior) = record.shadow(surface) else {
                    continue;
                };
                if behavior.cast {
                    out.push(ShadowCaster {
                        id: next_id,
                        kind: CasterKind::Terrain,
                        translation: Vec3::ZERO,
                        behavior: *behavior,
                    });
                }
                next_id += 1;
            }
            let dynamic = classify(SurfaceClass::Dynamic, &self.cfg.shadows);
            if dynamic.cast {
                for obj in record.objects() {
                    out.push(ShadowCaster {
                        id: obj.id.0,
                        kind: CasterKind::Dynamic,
                        translation: obj.transform.translation,
                        behavior: dynamic,
                    });
                }
            }
        }
        out
    }

    pub fn stats(&self) -> EngineStats {
        let mut s = EngineStats {
            chunks: self.chunks.len(),
            queued: self.scheduler.len(),
            meshes_built: self.meshes_built,
            plans_built: self.plans_built,
            lod_cache: self.optimizer.lod_cache().stats(),
            ..EngineStats::default()
        };
        for record in self.chunks.values() {
            if let Some(mesh) = record.mesh() {
                s.vertices += mesh.vertex_count();
                s.triangles += mesh.triangle_count();
            }
            s.objects += record.objects().len();
            s.draw_units += record.plan().map_or(0, ChunkDrawPlan::draw_count);
        }
        s
    }

    fn requeue_neighbors(&mut self, key: ChunkKey) {
        for (dx, dz) in HORIZONTAL {
            let Some(nk) = key.checked_offset(dx, dz) else {
                continue;
            };
            if let Some(record) = self.chunks.get_mut(&nk) {
                record.mark_mesh_dirty();
                self.scheduler.enqueue(nk);
            }
        }
    }
}

fn reclassify(record: &mut ChunkRecord, shadows: &ShadowConfig) {
    let Some(mesh) = record.mesh() else {
        return;
    };
    let attenuated = record.is_shadow_optimized();
    let behaviors = mesh
        .parts
        .keys()
        .map(|&surface| {
            let mut b = classify(SurfaceClass::Terrain(surface), shadows);
            // The attached treatment follows the normals actually stored.
            b.normals = if surface == Surface::Edge && attenuated {
                NormalTreatment::AttenuatedEdge
            } else {
                NormalTreatment::Unmodified
            };
            (surface, b)
        })
        .collect::<HashMap<Surface, ShadowBehavior>>();
    record.set_shadows(behaviors);
}

/// Borrowed engine state a scheduled job works on.
struct Worker<'a> {
    cfg: &'a EngineConfig,
    chunks: &'a mut HashMap<ChunkKey, ChunkRecord>,
    optimizer: &'a mut RenderOptimizer,
    models: &'a ModelLibrary,
    regions: &'a dyn TextureRegions,
    viewer: Vec3,
    diagnostics: &'a mut Vec<Diagnostic>,
    meshes_built: &'a mut u64,
    plans_built: &'a mut u64,
    requeue: Vec<ChunkKey>,
}

impl Worker<'_> {
    fn run(&mut self, key: ChunkKey) {
        let t0 = Instant::now();
        let snapshot = NeighborsLoaded::from_presence(key, &*self.chunks);
        let Some(record) = self.chunks.get(&key) else {
            return;
        };
        let stale = record
            .mesh()
            .is_some_and(|m| m.neighbors != snapshot);
        let mut built = false;
        if record.needs_mesh() || stale {
            match self.rebuild(key) {
                Ok(()) => built = true,
                Err(e) => log::warn!("chunk {:?}: build skipped: {}", key, e),
            }
        }
        let mut planned = false;
        if let Some(record) = self.chunks.get_mut(&key)
            && record.needs_plan()
        {
            let plan = self
                .optimizer
                .optimize_chunk(key, record.objects(), self.viewer, self.models);
            self.diagnostics.extend(
                plan.diagnostics
                    .iter()
                    .cloned()
                    .map(Diagnostic::Fallback),
            );
            record.install_plan(plan);
            *self.plans_built += 1;
            planned = true;
        }
        let ms = t0.elapsed().as_millis();
        log::debug!(target: "perf", "ms={} chunk_job key=({}, {}, {}) built={} planned={}", ms, key.x, key.z, key.render_order, built, planned);
    }

    fn rebuild(&mut self, key: ChunkKey) -> Result<(), EngineError> {
        let presence: HashSet<ChunkKey> = std::iter::once(key)
            .chain(HORIZONTAL.iter().filter_map(|&(dx, dz)| key.checked_offset(dx, dz)))
            .filter(|k| self.chunks.contains_key(k))
            .collect();
        let build_cfg = self.cfg.build_config();
        let shadows = self.cfg.shadows;
        let record = self
            .chunks
            .get_mut(&key)
            .ok_or(EngineError::UnknownChunk(key))?;
        let corners = *record.corners();
        let grid = record.begin_build()?;
        let mut mesh = build_chunk_mesh(grid, key, &presence, &corners, &build_cfg, self.regions);
        let attenuated = finish_mesh(&mut mesh, self.cfg);
        let applied = record.complete_build(mesh)?;
        record.set_shadow_optimized(attenuated);
        reclassify(record, &shadows);
        *self.meshes_built += 1;
        if applied > 0 {
            self.requeue.push(key);
        }
        Ok(())
    }
}

/// Post-build passes selected by the config. Returns whether edge normals
/// were attenuated.
fn finish_mesh(mesh: &mut ChunkMesh, cfg: &EngineConfig) -> bool {
    if cfg.auto_weld {
        mesh.weld(cfg.weld_epsilon);
    }
    if !cfg.shadows.edge_attenuation() {
        return false;
    }
    if let Some(edge) = mesh.parts.get_mut(&Surface::Edge) {
        attenuate_edge_normals(edge);
    }
    true
}
