use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use strata_geom::{Transform, Vec3};
use strata_tiles::ChunkKey;

use crate::lod::{LodCache, LodLevel};
use crate::model::{
    GeometryError, MaterialId, Model, ModelGeometry, ModelId, ModelLibrary, ObjectId, PlacedObject,
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Objects at or beyond this distance from the viewer use reduced geometry.
    pub lod_distance: f32,
    /// Target vertex fraction of the reduced variant.
    pub lod_ratio: f32,
    /// Instancing is considered only up to this many distinct models per chunk.
    pub instancing_model_threshold: usize,
    /// Vertex ceiling of one merged batch.
    pub max_batch_vertices: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            lod_distance: 50.0,
            lod_ratio: 0.5,
            instancing_model_threshold: 10,
            max_batch_vertices: 1 << 20,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    Instancing,
    Batching,
}

#[derive(Clone, Debug)]
pub enum DrawUnit {
    /// One shared geometry drawn once per transform.
    Instanced {
        model: ModelId,
        lod: LodLevel,
        material: MaterialId,
        geometry: Arc<ModelGeometry>,
        objects: Vec<ObjectId>,
        transforms: Vec<Transform>,
    },
    /// World-space geometry of several objects sharing a material.
    Batched {
        material: MaterialId,
        geometry: ModelGeometry,
        objects: Vec<ObjectId>,
    },
    /// The object drawn on its own. `geometry` is `None` only when its model is
    /// not registered.
    Direct {
        object: ObjectId,
        model: ModelId,
        lod: LodLevel,
        material: Option<MaterialId>,
        geometry: Option<Arc<ModelGeometry>>,
        transform: Transform,
    },
}

impl DrawUnit {
    pub fn object_count(&self) -> usize {
        match self {
            DrawUnit::Instanced { objects, .. } | DrawUnit::Batched { objects, .. } => {
                objects.len()
            }
            DrawUnit::Direct { .. } => 1,
        }
    }

    pub fn objects(&self) -> Vec<ObjectId> {
        match self {
            DrawUnit::Instanced { objects, .. } | DrawUnit::Batched { objects, .. } => {
                objects.clone()
            }
            DrawUnit::Direct { object, .. } => vec![*object],
        }
    }

    #[inline]
    pub fn is_direct(&self) -> bool {
        matches!(self, DrawUnit::Direct { .. })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FallbackReason {
    MissingModel(ModelId),
    Construction(GeometryError),
}

/// Non-fatal problem found while optimizing a chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizeDiagnostic {
    pub chunk: ChunkKey,
    pub objects: Vec<ObjectId>,
    pub reason: FallbackReason,
}

#[derive(Clone, Debug)]
pub struct ChunkDrawPlan {
    pub key: ChunkKey,
    pub strategy: Strategy,
    pub units: Vec<DrawUnit>,
    pub diagnostics: Vec<OptimizeDiagnostic>,
}

impl ChunkDrawPlan {
    #[inline]
    pub fn draw_count(&self) -> usize {
        self.units.len()
    }

    pub fn object_count(&self) -> usize {
        self.units.iter().map(DrawUnit::object_count).sum()
    }

    pub fn direct_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_direct()).count()
    }
}

struct Resolved<'a> {
    obj: &'a PlacedObject,
    model: &'a Model,
    lod: LodLevel,
}

/// Groups a chunk's objects into draw units.
///
/// Every object appears in exactly one unit and keeps its transform and
/// material. Groups that cannot be built, or that hold a single object, are
/// drawn directly.
pub struct RenderOptimizer {
    cfg: OptimizerConfig,
    lod_cache: LodCache,
}

impl RenderOptimizer {
    pub fn new(cfg: OptimizerConfig) -> Self {
        Self {
            cfg,
            lod_cache: LodCache::new(cfg.lod_ratio),
        }
    }

    #[inline]
    pub fn config(&self) -> &OptimizerConfig {
        &self.cfg
    }

    #[inline]
    pub fn lod_cache(&self) -> &LodCache {
        &self.lod_cache
    }

    /// Drops the cached reduced variant of a model that was replaced.
    pub fn invalidate_model(&mut self, id: ModelId) {
        self.lod_cache.invalidate(id);
    }

    pub fn optimize_chunk(
        &mut self,
        key: ChunkKey,
        objects: &[PlacedObject],
        viewer: Vec3,
        models: &ModelLibrary,
    ) -> ChunkDrawPlan {
        let t0 = Instant::now();
        let mut units = Vec::new();
        let mut diagnostics = Vec::new();
        let mut resolved = Vec::with_capacity(objects.len());

        for obj in objects {
            let distance = obj.transform.translation.distance(viewer);
            let lod = LodLevel::pick(distance, self.cfg.lod_distance);
            match models.get(obj.model) {
                Some(model) => resolved.push(Resolved { obj, model, lod }),
                None => {
                    log::warn!("optimizer: object {:?} references unknown model {:?}", obj.id, obj.model);
                    diagnostics.push(OptimizeDiagnostic {
                        chunk: key,
                        objects: vec![obj.id],
                        reason: FallbackReason::MissingModel(obj.model),
                    });
                    units.push(DrawUnit::Direct {
                        object: obj.id,
                        model: obj.model,
                        lod,
                        material: None,
                        geometry: None,
                        transform: obj.transform,
                    });
                }
            }
        }

        let mut per_model: BTreeMap<ModelId, usize> = BTreeMap::new();
        for r in &resolved {
            *per_model.entry(r.model.id).or_default() += 1;
        }
        let repeats = per_model.values().any(|&n| n > 1);
        let strategy = if per_model.len() <= self.cfg.instancing_model_threshold && repeats {
            Strategy::Instancing
        } else {
            Strategy::Batching
        };

        match strategy {
            Strategy::Instancing => self.instance(key, resolved, &mut units, &mut diagnostics),
            Strategy::Batching => self.batch(key, resolved, &mut units, &mut diagnostics),
        }

        let ms = t0.elapsed().as_millis();
        log::debug!(target: "perf", "ms={} optimize_chunk key=({}, {}, {}) objects={} units={} strategy={:?} fallbacks={}", ms, key.x, key.z, key.render_order, objects.len(), units.len(), strategy, diagnostics.len());

        ChunkDrawPlan {
            key,
            strategy,
            units,
            diagnostics,
        }
    }

    fn instance(
        &mut self,
        key: ChunkKey,
        resolved: Vec<Resolved<'_>>,
        units: &mut Vec<DrawUnit>,
        diagnostics: &mut Vec<OptimizeDiagnostic>,
    ) {
        let mut groups: BTreeMap<(ModelId, LodLevel), Vec<Resolved<'_>>> = BTreeMap::new();
        for r in resolved {
            groups.entry((r.model.id, r.lod)).or_default().push(r);
        }
        for ((model_id, lod), members) in groups {
            if members.len() == 1 {
                self.direct(&members, units);
                continue;
            }
            let model = members[0].model;
            match self.lod_cache.geometry(model, lod) {
                Ok(geometry) => units.push(DrawUnit::Instanced {
                    model: model_id,
                    lod,
                    material: model.material,
                    geometry,
                    objects: members.iter().map(|r| r.obj.id).collect(),
                    transforms: members.iter().map(|r| r.obj.transform).collect(),
                }),
                Err(e) => {
                    self.record_failure(key, &members, e, diagnostics);
                    self.direct(&members, units);
                }
            }
        }
    }

    fn batch(
        &mut self,
        key: ChunkKey,
        resolved: Vec<Resolved<'_>>,
        units: &mut Vec<DrawUnit>,
        diagnostics: &mut Vec<OptimizeDiagnostic>,
    ) {
        let mut groups: BTreeMap<MaterialId, Vec<Resolved<'_>>> = BTreeMap::new();
        for r in resolved {
            groups.entry(r.model.material).or_default().push(r);
        }
        for (material, members) in groups {
            if members.len() == 1 {
                self.direct(&members, units);
                continue;
            }
            match self.merge(&members) {
                Ok(geometry) => units.push(DrawUnit::Batched {
                    material,
                    geometry,
                    objects: members.iter().map(|r| r.obj.id).collect(),
                }),
                Err(e) => {
                    self.record_failure(key, &members, e, diagnostics);
                    self.direct(&members, units);
                }
            }
        }
    }

    fn merge(&mut self, members: &[Resolved<'_>]) -> Result<ModelGeometry, GeometryError> {
        let mut out = ModelGeometry::default();
        for r in members {
            let g = self.lod_cache.geometry(r.model, r.lod)?;
            out.append_transformed(&g, &r.obj.transform, self.cfg.max_batch_vertices)?;
        }
        Ok(out)
    }

    fn direct(&mut self, members: &[Resolved<'_>], units: &mut Vec<DrawUnit>) {
        for r in members {
            // A variant that cannot be built still leaves the full model drawable.
            let geometry = self
                .lod_cache
                .geometry(r.model, r.lod)
                .unwrap_or_else(|_| r.model.geometry.clone());
            units.push(DrawUnit::Direct {
                object: r.obj.id,
                model: r.model.id,
                lod: r.lod,
                material: Some(r.model.material),
                geometry: Some(geometry),
                transform: r.obj.transform,
            });
        }
    }

    fn record_failure(
        &self,
        key: ChunkKey,
        members: &[Resolved<'_>],
        err: GeometryError,
        diagnostics: &mut Vec<OptimizeDiagnostic>,
    ) {
        log::warn!(
            "optimizer: chunk ({}, {}, {}) falling back to direct draws for {} object(s): {}",
            key.x,
            key.z,
            key.render_order,
            members.len(),
            err
        );
        diagnostics.push(OptimizeDiagnostic {
            chunk: key,
            objects: members.iter().map(|r| r.obj.id).collect(),
            reason: FallbackReason::Construction(err),
        });
    }
}
