//! Render optimizer: turns a chunk's placed objects into instanced, batched or
//! direct draw units, with distance-based LOD.
#![forbid(unsafe_code)]

mod lod;
mod model;
mod optimizer;

pub use lod::{LodCache, LodCacheStats, LodLevel, simplify};
pub use model::{
    GeometryError, MaterialId, Model, ModelGeometry, ModelId, ModelLibrary, ObjectId, PlacedObject,
};
pub use optimizer::{
    ChunkDrawPlan, DrawUnit, FallbackReason, OptimizeDiagnostic, OptimizerConfig, RenderOptimizer,
    Strategy,
};
