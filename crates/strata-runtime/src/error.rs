use strata_tiles::{ChunkKey, GridError, IngestError};

use crate::record::BuildStateError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("chunk ({}, {}, {}) is already loaded", .0.x, .0.z, .0.render_order)]
    DuplicateChunk(ChunkKey),
    #[error("chunk ({}, {}, {}) is not loaded", .0.x, .0.z, .0.render_order)]
    UnknownChunk(ChunkKey),
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    BuildState(#[from] BuildStateError),
}
