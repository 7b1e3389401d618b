//! Chunk keys, tile cells, tile grids and validated chunk ingestion.
#![forbid(unsafe_code)]

pub mod cell;
pub mod coord;
pub mod grid;
pub mod ingest;

pub use cell::{TextureRef, TileCell};
pub use coord::{ChunkKey, ChunkPresence};
pub use grid::{GridError, TileGrid};
pub use ingest::{CellDefect, ChunkData, DefTexture, DefectReason, IngestError, IngestedChunk, RawTileCell};
