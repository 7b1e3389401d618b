//! Chunk ingestion: loosely-shaped chunk payloads validated once into a
//! [`TileGrid`]. Bad cells never fail the chunk; they become empty slots and a
//! [`CellDefect`] the caller can report.

use std::error::Error;

use serde::Deserialize;

use crate::cell::{TextureRef, TileCell};
use crate::coord::ChunkKey;
use crate::grid::TileGrid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    #[error("chunk size must be positive")]
    ZeroChunkSize,
}

/// Chunk payload as produced by the loader (`{ x, y, renderOrder, defTexture, data }`).
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChunkData {
    pub x: i32,
    /// Second horizontal axis; becomes `ChunkKey::z`.
    pub y: i32,
    #[serde(default)]
    pub render_order: Option<i32>,
    #[serde(default)]
    pub def_texture: DefTexture,
    #[serde(default)]
    pub data: Vec<RawTileCell>,
}

/// Chunk-wide texture fallbacks for cells that omit their own.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct DefTexture {
    #[serde(default)]
    pub top: Option<TextureRef>,
    #[serde(default)]
    pub middle: Option<TextureRef>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawTileCell {
    #[serde(default)]
    pub z: Option<f32>,
    #[serde(default)]
    pub is_depressed: Option<bool>,
    #[serde(default)]
    pub top: Option<TextureRef>,
    #[serde(default)]
    pub middle: Option<TextureRef>,
    #[serde(default)]
    pub is_water: Option<bool>,
    #[serde(default)]
    pub lighting: Option<f32>,
    #[serde(default)]
    pub roads: Vec<toml::Value>,
    #[serde(default)]
    pub speckles: Vec<toml::Value>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DefectReason {
    MissingHeight,
    NonFiniteHeight,
    MissingTopTexture,
    /// The payload had fewer cells than the grid needs.
    MissingCell,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellDefect {
    pub local_x: usize,
    pub local_z: usize,
    pub reason: DefectReason,
}

#[derive(Debug, Clone)]
pub struct IngestedChunk {
    pub key: ChunkKey,
    pub grid: TileGrid,
    pub defects: Vec<CellDefect>,
    /// Cells beyond `chunk_size * chunk_size` that were dropped.
    pub surplus: usize,
}

impl ChunkData {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        Ok(toml::from_str(toml_str)?)
    }

    #[inline]
    pub fn key(&self) -> ChunkKey {
        ChunkKey::new(self.x, self.y, self.render_order.unwrap_or(0))
    }

    /// Validates every cell and lays them out in a `chunk_size` square grid.
    pub fn into_grid(self, chunk_size: usize) -> Result<IngestedChunk, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::ZeroChunkSize);
        }
        let key = self.key();
        let expect = chunk_size * chunk_size;
        let surplus = self.data.len().saturating_sub(expect);
        let mut defects = Vec::new();
        let mut slots = Vec::with_capacity(expect);
        let mut raw = self.data.into_iter();
        for i in 0..expect {
            let (local_x, local_z) = (i % chunk_size, i / chunk_size);
            let slot = match raw.next() {
                Some(cell) => match validate_cell(cell, &self.def_texture) {
                    Ok(c) => Some(c),
                    Err(reason) => {
                        defects.push(CellDefect {
                            local_x,
                            local_z,
                            reason,
                        });
                        None
                    }
                },
                None => {
                    defects.push(CellDefect {
                        local_x,
                        local_z,
                        reason: DefectReason::MissingCell,
                    });
                    None
                }
            };
            slots.push(slot);
        }
        if !defects.is_empty() {
            log::warn!(
                "chunk ({}, {}, {}) ingested with {} malformed cell(s)",
                key.x,
                key.z,
                key.render_order,
                defects.len()
            );
        }
        if surplus > 0 {
            log::warn!(
                "chunk ({}, {}, {}) carried {} surplus cell(s); dropped",
                key.x,
                key.z,
                key.render_order,
                surplus
            );
        }
        Ok(IngestedChunk {
            key,
            grid: TileGrid::from_slots(chunk_size, slots),
            defects,
            surplus,
        })
    }
}

/// Resolves defaults and rejects cells the mesher cannot draw.
pub fn validate_cell(raw: RawTileCell, defaults: &DefTexture) -> Result<TileCell, DefectReason> {
    let height = raw.z.ok_or(DefectReason::MissingHeight)?;
    if !height.is_finite() {
        return Err(DefectReason::NonFiniteHeight);
    }
    let top = raw
        .top
        .or_else(|| defaults.top.clone())
        .ok_or(DefectReason::MissingTopTexture)?;
    let middle = raw
        .middle
        .or_else(|| defaults.middle.clone())
        .unwrap_or_else(|| top.clone());
    let lighting = raw
        .lighting
        .filter(|l| l.is_finite())
        .map(|l| l.clamp(0.0, 1.0))
        .unwrap_or(1.0);
    Ok(TileCell {
        height,
        depressed: raw.is_depressed.unwrap_or(false),
        top,
        middle,
        water: raw.is_water.unwrap_or(false),
        lighting,
        roads: raw.roads,
        speckles: raw.speckles,
    })
}
