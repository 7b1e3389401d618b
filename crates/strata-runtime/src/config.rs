use std::error::Error;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_mesh_cpu::BuildConfig;
use strata_mesh_cpu::constants::{DEFAULT_DEPRESSION_DEPTH, DEFAULT_UV_INSET, DEFAULT_WELD_EPSILON};
use strata_mesh_cpu::uv::UvLayout;
use strata_optimize::OptimizerConfig;
use strata_shadow::{ShadowBiasMode, ShadowConfig};

use crate::error::EngineError;
use crate::scheduler::FrameBudget;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasTextures {
    pub enabled: bool,
    /// Pixels per tile edge in the chunk canvas.
    pub tile_resolution: u32,
}

impl Default for CanvasTextures {
    fn default() -> Self {
        Self {
            enabled: false,
            tile_resolution: 32,
        }
    }
}

/// Engine settings. Values are never mutated in place; the engine's set
/// operations swap in a copy made with the `with_*` builders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chunk_size: usize,
    pub stride: f32,
    pub depression_depth: f32,
    pub floor: f32,
    pub uv_inset: f32,
    pub canvas: CanvasTextures,
    pub weld_epsilon: f32,
    /// Weld every mesh as it is built.
    pub auto_weld: bool,
    pub shadows: ShadowConfig,
    pub optimizer: OptimizerConfig,
    pub frame: FrameBudget,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            stride: 1.0,
            depression_depth: DEFAULT_DEPRESSION_DEPTH,
            floor: 0.0,
            uv_inset: DEFAULT_UV_INSET,
            canvas: CanvasTextures::default(),
            weld_epsilon: DEFAULT_WELD_EPSILON,
            auto_weld: false,
            shadows: ShadowConfig::default(),
            optimizer: OptimizerConfig::default(),
            frame: FrameBudget::default(),
        }
    }
}

/// Legacy pair of bias toggles; resolved into [`ShadowBiasMode`] on load.
#[derive(Deserialize, Default)]
#[serde(default)]
struct BiasFlags {
    use_per_material_shadow_bias: Option<bool>,
    use_terrain_shadow_bias: Option<bool>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct BiasSection {
    shadow_bias: BiasFlags,
}

impl EngineConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        let mut cfg: EngineConfig = toml::from_str(toml_str)?;
        let flags: BiasSection = toml::from_str(toml_str)?;
        let shadows = cfg.shadows;
        cfg.shadows = match (
            flags.shadow_bias.use_per_material_shadow_bias,
            flags.shadow_bias.use_terrain_shadow_bias,
        ) {
            (Some(pm), Some(t)) => shadows.with_bias_mode(ShadowBiasMode::from_flags(pm, t)),
            (Some(pm), None) => shadows.with_per_material_bias(pm),
            (None, Some(t)) => shadows.with_terrain_bias(t),
            (None, None) => shadows,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        let cfg = Self::from_toml_str(&s)?;
        log::info!(
            "loaded engine config from {}: chunk_size={} stride={} bias={:?}",
            path.display(),
            cfg.chunk_size,
            cfg.stride,
            cfg.shadows.bias_mode
        );
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.chunk_size == 0 {
            return Err(EngineError::InvalidConfig("chunk_size must be positive".into()));
        }
        if !(self.stride.is_finite() && self.stride > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "stride must be a positive number, got {}",
                self.stride
            )));
        }
        if !(self.weld_epsilon.is_finite() && self.weld_epsilon > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "weld_epsilon must be a positive number, got {}",
                self.weld_epsilon
            )));
        }
        Ok(())
    }

    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            stride: self.stride,
            depression_depth: self.depression_depth,
            floor: self.floor,
            uv_inset: self.uv_inset,
            uv_layout: if self.canvas.enabled {
                UvLayout::Canvas {
                    tile_resolution: self.canvas.tile_resolution,
                }
            } else {
                UvLayout::Atlas
            },
        }
    }

    pub fn with_chunk_size(self, chunk_size: usize) -> Self {
        Self { chunk_size, ..self }
    }

    pub fn with_stride(self, stride: f32) -> Self {
        Self { stride, ..self }
    }

    pub fn with_canvas_textures(self, enabled: bool, tile_resolution: u32) -> Self {
        Self {
            canvas: CanvasTextures {
                enabled,
                tile_resolution,
            },
            ..self
        }
    }

    pub fn with_auto_weld(self, auto_weld: bool) -> Self {
        Self { auto_weld, ..self }
    }

    pub fn with_shadows(self, shadows: ShadowConfig) -> Self {
        Self { shadows, ..self }
    }

    pub fn with_optimizer(self, optimizer: OptimizerConfig) -> Self {
        Self { optimizer, ..self }
    }

    pub fn with_frame_budget(self, frame: FrameBudget) -> Self {
        Self { frame, ..self }
    }
}
