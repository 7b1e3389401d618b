use serde::{Deserialize, Serialize};

pub const MIN_SHADOW_MAP_SIZE: u32 = 256;
pub const MAX_SHADOW_MAP_SIZE: u32 = 8192;

/// Which of the two mutually exclusive bias schemes is active.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowBiasMode {
    /// Terrain is pushed away from the light during the depth pass only;
    /// dynamic objects get no bias.
    #[default]
    PerSurface,
    /// One depth bias for every caster.
    Global,
}

impl ShadowBiasMode {
    /// Resolves the pair of raw toggles into one mode. Both set is a
    /// configuration conflict: per-surface wins and a warning is logged.
    /// Neither set falls back to the global mode.
    pub fn from_flags(per_material: bool, terrain: bool) -> Self {
        match (per_material, terrain) {
            (true, true) => {
                log::warn!(
                    "both per-material and terrain shadow bias requested; using per-material"
                );
                ShadowBiasMode::PerSurface
            }
            (true, false) => ShadowBiasMode::PerSurface,
            (false, _) => ShadowBiasMode::Global,
        }
    }
}

/// Terrain-only overrides used by tests and debugging.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowDebug {
    /// Chunk surfaces never receive shadows.
    pub no_chunk_shadows: bool,
    /// Chunk surfaces never cast shadows.
    pub no_chunk_shadow_casting: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub shadows_enabled: bool,
    pub enhanced_quality: bool,
    pub bias_mode: ShadowBiasMode,
    /// World-space offset applied to terrain in per-surface mode.
    pub terrain_bias: f32,
    pub global_bias: f32,
    pub shadow_map_size: u32,
    pub optimize_chunk_shadows: bool,
    pub debug: ShadowDebug,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            shadows_enabled: true,
            enhanced_quality: false,
            bias_mode: ShadowBiasMode::PerSurface,
            terrain_bias: 0.05,
            global_bias: 0.0005,
            shadow_map_size: 2048,
            optimize_chunk_shadows: false,
            debug: ShadowDebug::default(),
        }
    }
}

impl ShadowConfig {
    pub fn with_shadows_enabled(self, on: bool) -> Self {
        Self {
            shadows_enabled: on,
            ..self
        }
    }

    pub fn with_bias_mode(self, bias_mode: ShadowBiasMode) -> Self {
        Self { bias_mode, ..self }
    }

    /// `true` selects per-surface bias, `false` the global one.
    pub fn with_per_material_bias(self, on: bool) -> Self {
        self.with_bias_mode(if on {
            ShadowBiasMode::PerSurface
        } else {
            ShadowBiasMode::Global
        })
    }

    /// `true` selects the global terrain bias, `false` per-surface.
    pub fn with_terrain_bias(self, on: bool) -> Self {
        self.with_bias_mode(if on {
            ShadowBiasMode::Global
        } else {
            ShadowBiasMode::PerSurface
        })
    }

    pub fn with_enhanced_quality(self, on: bool) -> Self {
        Self {
            enhanced_quality: on,
            ..self
        }
    }

    pub fn with_optimize_chunk_shadows(self, on: bool) -> Self {
        Self {
            optimize_chunk_shadows: on,
            ..self
        }
    }

    pub fn with_shadow_map_size(self, shadow_map_size: u32) -> Self {
        Self {
            shadow_map_size,
            ..self
        }
    }

    pub fn with_debug(self, debug: ShadowDebug) -> Self {
        Self { debug, ..self }
    }

    /// Depth-map resolution actually allocated by the renderer.
    pub fn effective_map_size(&self) -> u32 {
        let base = self.shadow_map_size.clamp(MIN_SHADOW_MAP_SIZE, MAX_SHADOW_MAP_SIZE);
        if self.enhanced_quality {
            base.saturating_mul(2).min(MAX_SHADOW_MAP_SIZE)
        } else {
            base
        }
    }

    /// Boundary side faces get attenuated normals when either the explicit
    /// optimization or enhanced quality is on.
    #[inline]
    pub fn edge_attenuation(&self) -> bool {
        self.optimize_chunk_shadows || self.enhanced_quality
    }
}
