//! Shadow policy: how chunk surfaces and dynamic objects cast, receive and
//! bias shadows.
#![forbid(unsafe_code)]

mod attenuate;
mod config;
mod depth_pass;

pub use attenuate::{attenuate_edge_normals, attenuated_normal};
pub use config::{
    MAX_SHADOW_MAP_SIZE, MIN_SHADOW_MAP_SIZE, ShadowBiasMode, ShadowConfig, ShadowDebug,
};
pub use depth_pass::{CasterKind, DepthPass, ShadowCaster};

use strata_mesh_cpu::Surface;

/// What a shadow decision is made about.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceClass {
    Terrain(Surface),
    Dynamic,
}

impl SurfaceClass {
    #[inline]
    pub fn is_terrain(self) -> bool {
        matches!(self, SurfaceClass::Terrain(_))
    }

    pub fn caster_kind(self) -> CasterKind {
        match self {
            SurfaceClass::Terrain(_) => CasterKind::Terrain,
            SurfaceClass::Dynamic => CasterKind::Dynamic,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum NormalTreatment {
    #[default]
    Unmodified,
    AttenuatedEdge,
}

/// Shadow flags attached to a built surface.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ShadowBehavior {
    pub cast: bool,
    pub receive: bool,
    /// Position offset applied during the depth pass (per-surface mode) or the
    /// shared depth bias (global mode).
    pub bias: f32,
    pub normals: NormalTreatment,
}

/// Pure shadow policy for one surface class.
///
/// Terrain-only debug overrides never touch dynamic objects. Water is drawn by
/// its own shader and does not cast.
pub fn classify(class: SurfaceClass, cfg: &ShadowConfig) -> ShadowBehavior {
    let terrain = class.is_terrain();
    let water = class == SurfaceClass::Terrain(Surface::Water);
    let cast = cfg.shadows_enabled && !water && !(terrain && cfg.debug.no_chunk_shadow_casting);
    let receive = cfg.shadows_enabled && !(terrain && cfg.debug.no_chunk_shadows);
    let bias = match (cfg.bias_mode, cast) {
        (_, false) => 0.0,
        (ShadowBiasMode::PerSurface, true) if terrain => cfg.terrain_bias,
        (ShadowBiasMode::PerSurface, true) => 0.0,
        (ShadowBiasMode::Global, true) => cfg.global_bias,
    };
    let normals = if class == SurfaceClass::Terrain(Surface::Edge) && cfg.edge_attenuation() {
        NormalTreatment::AttenuatedEdge
    } else {
        NormalTreatment::Unmodified
    };
    ShadowBehavior {
        cast,
        receive,
        bias,
        normals,
    }
}
