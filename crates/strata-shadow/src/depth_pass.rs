use std::ops::Deref;

use strata_geom::Vec3;

use crate::ShadowBehavior;
use crate::config::{ShadowBiasMode, ShadowConfig};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CasterKind {
    Terrain,
    Dynamic,
}

/// A shadow-casting object as the depth pass sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowCaster {
    pub id: u64,
    pub kind: CasterKind,
    pub translation: Vec3,
    pub behavior: ShadowBehavior,
}

/// Scope of one shadow depth pass.
///
/// In per-surface mode, terrain casters are offset along the light direction
/// by their bias when the pass begins, and the saved translations are written
/// back when the guard drops, so the color pass never sees the offset.
pub struct DepthPass<'a> {
    casters: &'a mut [ShadowCaster],
    saved: Vec<(usize, Vec3)>,
    depth_bias: f32,
}

impl<'a> DepthPass<'a> {
    pub fn begin(casters: &'a mut [ShadowCaster], light_dir: Vec3, cfg: &ShadowConfig) -> Self {
        let dir = light_dir.normalized();
        let mut saved = Vec::new();
        let depth_bias = match cfg.bias_mode {
            ShadowBiasMode::PerSurface => {
                for (i, c) in casters.iter_mut().enumerate() {
                    if c.kind != CasterKind::Terrain || !c.behavior.cast || c.behavior.bias == 0.0
                    {
                        continue;
                    }
                    saved.push((i, c.translation));
                    c.translation += dir * c.behavior.bias;
                }
                0.0
            }
            ShadowBiasMode::Global => cfg.global_bias,
        };
        log::trace!(
            "shadow depth pass: {} terrain offset(s), depth bias {}",
            saved.len(),
            depth_bias
        );
        Self {
            casters,
            saved,
            depth_bias,
        }
    }

    /// Bias the renderer should pass to its depth shader for this pass.
    #[inline]
    pub fn depth_bias(&self) -> f32 {
        self.depth_bias
    }

    #[inline]
    pub fn offset_count(&self) -> usize {
        self.saved.len()
    }
}

impl<'a> Deref for DepthPass<'a> {
    type Target = [ShadowCaster];

    fn deref(&self) -> &Self::Target {
        self.casters
    }
}

impl<'a> Drop for DepthPass<'a> {
    fn drop(&mut self) {
        for (i, t) in self.saved.drain(..) {
            if let Some(c) = self.casters.get_mut(i) {
                c.translation = t;
            }
        }
    }
}
