//! Face emission, with optional linear corner chamfering.

use strata_geom::Vec3;

use crate::face::FaceDescriptor;
use crate::mesh_build::MeshBuild;

/// Rounded-corner options accepted at chunk load.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundedCorners {
    pub enabled: bool,
    /// Chamfer size as a fraction of the tile stride, clamped to `[0, 0.5]`.
    pub radius: f32,
    /// Accepted and stored; corners are always a single linear chamfer.
    pub segments: u32,
}

impl Default for RoundedCorners {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: 0.15,
            segments: 4,
        }
    }
}

impl RoundedCorners {
    pub const SHARP: RoundedCorners = RoundedCorners {
        enabled: false,
        radius: 0.15,
        segments: 4,
    };

    pub fn enabled(radius: f32) -> Self {
        Self {
            enabled: true,
            radius,
            ..Self::default()
        }
    }

    /// Radius in world units, or `0` when rounding is off.
    #[inline]
    pub fn world_radius(&self, stride: f32) -> f32 {
        if !self.enabled || !self.radius.is_finite() {
            return 0.0;
        }
        self.radius.clamp(0.0, 0.5) * stride
    }
}

/// Writes one face into `mb`.
///
/// The face quad always comes first. With a positive `radius` it is shrunk
/// toward the face center and the rim is filled with four edge strips and four
/// chamfer triangles; a zero radius emits exactly the sharp quad.
pub(crate) fn emit_face(
    mb: &mut MeshBuild,
    face: &FaceDescriptor,
    radius: f32,
    rgba: [u8; 4],
    quantum: f32,
) {
    let (lu, lv) = face.edge_lengths();
    let r = radius.min(lu * 0.5).min(lv * 0.5);
    let (rs, rt) = if r > 0.0 && lu > 0.0 && lv > 0.0 {
        (r / lu, r / lv)
    } else {
        (0.0, 0.0)
    };

    let p = |s: f32, t: f32| face.point(s, t).snapped(quantum);
    let quad = |mb: &mut MeshBuild, st: [(f32, f32); 4]| {
        mb.add_quad_uv(
            p(st[0].0, st[0].1),
            p(st[1].0, st[1].1),
            p(st[2].0, st[2].1),
            p(st[3].0, st[3].1),
            face.normal,
            st.map(|(s, t)| face.uv_at(s, t)),
            rgba,
        );
    };

    let (s0, s1, t0, t1) = (rs, 1.0 - rs, rt, 1.0 - rt);
    quad(mb, [(s0, t0), (s1, t0), (s1, t1), (s0, t1)]);
    if rs == 0.0 && rt == 0.0 {
        return;
    }

    // Edge strips between the inset quad and the original edges.
    quad(mb, [(s0, 0.0), (s1, 0.0), (s1, t0), (s0, t0)]);
    quad(mb, [(1.0, t0), (1.0, t1), (s1, t1), (s1, t0)]);
    quad(mb, [(s1, 1.0), (s0, 1.0), (s0, t1), (s1, t1)]);
    quad(mb, [(0.0, t1), (0.0, t0), (s0, t0), (s0, t1)]);

    // Chamfer triangles; the original corner itself is cut away.
    let tri = |mb: &mut MeshBuild, st: [(f32, f32); 3]| {
        mb.add_tri_uv(
            p(st[0].0, st[0].1),
            p(st[1].0, st[1].1),
            p(st[2].0, st[2].1),
            face.normal,
            st.map(|(s, t)| face.uv_at(s, t)),
            rgba,
        );
    };
    tri(mb, [(0.0, t0), (s0, 0.0), (s0, t0)]);
    tri(mb, [(s1, 0.0), (1.0, t0), (s1, t0)]);
    tri(mb, [(1.0, t1), (s1, 1.0), (s1, t1)]);
    tri(mb, [(s0, 1.0), (0.0, t1), (s0, t1)]);
}

/// Corner positions of the chamfered outline, for callers that need the
/// silhouette without building buffers.
pub fn chamfered_outline(face: &FaceDescriptor, radius: f32) -> Vec<Vec3> {
    let (lu, lv) = face.edge_lengths();
    let r = radius.max(0.0).min(lu * 0.5).min(lv * 0.5);
    if r == 0.0 || lu == 0.0 || lv == 0.0 {
        return face.corners.to_vec();
    }
    let (rs, rt) = (r / lu, r / lv);
    [
        (rs, 0.0),
        (1.0 - rs, 0.0),
        (1.0, rt),
        (1.0, 1.0 - rt),
        (1.0 - rs, 1.0),
        (rs, 1.0),
        (0.0, 1.0 - rt),
        (0.0, rt),
    ]
    .into_iter()
    .map(|(s, t)| face.point(s, t))
    .collect()
}
