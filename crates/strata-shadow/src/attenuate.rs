use strata_geom::Vec3;
use strata_mesh_cpu::MeshBuild;

const LATERAL_KEEP: f32 = 0.3;
const MIN_VERTICAL: f32 = 0.7;

/// Bends a boundary face normal toward +Y so the face picks up less shadow
/// from neighboring geometry. Top normals come out unchanged.
#[inline]
pub fn attenuated_normal(n: Vec3) -> Vec3 {
    let bent = Vec3::new(n.x * LATERAL_KEEP, n.y.max(MIN_VERTICAL), n.z * LATERAL_KEEP);
    let len = bent.length();
    if len > 0.0 && len.is_finite() {
        bent / len
    } else {
        Vec3::UP
    }
}

/// Rewrites every normal in `mb`. Not idempotent; callers track whether a
/// buffer has already been attenuated.
pub fn attenuate_edge_normals(mb: &mut MeshBuild) -> usize {
    let n = mb.vertex_count();
    for i in 0..n {
        let bent = attenuated_normal(mb.normal(i));
        mb.set_normal(i, bent);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_normal_leans_up() {
        let n = attenuated_normal(Vec3::new(1.0, 0.0, 0.0));
        let expect = Vec3::new(0.3, 0.7, 0.0).normalized();
        assert!((n - expect).length() < 1e-6);
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn up_normal_is_untouched() {
        assert_eq!(attenuated_normal(Vec3::UP), Vec3::UP);
    }
}
