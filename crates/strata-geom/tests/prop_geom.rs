use proptest::num::f32::NORMAL;
use proptest::prelude::*;
use strata_geom::{Aabb, Quat, Transform, Vec3, snap};

fn approx(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}
fn vapprox(a: Vec3, b: Vec3, eps: f32) -> bool {
    approx(a.x, b.x, eps) && approx(a.y, b.y, eps) && approx(a.z, b.z, eps)
}

fn bounded_f32() -> impl Strategy<Value = f32> {
    NORMAL.prop_filter("bounded", |v| v.is_finite() && v.abs() <= 1e4)
}

fn arb_vec3() -> impl Strategy<Value = Vec3> {
    (bounded_f32(), bounded_f32(), bounded_f32()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

const QUANTUM: f32 = 1.0 / 4096.0;

proptest! {
    // Snapping twice is the same as snapping once.
    #[test]
    fn snap_is_idempotent(v in bounded_f32()) {
        let once = snap(v, QUANTUM);
        prop_assert_eq!(snap(once, QUANTUM), once);
    }

    // The same seam point reached from two chunk origins snaps to identical bits.
    #[test]
    fn snap_agrees_across_origins(chunk in -500i32..500, size in 1i32..64, frac in 0u32..4096) {
        let origin_a = (chunk * size) as f32;
        let origin_b = ((chunk + 1) * size) as f32;
        let local = frac as f32 * QUANTUM;
        let from_a = snap(origin_a + size as f32 + local, QUANTUM);
        let from_b = snap(origin_b + local, QUANTUM);
        prop_assert_eq!(from_a.to_bits(), from_b.to_bits());
    }

    // Rotation preserves vector length.
    #[test]
    fn quat_rotation_preserves_length(v in arb_vec3(), angle in -6.3f32..6.3) {
        let r = Quat::from_rotation_y(angle).rotate(v);
        let tol = 1e-3 * v.length().max(1.0);
        prop_assert!(approx(r.length(), v.length(), tol));
    }

    // Aabb built from points contains every point.
    #[test]
    fn aabb_from_points_contains_all(points in proptest::collection::vec(arb_vec3(), 1..16)) {
        let b = Aabb::from_points(points.iter().copied());
        for p in points {
            prop_assert!(p.x >= b.min.x && p.x <= b.max.x);
            prop_assert!(p.y >= b.min.y && p.y <= b.max.y);
            prop_assert!(p.z >= b.min.z && p.z <= b.max.z);
        }
    }
}

#[test]
fn transform_applies_scale_rotate_translate() {
    let t = Transform {
        translation: Vec3::new(10.0, 0.0, 0.0),
        rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        scale: Vec3::new(2.0, 2.0, 2.0),
    };
    // +X scaled to 2, rotated a quarter turn about Y to -Z, then moved.
    let p = t.transform_point(Vec3::new(1.0, 0.0, 0.0));
    assert!(vapprox(p, Vec3::new(10.0, 0.0, -2.0), 1e-5));
    let n = t.transform_normal(Vec3::UP);
    assert!(vapprox(n, Vec3::UP, 1e-6));
}

#[test]
fn empty_aabb_has_zero_extent() {
    let b = Aabb::empty();
    assert!(b.is_empty());
    assert_eq!(b.extent(), Vec3::ZERO);
}
