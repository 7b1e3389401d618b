use std::sync::Arc;

use proptest::prelude::*;

use strata_geom::{Quat, Transform, Vec3};
use strata_optimize::{
    DrawUnit, FallbackReason, GeometryError, LodLevel, MaterialId, Model, ModelGeometry, ModelId,
    ModelLibrary, ObjectId, OptimizerConfig, PlacedObject, RenderOptimizer, Strategy,
};
use strata_tiles::ChunkKey;

/// `k` x `k` vertex plane on XZ.
fn plane(k: u32) -> ModelGeometry {
    let mut g = ModelGeometry::default();
    for z in 0..k {
        for x in 0..k {
            g.positions.push(Vec3::new(x as f32, 0.0, z as f32));
            g.normals.push(Vec3::UP);
            g.uvs.push((x as f32 / k as f32, z as f32 / k as f32));
        }
    }
    for z in 0..k - 1 {
        for x in 0..k - 1 {
            let i = z * k + x;
            g.indices.extend([i, i + k, i + 1, i + 1, i + k, i + k + 1]);
        }
    }
    g
}

fn model(id: u32, material: u32, geometry: ModelGeometry) -> Model {
    Model {
        id: ModelId(id),
        material: MaterialId(material),
        geometry: Arc::new(geometry),
    }
}

fn place(id: u64, model: u32, at: Vec3) -> PlacedObject {
    PlacedObject {
        id: ObjectId(id),
        model: ModelId(model),
        transform: Transform {
            translation: at,
            rotation: Quat::from_rotation_y(id as f32 * 0.25),
            scale: Vec3::ONE,
        },
    }
}

fn library(models: impl IntoIterator<Item = Model>) -> ModelLibrary {
    let mut lib = ModelLibrary::new();
    for m in models {
        lib.register(m);
    }
    lib
}

const KEY: ChunkKey = ChunkKey::new(0, 0, 0);

/// Unit cube with eight shared corners.
fn cube() -> ModelGeometry {
    let mut g = ModelGeometry::default();
    for i in 0..8u32 {
        let p = Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32);
        g.positions.push(p);
        g.normals.push((p - Vec3::new(0.5, 0.5, 0.5)).normalized());
        g.uvs.push((p.x, p.z));
    }
    g.indices.extend([
        0, 2, 1, 1, 2, 3, 4, 5, 6, 5, 7, 6, 0, 1, 4, 1, 5, 4, 2, 6, 3, 3, 6, 7, 0, 4, 2, 2, 4,
        6, 1, 3, 5, 3, 7, 5,
    ]);
    g
}

#[test]
fn far_cubes_still_draw_triangles() {
    let lib = library([model(1, 1, cube())]);
    let objects: Vec<_> = (0..3)
        .map(|i| place(i, 1, Vec3::new(80.0 + i as f32, 0.0, 0.0)))
        .collect();
    let mut opt = RenderOptimizer::new(OptimizerConfig::default());
    let plan = opt.optimize_chunk(KEY, &objects, Vec3::ZERO, &lib);
    assert_eq!(plan.draw_count(), 1);
    let DrawUnit::Instanced { lod, geometry, .. } = &plan.units[0] else {
        panic!("expected an instanced draw, got {:?}", plan.units[0]);
    };
    assert_eq!(*lod, LodLevel::Reduced);
    assert!(geometry.vertex_count() <= 4);
    assert!(geometry.triangle_count() > 0);
}

#[test]
fn single_object_is_drawn_directly() {
    let lib = library([model(1, 1, plane(4))]);
    let mut opt = RenderOptimizer::new(OptimizerConfig::default());
    let plan = opt.optimize_chunk(KEY, &[place(1, 1, Vec3::ZERO)], Vec3::ZERO, &lib);
    assert_eq!(plan.draw_count(), 1);
    assert!(plan.units[0].is_direct());
    assert!(plan.diagnostics.is_empty());
}

#[test]
fn many_distinct_models_are_batched_by_material() {
    let lib = library((0..12).map(|i| model(i, i % 2, plane(3))));
    let objects: Vec<_> = (0..12)
        .map(|i| place(i as u64, i, Vec3::new(i as f32, 0.0, 0.0)))
        .collect();
    let mut opt = RenderOptimizer::new(OptimizerConfig::default());
    let plan = opt.optimize_chunk(KEY, &objects, Vec3::ZERO, &lib);
    assert_eq!(plan.strategy, Strategy::Batching);
    assert_eq!(plan.draw_count(), 2);
    assert_eq!(plan.object_count(), 12);
    for unit in &plan.units {
        let DrawUnit::Batched { geometry, objects, .. } = unit else {
            panic!("expected a batch, got {unit:?}");
        };
        assert_eq!(geometry.vertex_count(), objects.len() * 9);
        assert!(geometry.validate().is_ok());
    }
}

#[test]
fn batch_positions_are_world_space() {
    let lib = library([model(1, 7, plane(2)), model(2, 7, plane(2))]);
    let objects = [
        place(10, 1, Vec3::new(5.0, 0.0, 0.0)),
        place(11, 2, Vec3::new(-5.0, 1.0, 0.0)),
    ];
    let mut opt = RenderOptimizer::new(OptimizerConfig::default());
    let plan = opt.optimize_chunk(KEY, &objects, Vec3::ZERO, &lib);
    let DrawUnit::Batched { geometry, .. } = &plan.units[0] else {
        panic!("expected a batch");
    };
    let expected = objects[1].transform.transform_point(Vec3::ZERO);
    assert_eq!(geometry.positions[4], expected);
}

#[test]
fn missing_model_falls_back_without_dropping() {
    let lib = library([model(1, 1, plane(3))]);
    let objects = [
        place(1, 1, Vec3::ZERO),
        place(2, 1, Vec3::ZERO),
        place(3, 99, Vec3::ZERO),
    ];
    let mut opt = RenderOptimizer::new(OptimizerConfig::default());
    let plan = opt.optimize_chunk(KEY, &objects, Vec3::ZERO, &lib);
    assert_eq!(plan.object_count(), 3);
    assert_eq!(plan.diagnostics.len(), 1);
    assert_eq!(plan.diagnostics[0].reason, FallbackReason::MissingModel(ModelId(99)));
    assert!(plan.units.iter().any(|u| matches!(
        u,
        DrawUnit::Direct { object: ObjectId(3), geometry: None, .. }
    )));
}

#[test]
fn broken_geometry_falls_back_to_direct_draws() {
    let mut bad = plane(3);
    bad.indices.extend([0, 1, 200]);
    let lib = library([model(1, 1, bad)]);
    let objects: Vec<_> = (0..4).map(|i| place(i, 1, Vec3::ZERO)).collect();
    let mut opt = RenderOptimizer::new(OptimizerConfig::default());
    let plan = opt.optimize_chunk(KEY, &objects, Vec3::ZERO, &lib);
    assert_eq!(plan.draw_count(), 4);
    assert_eq!(plan.direct_count(), 4);
    assert!(matches!(
        plan.diagnostics[0].reason,
        FallbackReason::Construction(GeometryError::IndexOutOfRange { index: 200, .. })
    ));
}

#[test]
fn oversized_batch_falls_back() {
    let cfg = OptimizerConfig {
        instancing_model_threshold: 0,
        max_batch_vertices: 20,
        ..OptimizerConfig::default()
    };
    let lib = library([model(1, 1, plane(3)), model(2, 1, plane(3)), model(3, 1, plane(3))]);
    let objects = [
        place(1, 1, Vec3::ZERO),
        place(2, 2, Vec3::ZERO),
        place(3, 3, Vec3::ZERO),
    ];
    let mut opt = RenderOptimizer::new(cfg);
    let plan = opt.optimize_chunk(KEY, &objects, Vec3::ZERO, &lib);
    assert_eq!(plan.direct_count(), 3);
    assert!(matches!(
        plan.diagnostics[0].reason,
        FallbackReason::Construction(GeometryError::VertexOverflow(27))
    ));
}

#[test]
fn reduced_variant_is_built_once_per_model() {
    let lib = library([model(1, 1, plane(10))]);
    let far = Vec3::new(100.0, 0.0, 0.0);
    let objects: Vec<_> = (0..5).map(|i| place(i, 1, far)).collect();
    let mut opt = RenderOptimizer::new(OptimizerConfig::default());
    opt.optimize_chunk(KEY, &objects, Vec3::ZERO, &lib);
    opt.optimize_chunk(KEY, &objects, Vec3::ZERO, &lib);
    let stats = opt.lod_cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 1);
    assert!(stats.hits >= 1);
}

#[test]
fn mixed_distances_split_into_lod_groups() {
    let lib = library([model(1, 1, plane(6))]);
    let objects = [
        place(1, 1, Vec3::new(1.0, 0.0, 0.0)),
        place(2, 1, Vec3::new(2.0, 0.0, 0.0)),
        place(3, 1, Vec3::new(80.0, 0.0, 0.0)),
        place(4, 1, Vec3::new(90.0, 0.0, 0.0)),
    ];
    let mut opt = RenderOptimizer::new(OptimizerConfig::default());
    let plan = opt.optimize_chunk(KEY, &objects, Vec3::ZERO, &lib);
    assert_eq!(plan.strategy, Strategy::Instancing);
    assert_eq!(plan.draw_count(), 2);
    let lods: Vec<LodLevel> = plan
        .units
        .iter()
        .filter_map(|u| match u {
            DrawUnit::Instanced { lod, .. } => Some(*lod),
            _ => None,
        })
        .collect();
    assert_eq!(lods, vec![LodLevel::Full, LodLevel::Reduced]);
}

proptest! {
    // N objects of one nearby model collapse into a single instanced draw.
    #[test]
    fn repeated_model_is_one_instanced_draw(n in 2usize..64, spread in 0.0f32..30.0) {
        let lib = library([model(1, 1, plane(4))]);
        let objects: Vec<_> = (0..n)
            .map(|i| place(i as u64, 1, Vec3::new(spread * (i as f32 / n as f32), 0.0, 1.0)))
            .collect();
        let mut opt = RenderOptimizer::new(OptimizerConfig::default());
        let plan = opt.optimize_chunk(KEY, &objects, Vec3::ZERO, &lib);
        prop_assert_eq!(plan.strategy, Strategy::Instancing);
        prop_assert_eq!(plan.draw_count(), 1);
        let DrawUnit::Instanced { transforms, objects: ids, .. } = &plan.units[0] else {
            return Err(TestCaseError::fail("expected an instanced unit"));
        };
        prop_assert_eq!(ids.len(), n);
        for (t, o) in transforms.iter().zip(&objects) {
            prop_assert_eq!(*t, o.transform);
        }
    }

    // Far objects use a variant with at most half the vertices.
    #[test]
    fn far_objects_use_reduced_geometry(k in 3u32..16, distance in 50.0f32..1000.0, n in 1usize..4) {
        let full = plane(k);
        let full_count = full.vertex_count();
        let lib = library([model(1, 1, full)]);
        let objects: Vec<_> = (0..n).map(|i| place(i as u64, 1, Vec3::new(distance, 0.0, 0.0))).collect();
        let mut opt = RenderOptimizer::new(OptimizerConfig::default());
        let plan = opt.optimize_chunk(KEY, &objects, Vec3::ZERO, &lib);
        for unit in &plan.units {
            let (lod, geometry) = match unit {
                DrawUnit::Instanced { lod, geometry, .. } => (*lod, geometry.clone()),
                DrawUnit::Direct { lod, geometry: Some(g), .. } => (*lod, g.clone()),
                other => return Err(TestCaseError::fail(format!("unexpected unit {other:?}"))),
            };
            prop_assert_eq!(lod, LodLevel::Reduced);
            prop_assert!(geometry.vertex_count() * 2 <= full_count);
            prop_assert!(geometry.triangle_count() > 0);
        }
    }

    // Every object is drawn exactly once, whatever the strategy.
    #[test]
    fn objects_are_conserved(models in proptest::collection::vec(0u32..15, 0..40)) {
        let lib = library((0..14).map(|i| model(i, i % 3, plane(3))));
        let objects: Vec<_> = models
            .iter()
            .enumerate()
            .map(|(i, &m)| place(i as u64, m, Vec3::new(i as f32 * 4.0, 0.0, 0.0)))
            .collect();
        let mut opt = RenderOptimizer::new(OptimizerConfig::default());
        let plan = opt.optimize_chunk(KEY, &objects, Vec3::ZERO, &lib);
        let mut seen: Vec<ObjectId> = plan.units.iter().flat_map(|u| u.objects()).collect();
        seen.sort();
        let mut want: Vec<ObjectId> = objects.iter().map(|o| o.id).collect();
        want.sort();
        prop_assert_eq!(seen, want);
    }
}
