use hashbrown::HashSet;
use proptest::prelude::*;

use strata_geom::Vec3;
use strata_mesh_cpu::{
    BuildConfig, ChunkMesh, Face, FaceDescriptor, MeshBuild, RoundedCorners, Surface, UnitRegions,
    UvLayout, UvRect, build_chunk_mesh, chamfered_outline, weld_mesh,
};
use strata_tiles::{ChunkData, ChunkKey, RawTileCell, TextureRef, TileCell, TileGrid};

const SIZE: usize = 4;

fn flat(height: f32) -> TileGrid {
    TileGrid::filled(SIZE, TileCell::solid(height, "grass"))
}

fn grid_from_heights(heights: &[u8]) -> TileGrid {
    let slots = heights
        .iter()
        .map(|&h| Some(TileCell::solid(h as f32, "grass")))
        .collect();
    TileGrid::from_slots(SIZE, slots)
}

fn build(grid: &TileGrid, key: ChunkKey, loaded: &HashSet<ChunkKey>, corners: RoundedCorners) -> ChunkMesh {
    build_chunk_mesh(grid, key, loaded, &corners, &BuildConfig::default(), &UnitRegions)
}

fn loaded(keys: &[ChunkKey]) -> HashSet<ChunkKey> {
    keys.iter().copied().collect()
}

/// Number of quads in `mb` whose normal points along `dir`.
fn quads_facing(mb: Option<&MeshBuild>, dir: Vec3) -> usize {
    let Some(mb) = mb else { return 0 };
    (0..mb.vertex_count())
        .filter(|&i| mb.normal(i).dot(dir) > 0.99)
        .count()
        / 4
}

#[test]
fn single_flat_chunk_emits_tops_and_outer_ring_only() {
    let key = ChunkKey::new(0, 0, 0);
    let mesh = build(&flat(1.0), key, &loaded(&[key]), RoundedCorners::SHARP);
    assert_eq!(mesh.part(Surface::Top).map(|m| m.vertex_count()), Some(16 * 4));
    assert!(mesh.part(Surface::Side).is_none());
    assert_eq!(mesh.part(Surface::Edge).map(|m| m.vertex_count()), Some(16 * 4));
    assert_eq!(mesh.faces_emitted, 32);
}

#[test]
fn boundary_face_appears_then_is_culled_when_neighbor_loads() {
    let a = ChunkKey::new(0, 0, 0);
    let b = ChunkKey::new(1, 0, 0);
    let mut grid = flat(0.0);
    for z in 0..SIZE {
        grid.replace(SIZE - 1, z, TileCell::solid(1.0, "rock")).unwrap();
    }

    let before = build(&grid, a, &loaded(&[a]), RoundedCorners::SHARP);
    assert_eq!(quads_facing(before.part(Surface::Edge), Vec3::new(1.0, 0.0, 0.0)), SIZE);

    let after = build(&grid, a, &loaded(&[a, b]), RoundedCorners::SHARP);
    assert_eq!(quads_facing(after.part(Surface::Edge), Vec3::new(1.0, 0.0, 0.0)), 0);
    assert!(after.neighbors.pos_x && !before.neighbors.pos_x);
}

#[test]
fn shared_seam_is_covered_once_and_meets_exactly() {
    let a = ChunkKey::new(-1, 2, 0);
    let b = ChunkKey::new(0, 2, 0);
    let cfg = BuildConfig {
        stride: 1.25,
        ..BuildConfig::default()
    };
    let grid = flat(1.0);

    // Only A resident: A draws its east wall; B, built once both exist, draws no west wall.
    let a_alone = build_chunk_mesh(&grid, a, &loaded(&[a]), &RoundedCorners::SHARP, &cfg, &UnitRegions);
    let b_mesh = build_chunk_mesh(&grid, b, &loaded(&[a, b]), &RoundedCorners::SHARP, &cfg, &UnitRegions);
    let east = Vec3::new(1.0, 0.0, 0.0);
    let west = Vec3::new(-1.0, 0.0, 0.0);
    assert_eq!(quads_facing(a_alone.part(Surface::Edge), east), SIZE);
    assert_eq!(quads_facing(b_mesh.part(Surface::Edge), west), 0);

    // Both resident: no wall on either side, and the tops share the seam exactly.
    let a_mesh = build_chunk_mesh(&grid, a, &loaded(&[a, b]), &RoundedCorners::SHARP, &cfg, &UnitRegions);
    assert_eq!(quads_facing(a_mesh.part(Surface::Edge), east), 0);
    let a_max = a_mesh.part(Surface::Top).unwrap().bounds().max.x;
    let b_min = b_mesh.part(Surface::Top).unwrap().bounds().min.x;
    assert_eq!(a_max.to_bits(), b_min.to_bits());
}

#[test]
fn malformed_cell_is_skipped_and_rest_is_built() {
    let mut data = ChunkData {
        x: 0,
        y: 0,
        ..ChunkData::default()
    };
    for i in 0..SIZE * SIZE {
        let mut cell = RawTileCell {
            z: Some(1.0),
            top: Some("grass".into()),
            ..Default::default()
        };
        if i == 5 {
            cell.top = None;
        }
        data.data.push(cell);
    }
    let chunk = data.into_grid(SIZE).unwrap();
    assert_eq!(chunk.defects.len(), 1);

    let mesh = build(&chunk.grid, chunk.key, &loaded(&[chunk.key]), RoundedCorners::SHARP);
    assert_eq!(mesh.skipped.len(), 1);
    assert_eq!((mesh.skipped[0].x, mesh.skipped[0].z), (1, 1));
    assert_eq!(mesh.part(Surface::Top).unwrap().vertex_count(), 15 * 4);
    // The hole exposes walls on its four neighbors.
    assert_eq!(mesh.part(Surface::Side).unwrap().vertex_count(), 4 * 4);
}

#[test]
fn depressed_tile_exposes_a_short_wall() {
    let key = ChunkKey::default();
    let mut grid = flat(1.0);
    grid.replace(1, 1, TileCell::solid(1.0, "grass").with_depressed(true))
        .unwrap();
    let mesh = build(&grid, key, &loaded(&[key]), RoundedCorners::SHARP);
    let side = mesh.part(Surface::Side).unwrap();
    assert_eq!(side.vertex_count(), 4 * 4);
    let b = side.bounds();
    assert!((b.min.y - 0.8).abs() < 1e-3);
    assert!((b.max.y - 1.0).abs() < 1e-3);
}

#[test]
fn water_tops_get_their_own_surface() {
    let key = ChunkKey::default();
    let mut grid = flat(1.0);
    grid.replace(2, 2, TileCell::solid(1.0, "water").with_water(true))
        .unwrap();
    let mesh = build(&grid, key, &loaded(&[key]), RoundedCorners::SHARP);
    assert_eq!(mesh.part(Surface::Water).unwrap().vertex_count(), 4);
    assert_eq!(mesh.part(Surface::Top).unwrap().vertex_count(), 15 * 4);
}

#[test]
fn atlas_uvs_stay_inside_the_inset_region() {
    let key = ChunkKey::default();
    let mut regions: std::collections::HashMap<TextureRef, UvRect> = std::collections::HashMap::new();
    regions.insert("grass".into(), UvRect::new(0.5, 0.0, 1.0, 0.5));
    let mesh = build_chunk_mesh(&flat(1.0), key, &loaded(&[key]), &RoundedCorners::SHARP, &BuildConfig::default(), &regions);
    let top = mesh.part(Surface::Top).unwrap();
    for uv in top.uv.chunks_exact(2) {
        assert!(uv[0] >= 0.5005 - 1e-6 && uv[0] <= 0.9995 + 1e-6);
        assert!(uv[1] >= 0.0005 - 1e-6 && uv[1] <= 0.4995 + 1e-6);
    }
}

#[test]
fn canvas_uvs_follow_the_tile_pixel_layout() {
    let key = ChunkKey::default();
    let cfg = BuildConfig {
        uv_layout: UvLayout::Canvas { tile_resolution: 16 },
        ..BuildConfig::default()
    };
    let mut grid = TileGrid::empty(SIZE);
    grid.replace(3, 2, TileCell::solid(1.0, "grass")).unwrap();
    let mesh = build_chunk_mesh(&grid, key, &loaded(&[key]), &RoundedCorners::SHARP, &cfg, &UnitRegions);
    let top = mesh.part(Surface::Top).unwrap();
    let us: Vec<f32> = top.uv.chunks_exact(2).map(|uv| uv[0]).collect();
    let vs: Vec<f32> = top.uv.chunks_exact(2).map(|uv| uv[1]).collect();
    let width = (SIZE * 16) as f32;
    assert_eq!(us.iter().cloned().fold(f32::MAX, f32::min), (3.0 * 16.0 + 0.5) / width);
    assert_eq!(us.iter().cloned().fold(f32::MIN, f32::max), (4.0 * 16.0 - 0.5) / width);
    assert_eq!(vs.iter().cloned().fold(f32::MAX, f32::min), (2.0 * 16.0 + 0.5) / width);
}

#[test]
fn rounded_faces_add_strips_and_chamfers() {
    let key = ChunkKey::default();
    let mut grid = TileGrid::empty(SIZE);
    grid.replace(0, 0, TileCell::solid(1.0, "grass")).unwrap();
    let mesh = build(&grid, key, &loaded(&[key]), RoundedCorners::enabled(0.15));
    // Inset quad + 4 strips (5 quads) and 4 chamfer triangles per face.
    let per_face = 5 * 4 + 4 * 3;
    assert_eq!(mesh.part(Surface::Top).unwrap().vertex_count(), per_face);
    let top = mesh.part(Surface::Top).unwrap();
    for p in top.positions() {
        assert_eq!(p.y, 1.0);
    }
}

#[test]
fn chamfered_outline_cuts_each_corner() {
    let face = FaceDescriptor {
        corners: [
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        ],
        normal: Face::Top.normal(),
        uv: UvRect::UNIT,
    };
    assert_eq!(chamfered_outline(&face, 0.0).len(), 4);
    let outline = chamfered_outline(&face, 0.25);
    assert_eq!(outline.len(), 8);
    assert!(!outline.contains(&Vec3::new(0.0, 1.0, 0.0)));
}

fn arb_heights() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(0u8..4, SIZE * SIZE)
}

proptest! {
    // Welding twice yields exactly the data of welding once.
    #[test]
    fn weld_is_idempotent(heights in arb_heights(), radius in 0.0f32..0.5, neighbors in any::<[bool; 4]>()) {
        let key = ChunkKey::new(3, -2, 0);
        let mut keys = vec![key];
        let offsets = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        for (on, (dx, dz)) in neighbors.iter().zip(offsets) {
            if *on { keys.push(key.offset(dx, dz)); }
        }
        let mut mesh = build(&grid_from_heights(&heights), key, &loaded(&keys), RoundedCorners::enabled(radius));
        mesh.weld(0.001);
        let once: Vec<MeshBuild> = Surface::ALL.iter().filter_map(|s| mesh.part(*s).cloned()).collect();
        mesh.weld(0.001);
        let twice: Vec<MeshBuild> = Surface::ALL.iter().filter_map(|s| mesh.part(*s).cloned()).collect();
        prop_assert_eq!(&once, &twice);
        for mb in &twice {
            prop_assert!(mb.norm.iter().all(|v| v.is_finite()));
        }
    }

    // Welding a single part directly is idempotent too.
    #[test]
    fn weld_mesh_part_is_idempotent(heights in arb_heights()) {
        let key = ChunkKey::default();
        let mesh = build(&grid_from_heights(&heights), key, &loaded(&[key]), RoundedCorners::SHARP);
        if let Some(top) = mesh.part(Surface::Top) {
            let mut once = top.clone();
            weld_mesh(&mut once, 0.001);
            let mut twice = once.clone();
            let stats = weld_mesh(&mut twice, 0.001);
            prop_assert_eq!(stats.merged_vertices, 0);
            prop_assert_eq!(once, twice);
        }
    }

    // Radius 0 rounding gives the same vertex data as sharp corners.
    #[test]
    fn zero_radius_matches_sharp(heights in arb_heights(), cx in -50i32..50, cz in -50i32..50) {
        let key = ChunkKey::new(cx, cz, 0);
        let grid = grid_from_heights(&heights);
        let keys = loaded(&[key]);
        let sharp = build(&grid, key, &keys, RoundedCorners::SHARP);
        let zero = build(&grid, key, &keys, RoundedCorners::enabled(0.0));
        for s in Surface::ALL {
            let a = sharp.part(s).map(|m| m.pos.clone());
            let b = zero.part(s).map(|m| m.pos.clone());
            prop_assert_eq!(a, b);
        }
    }

    // Every stored coordinate sits on the snap grid.
    #[test]
    fn positions_are_snapped(heights in arb_heights(), cx in -1000i32..1000, radius in 0.0f32..0.5) {
        let key = ChunkKey::new(cx, 0, 0);
        let mesh = build(&grid_from_heights(&heights), key, &loaded(&[key]), RoundedCorners::enabled(radius));
        let q = BuildConfig::default().snap_quantum();
        for mb in mesh.parts.values() {
            for v in &mb.pos {
                prop_assert_eq!(strata_geom::snap(*v, q), *v);
            }
        }
    }
}
