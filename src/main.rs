//! Headless driver: generates noise terrain, streams it through the engine a
//! frame at a time and logs what the optimizer produced.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use fastnoise_lite::{FastNoiseLite, NoiseType};
use serde::{Deserialize, Serialize};
use strata_geom::{Quat, Transform, Vec3};
use strata_mesh_cpu::RoundedCorners;
use strata_optimize::{MaterialId, Model, ModelGeometry, ModelId, ObjectId, PlacedObject};
use strata_runtime::{Engine, EngineConfig};
use strata_tiles::{ChunkData, ChunkKey, DefTexture, RawTileCell};

#[derive(Parser, Debug)]
#[command(name = "strata", about = "Mesh and optimize a generated tile world")]
struct Args {
    /// Engine config (TOML). Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Terrain and prop parameters (TOML).
    #[arg(long)]
    terrain: Option<PathBuf>,
    /// Chunks per side of the square world.
    #[arg(long, default_value_t = 4)]
    chunks: i32,
    /// Frames to simulate.
    #[arg(long, default_value_t = 120)]
    frames: usize,
    #[arg(long, default_value_t = 1337)]
    seed: i32,
    /// Corner rounding radius in tile units; 0 keeps sharp corners.
    #[arg(long, default_value_t = 0.0)]
    radius: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
struct TerrainParams {
    frequency: f32,
    base_height: f32,
    amplitude: f32,
    /// Tiles below this height become water.
    water_level: f32,
    /// Height quantum; 0 leaves heights continuous.
    step: f32,
    props_per_chunk: usize,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            frequency: 0.04,
            base_height: 2.0,
            amplitude: 3.0,
            water_level: 0.6,
            step: 0.5,
            props_per_chunk: 12,
        }
    }
}

fn load_terrain_params(path: &Path) -> Result<TerrainParams, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    let params: TerrainParams = toml::from_str(&s)?;
    Ok(params)
}

fn generate_chunk(
    noise: &FastNoiseLite,
    params: &TerrainParams,
    cx: i32,
    cz: i32,
    size: usize,
) -> ChunkData {
    let mut data = Vec::with_capacity(size * size);
    for z in 0..size {
        for x in 0..size {
            let wx = (cx * size as i32 + x as i32) as f32;
            let wz = (cz * size as i32 + z as i32) as f32;
            let n = noise.get_noise_2d(wx, wz);
            let mut h = (params.base_height + n * params.amplitude).max(0.0);
            if params.step > 0.0 {
                h = (h / params.step).round() * params.step;
            }
            let water = h < params.water_level;
            data.push(RawTileCell {
                z: Some(if water { params.water_level } else { h }),
                is_water: Some(water),
                top: if water { Some("water".into()) } else { None },
                ..Default::default()
            });
        }
    }
    ChunkData {
        x: cx,
        y: cz,
        render_order: None,
        def_texture: DefTexture {
            top: Some("grass".into()),
            middle: Some("dirt".into()),
        },
        data,
    }
}

/// Flat four-sided marker used for every prop.
fn marker_geometry() -> ModelGeometry {
    let mut g = ModelGeometry::default();
    let corners = [
        Vec3::new(-0.3, 0.0, -0.3),
        Vec3::new(0.3, 0.0, -0.3),
        Vec3::new(0.3, 0.0, 0.3),
        Vec3::new(-0.3, 0.0, 0.3),
    ];
    let apex = Vec3::new(0.0, 1.2, 0.0);
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        let n = (b - a).cross(apex - a).normalized();
        let base = g.positions.len() as u32;
        g.positions.extend([a, b, apex]);
        g.normals.extend([n, n, n]);
        g.uvs.extend([(0.0, 0.0), (1.0, 0.0), (0.5, 1.0)]);
        g.indices.extend([base, base + 1, base + 2]);
    }
    g
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(p) => EngineConfig::load_from_path(p)?,
        None => EngineConfig::default(),
    };
    let params = match &args.terrain {
        Some(p) => load_terrain_params(p)?,
        None => TerrainParams::default(),
    };
    let size = cfg.chunk_size;
    let stride = cfg.stride;
    let mut engine = Engine::new(cfg)?;

    let geometry = Arc::new(marker_geometry());
    for (id, material) in [(1u32, 10u32), (2, 11)] {
        engine.register_model(Model {
            id: ModelId(id),
            material: MaterialId(material),
            geometry: geometry.clone(),
        });
    }

    let mut noise = FastNoiseLite::with_seed(args.seed);
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_frequency(Some(params.frequency));
    let corners = (args.radius > 0.0).then(|| RoundedCorners::enabled(args.radius));

    let mut next_object = 0u64;
    for cz in 0..args.chunks {
        for cx in 0..args.chunks {
            let key = engine.add_chunk(generate_chunk(&noise, &params, cx, cz, size), corners)?;
            let (ox, oz) = key.world_origin(size, stride);
            for i in 0..params.props_per_chunk {
                let t = i as f32 / params.props_per_chunk.max(1) as f32;
                let local = Vec3::new(
                    ox + t * size as f32 * stride,
                    params.base_height,
                    oz + (i * 7 % size.max(1)) as f32 * stride,
                );
                engine.place_object(
                    key,
                    PlacedObject {
                        id: ObjectId(next_object),
                        model: ModelId(1 + (i % 2) as u32),
                        transform: Transform {
                            rotation: Quat::from_rotation_y(t * std::f32::consts::TAU),
                            ..Transform::from_translation(local)
                        },
                    },
                )?;
                next_object += 1;
            }
        }
    }
    let d = engine.take_diagnostics();
    if !d.is_empty() {
        log::warn!("{} diagnostic(s) while loading", d.len());
    }

    let span = args.chunks as f32 * size as f32 * stride;
    for frame in 0..args.frames {
        // Orbit the viewer so LOD choices change over the run.
        let a = frame as f32 / args.frames.max(1) as f32 * std::f32::consts::TAU;
        let c = span * 0.5;
        engine.set_viewer_position(Vec3::new(c + a.cos() * span, 8.0, c + a.sin() * span));
        let report = engine.tick();
        log::debug!(
            target: "perf",
            "frame={} processed={} deferred={} ms={:.2}",
            frame,
            report.processed,
            report.deferred,
            report.elapsed.as_secs_f64() * 1000.0
        );
    }
    engine.run_until_idle(args.frames.max(1) * 4);

    let welded = engine.weld_chunk_edges();
    let attenuated = engine.optimize_chunk_shadows();
    let stats = engine.stats();
    log::info!(
        "chunks={} verts={} tris={} welded={} attenuated={} objects={} draws={} lod_hits={} lod_misses={}",
        stats.chunks,
        stats.vertices,
        stats.triangles,
        welded.merged_vertices,
        attenuated,
        stats.objects,
        stats.draw_units,
        stats.lod_cache.hits,
        stats.lod_cache.misses
    );
    for key in engine.chunk_keys().take(4).collect::<Vec<ChunkKey>>() {
        if let Some(plan) = engine.draw_plan(key) {
            log::info!(
                "chunk ({}, {}): {:?} with {} draw(s) for {} object(s)",
                key.x,
                key.z,
                plan.strategy,
                plan.draw_count(),
                plan.object_count()
            );
        }
    }
    for d in engine.take_diagnostics() {
        log::warn!("{:?}", d);
    }
    Ok(())
}
