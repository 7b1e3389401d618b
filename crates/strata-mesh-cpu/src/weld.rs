use std::collections::HashMap;

use strata_geom::Vec3;

use crate::mesh_build::MeshBuild;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeldStats {
    pub merged_vertices: usize,
    pub dropped_triangles: usize,
}

type Cell = [i64; 3];

#[inline]
fn cell_of(p: &[f32], eps: f32) -> Cell {
    [
        (p[0] / eps).floor() as i64,
        (p[1] / eps).floor() as i64,
        (p[2] / eps).floor() as i64,
    ]
}

/// Merges vertices of `mb` whose positions lie within `epsilon` of each other,
/// whose UVs differ by at most `epsilon` per component and whose colors match.
/// Triangles that collapse are dropped and normals are recomputed.
///
/// Survivors live in a grid of `epsilon`-sized cells; a vertex is compared
/// against the survivors of its own cell and the 26 around it, so a pair
/// straddling a cell boundary still merges. Each survivor keeps the
/// attributes of the first vertex that claimed it and no two survivors are
/// within `epsilon`, so a second pass finds nothing to merge. Normals are
/// area-weighted sums of the incident triangle normals; a vertex with no
/// usable triangle keeps its previous normal (or +Y if that is not finite),
/// so no NaN can appear.
pub fn weld_mesh(mb: &mut MeshBuild, epsilon: f32) -> WeldStats {
    let eps = if epsilon > 0.0 { epsilon } else { f32::EPSILON };
    let n = mb.vertex_count();
    let mut cells: HashMap<Cell, Vec<u32>> = HashMap::with_capacity(n);
    let mut remap: Vec<u32> = Vec::with_capacity(n);
    let mut out = MeshBuild::default();
    out.pos.reserve(n * 3);
    out.norm.reserve(n * 3);
    out.uv.reserve(n * 2);
    out.col.reserve(n * 4);

    for v in 0..n {
        let p = &mb.pos[v * 3..v * 3 + 3];
        let uv = &mb.uv[v * 2..v * 2 + 2];
        let col = &mb.col[v * 4..v * 4 + 4];
        let home = cell_of(p, eps);
        let here = Vec3::new(p[0], p[1], p[2]);
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = [home[0] + dx, home[1] + dy, home[2] + dz];
                    let Some(survivors) = cells.get(&key) else {
                        continue;
                    };
                    for &s in survivors {
                        let si = s as usize;
                        let close = out.position(si).distance(here) <= eps
                            && (out.uv[si * 2] - uv[0]).abs() <= eps
                            && (out.uv[si * 2 + 1] - uv[1]).abs() <= eps
                            && out.col[si * 4..si * 4 + 4] == *col;
                        if close {
                            found = Some(s);
                            break 'search;
                        }
                    }
                }
            }
        }
        let target = match found {
            Some(s) => s,
            None => {
                let next = out.vertex_count() as u32;
                out.pos.extend_from_slice(p);
                out.norm.extend_from_slice(&mb.norm[v * 3..v * 3 + 3]);
                out.uv.extend_from_slice(uv);
                out.col.extend_from_slice(col);
                cells.entry(home).or_default().push(next);
                next
            }
        };
        remap.push(target);
    }

    let mut dropped = 0usize;
    out.idx.reserve(mb.idx.len());
    for tri in mb.idx.chunks_exact(3) {
        let (a, b, c) = (
            remap[tri[0] as usize],
            remap[tri[1] as usize],
            remap[tri[2] as usize],
        );
        if a == b || b == c || a == c {
            dropped += 1;
            continue;
        }
        out.idx.extend_from_slice(&[a, b, c]);
    }

    recompute_normals(&mut out);

    let merged = n - out.vertex_count();
    *mb = out;
    WeldStats {
        merged_vertices: merged,
        dropped_triangles: dropped,
    }
}

fn recompute_normals(mb: &mut MeshBuild) {
    let n = mb.vertex_count();
    let mut acc = vec![Vec3::ZERO; n];
    for tri in mb.idx.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let pa = mb.position(a);
        let face_n = (mb.position(b) - pa).cross(mb.position(c) - pa);
        if !face_n.is_finite() {
            continue;
        }
        acc[a] += face_n;
        acc[b] += face_n;
        acc[c] += face_n;
    }
    for (i, sum) in acc.into_iter().enumerate() {
        let len = sum.length();
        let normal = if len > 1e-12 && len.is_finite() {
            sum / len
        } else {
            let prev = mb.normal(i);
            if prev.is_finite() && prev.length_sq() > 0.0 {
                prev
            } else {
                Vec3::UP
            }
        };
        mb.set_normal(i, normal);
    }
}
