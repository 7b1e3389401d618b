use std::sync::Arc;

use hashbrown::HashMap;
use strata_geom::Vec3;

use crate::model::{GeometryError, Model, ModelGeometry, ModelId};

/// Detail tiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LodLevel {
    Full,
    Reduced,
}

impl LodLevel {
    /// Full detail strictly below `threshold`, reduced at or beyond it.
    #[inline]
    pub fn pick(distance: f32, threshold: f32) -> Self {
        if distance < threshold {
            LodLevel::Full
        } else {
            LodLevel::Reduced
        }
    }
}

const START_RESOLUTION: u32 = 64;

fn cluster_key(p: Vec3, min: Vec3, extent: Vec3, res: [u32; 3]) -> (u32, u32, u32) {
    let cell = |v: f32, lo: f32, ext: f32, res: u32| -> u32 {
        if ext <= 0.0 || !v.is_finite() {
            return 0;
        }
        (((v - lo) / ext) * res as f32).floor().clamp(0.0, (res - 1) as f32) as u32
    };
    (
        cell(p.x, min.x, extent.x, res[0]),
        cell(p.y, min.y, extent.y, res[1]),
        cell(p.z, min.z, extent.z, res[2]),
    )
}

/// Grids tried from finest to coarsest. At each resolution the uniform grid
/// comes first, then grids that flatten one or two axes; flattening keeps the
/// faces perpendicular to that axis alive where a uniform halving would merge
/// every corner of a small model at once.
fn candidate_grids() -> impl Iterator<Item = [u32; 3]> {
    std::iter::successors(Some(START_RESOLUTION), |&r| (r > 1).then_some(r / 2)).flat_map(|r| {
        [
            [r, r, r],
            [1, r, r],
            [r, 1, r],
            [r, r, 1],
            [r, 1, 1],
            [1, r, 1],
            [1, 1, r],
        ]
    })
}

struct Clustering {
    clusters: usize,
    remap: Vec<u32>,
}

impl Clustering {
    fn over(src: &ModelGeometry, res: [u32; 3]) -> Self {
        let bounds = src.bounds();
        let extent = bounds.extent();
        let mut ids: HashMap<(u32, u32, u32), u32> = HashMap::new();
        let mut remap = Vec::with_capacity(src.vertex_count());
        for &p in &src.positions {
            let k = cluster_key(p, bounds.min, extent, res);
            let next = ids.len() as u32;
            remap.push(*ids.entry(k).or_insert(next));
        }
        Self {
            clusters: ids.len(),
            remap,
        }
    }

    fn surviving_triangles(&self, src: &ModelGeometry) -> usize {
        src.indices
            .chunks_exact(3)
            .filter(|t| {
                let (a, b, c) = (
                    self.remap[t[0] as usize],
                    self.remap[t[1] as usize],
                    self.remap[t[2] as usize],
                );
                a != b && b != c && a != c
            })
            .count()
    }

    fn collapse(&self, src: &ModelGeometry) -> ModelGeometry {
        let k = self.clusters;
        let mut sum_p = vec![Vec3::ZERO; k];
        let mut sum_n = vec![Vec3::ZERO; k];
        let mut count = vec![0u32; k];
        let mut uvs = vec![(0.0f32, 0.0f32); k];
        for (v, &c) in self.remap.iter().enumerate() {
            let c = c as usize;
            if count[c] == 0 {
                uvs[c] = src.uvs[v];
            }
            sum_p[c] += src.positions[v];
            sum_n[c] += src.normals[v];
            count[c] += 1;
        }
        let positions = sum_p
            .iter()
            .zip(&count)
            .map(|(&p, &n)| p / n.max(1) as f32)
            .collect();
        let normals = sum_n.iter().map(|&s| unit_or_up(s)).collect();

        let mut indices = Vec::with_capacity(src.indices.len());
        for tri in src.indices.chunks_exact(3) {
            let (a, b, c) = (
                self.remap[tri[0] as usize],
                self.remap[tri[1] as usize],
                self.remap[tri[2] as usize],
            );
            if a != b && b != c && a != c {
                indices.extend_from_slice(&[a, b, c]);
            }
        }
        ModelGeometry {
            positions,
            normals,
            uvs,
            indices,
        }
    }
}

#[inline]
fn unit_or_up(s: Vec3) -> Vec3 {
    let len = s.length();
    if len > 1e-12 && len.is_finite() {
        s / len
    } else {
        Vec3::UP
    }
}

/// The source triangle with the largest area, on its own.
fn largest_triangle(src: &ModelGeometry) -> Option<ModelGeometry> {
    let tri = src.indices.chunks_exact(3).max_by(|a, b| {
        let area = |t: &[u32]| {
            let p0 = src.positions[t[0] as usize];
            (src.positions[t[1] as usize] - p0)
                .cross(src.positions[t[2] as usize] - p0)
                .length_sq()
        };
        area(a).total_cmp(&area(b))
    })?;
    let mut out = ModelGeometry::default();
    for &i in tri {
        let i = i as usize;
        out.positions.push(src.positions[i]);
        out.normals.push(src.normals[i]);
        out.uvs.push(src.uvs[i]);
    }
    out.indices.extend([0, 1, 2]);
    Some(out)
}

/// Vertex-clustering simplification.
///
/// Vertices are snapped into a grid over the model bounds; every occupied cell
/// becomes one vertex at the mean of its members, and triangles whose corners
/// land in fewer than three cells are dropped. The finest grid whose cluster
/// count is at most `ratio` of the input and that still keeps a triangle wins.
/// When no grid manages both, the largest source triangle alone is used. A
/// model too small to hold a triangle within the budget (fewer than six
/// vertices at ratio 0.5) is returned unchanged, as is a single vertex.
pub fn simplify(src: &ModelGeometry, ratio: f32) -> Result<ModelGeometry, GeometryError> {
    src.validate()?;
    let n = src.vertex_count();
    if n <= 1 {
        return Ok(src.clone());
    }
    let target = ((n as f32 * ratio.clamp(0.0, 1.0)).floor() as usize).max(1);
    let has_triangles = !src.indices.is_empty();
    if has_triangles && target < 3 {
        log::debug!("lod: {} vertices leave no room for a triangle; keeping full detail", n);
        return Ok(src.clone());
    }

    for res in candidate_grids() {
        let c = Clustering::over(src, res);
        if c.clusters > target {
            continue;
        }
        if has_triangles && c.surviving_triangles(src) == 0 {
            continue;
        }
        return Ok(c.collapse(src));
    }
    match largest_triangle(src) {
        Some(g) => Ok(g),
        // No triangles at all: a single cluster keeps the point set's centre.
        None => Ok(Clustering::over(src, [1, 1, 1]).collapse(src)),
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LodCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Reduced-detail variants, built once per model on first use.
pub struct LodCache {
    ratio: f32,
    entries: HashMap<ModelId, Arc<ModelGeometry>>,
    hits: u64,
    misses: u64,
}

impl LodCache {
    pub fn new(ratio: f32) -> Self {
        Self {
            ratio,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    #[inline]
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn reduced(&mut self, model: &Model) -> Result<Arc<ModelGeometry>, GeometryError> {
        if let Some(g) = self.entries.get(&model.id) {
            self.hits += 1;
            return Ok(g.clone());
        }
        self.misses += 1;
        let g = Arc::new(simplify(&model.geometry, self.ratio)?);
        log::debug!(
            "lod: model {:?} reduced {} -> {} vertices",
            model.id,
            model.geometry.vertex_count(),
            g.vertex_count()
        );
        self.entries.insert(model.id, g.clone());
        Ok(g)
    }

    /// Geometry of `model` at `lod`.
    pub fn geometry(
        &mut self,
        model: &Model,
        lod: LodLevel,
    ) -> Result<Arc<ModelGeometry>, GeometryError> {
        match lod {
            LodLevel::Full => {
                model.geometry.validate()?;
                Ok(model.geometry.clone())
            }
            LodLevel::Reduced => self.reduced(model),
        }
    }

    pub fn invalidate(&mut self, id: ModelId) {
        self.entries.remove(&id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> LodCacheStats {
        LodCacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(n: usize) -> ModelGeometry {
        let mut g = ModelGeometry::default();
        for i in 0..n {
            let x = i as f32;
            g.positions.push(Vec3::new(x, 0.0, 0.0));
            g.positions.push(Vec3::new(x, 1.0, 0.0));
            g.normals.extend([Vec3::new(0.0, 0.0, 1.0); 2]);
            g.uvs.extend([(x, 0.0), (x, 1.0)]);
        }
        for i in 0..n as u32 - 1 {
            let b = i * 2;
            g.indices.extend([b, b + 2, b + 1, b + 1, b + 2, b + 3]);
        }
        g
    }

    #[test]
    fn pick_switches_at_threshold() {
        assert_eq!(LodLevel::pick(49.9, 50.0), LodLevel::Full);
        assert_eq!(LodLevel::pick(50.0, 50.0), LodLevel::Reduced);
    }

    #[test]
    fn simplify_halves_vertices() {
        let g = strip(40);
        let s = simplify(&g, 0.5).unwrap();
        assert!(s.vertex_count() * 2 <= g.vertex_count());
        assert!(s.validate().is_ok());
        assert!(s.triangle_count() > 0);
    }

    #[test]
    fn simplify_rejects_bad_indices() {
        let mut g = strip(3);
        g.indices.push(99);
        g.indices.extend([0, 1]);
        assert!(matches!(
            simplify(&g, 0.5),
            Err(GeometryError::IndexOutOfRange { index: 99, .. })
        ));
    }

    /// Eight shared corners, twelve triangles.
    fn cube() -> ModelGeometry {
        let mut g = ModelGeometry::default();
        for i in 0..8u32 {
            let p = Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32);
            g.positions.push(p);
            g.normals.push((p - Vec3::new(0.5, 0.5, 0.5)).normalized());
            g.uvs.push((p.x, p.z));
        }
        g.indices.extend([
            0, 2, 1, 1, 2, 3, // z = 0
            4, 5, 6, 5, 7, 6, // z = 1
            0, 1, 4, 1, 5, 4, // y = 0
            2, 6, 3, 3, 6, 7, // y = 1
            0, 4, 2, 2, 4, 6, // x = 0
            1, 3, 5, 3, 7, 5, // x = 1
        ]);
        g
    }

    #[test]
    fn reduced_cube_keeps_triangles() {
        let g = cube();
        let s = simplify(&g, 0.5).unwrap();
        assert!(s.vertex_count() <= 4);
        assert!(s.triangle_count() > 0);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn tiny_models_stay_whole() {
        let mut g = ModelGeometry::default();
        g.positions
            .extend([Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)]);
        g.normals.extend([Vec3::UP; 3]);
        g.uvs.extend([(0.0, 0.0); 3]);
        g.indices.extend([0, 2, 1]);
        assert_eq!(simplify(&g, 0.5).unwrap(), g);
    }

    #[test]
    fn scattered_triangles_fall_back_to_the_largest_one() {
        // Disjoint triangles far apart: every grid either keeps too many
        // clusters or merges each triangle into a point.
        let mut g = ModelGeometry::default();
        for i in 0..4u32 {
            let o = Vec3::new(i as f32 * 100.0, 0.0, i as f32 * 100.0);
            let s = 1.0 + i as f32;
            g.positions
                .extend([o, o + Vec3::new(s, 0.0, 0.0), o + Vec3::new(0.0, 0.0, s)]);
            g.normals.extend([Vec3::UP; 3]);
            g.uvs.extend([(0.0, 0.0); 3]);
            g.indices.extend([i * 3, i * 3 + 2, i * 3 + 1]);
        }
        let s = simplify(&g, 0.5).unwrap();
        assert!(s.vertex_count() <= 6);
        assert!(s.triangle_count() > 0);
    }
}
