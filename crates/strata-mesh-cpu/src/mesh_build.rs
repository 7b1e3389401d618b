use strata_geom::{Aabb, Vec3};

/// Flat vertex/index buffers for one surface of a chunk.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct MeshBuild {
    pub pos: Vec<f32>,
    pub norm: Vec<f32>,
    pub uv: Vec<f32>,
    pub idx: Vec<u32>,
    pub col: Vec<u8>,
}

impl MeshBuild {
    /// Clears all arrays but retains capacity for reuse across rebuilds.
    #[inline]
    pub fn clear_keep_capacity(&mut self) {
        self.pos.clear();
        self.norm.clear();
        self.uv.clear();
        self.idx.clear();
        self.col.clear();
    }

    /// Pre-reserve capacity for approximately `n_quads` quads worth of data.
    #[inline]
    pub fn reserve_quads(&mut self, n_quads: usize) {
        // 4 vertices per quad
        self.pos.reserve(n_quads * 4 * 3);
        self.norm.reserve(n_quads * 4 * 3);
        self.uv.reserve(n_quads * 4 * 2);
        self.col.reserve(n_quads * 4 * 4);
        self.idx.reserve(n_quads * 6);
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.idx.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    #[inline]
    pub fn position(&self, i: usize) -> Vec3 {
        Vec3::new(self.pos[i * 3], self.pos[i * 3 + 1], self.pos[i * 3 + 2])
    }

    #[inline]
    pub fn normal(&self, i: usize) -> Vec3 {
        Vec3::new(self.norm[i * 3], self.norm[i * 3 + 1], self.norm[i * 3 + 2])
    }

    #[inline]
    pub fn set_normal(&mut self, i: usize, n: Vec3) {
        self.norm[i * 3] = n.x;
        self.norm[i * 3 + 1] = n.y;
        self.norm[i * 3 + 2] = n.z;
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.pos.chunks_exact(3).map(|p| Vec3::new(p[0], p[1], p[2]))
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions())
    }

    #[inline]
    fn push_vertex(&mut self, p: Vec3, n: Vec3, uv: (f32, f32), rgba: [u8; 4]) -> u32 {
        let i = self.vertex_count() as u32;
        self.pos.extend_from_slice(&[p.x, p.y, p.z]);
        self.norm.extend_from_slice(&[n.x, n.y, n.z]);
        self.uv.extend_from_slice(&[uv.0, uv.1]);
        self.col.extend_from_slice(&rgba);
        i
    }

    /// Appends a quad with explicit per-vertex UVs. Winding is flipped when
    /// needed so the front face points along `n`.
    pub fn add_quad_uv(
        &mut self,
        a: Vec3,
        b: Vec3,
        c: Vec3,
        d: Vec3,
        n: Vec3,
        uvs: [(f32, f32); 4],
        rgba: [u8; 4],
    ) {
        let mut vs = [a, b, c, d];
        let mut uvs = uvs;
        let cross = (vs[1] - vs[0]).cross(vs[2] - vs[0]);
        if cross.dot(n) < 0.0 {
            vs.swap(1, 3);
            uvs.swap(1, 3);
        }
        let base = self.vertex_count() as u32;
        for i in 0..4 {
            self.push_vertex(vs[i], n, uvs[i], rgba);
        }
        self.idx
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Appends a single triangle, winding it to face along `n`.
    pub fn add_tri_uv(
        &mut self,
        a: Vec3,
        b: Vec3,
        c: Vec3,
        n: Vec3,
        uvs: [(f32, f32); 3],
        rgba: [u8; 4],
    ) {
        let mut vs = [a, b, c];
        let mut uvs = uvs;
        if (vs[1] - vs[0]).cross(vs[2] - vs[0]).dot(n) < 0.0 {
            vs.swap(1, 2);
            uvs.swap(1, 2);
        }
        let base = self.vertex_count() as u32;
        for i in 0..3 {
            self.push_vertex(vs[i], n, uvs[i], rgba);
        }
        self.idx.extend_from_slice(&[base, base + 1, base + 2]);
    }
}
