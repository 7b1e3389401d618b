use std::hash::BuildHasher;

use serde::{Deserialize, Serialize};

/// Identity of a loaded chunk. `render_order` separates stacked layers; two
/// chunks at the same `(x, z)` but different orders are distinct and never
/// neighbors of each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub x: i32,
    pub z: i32,
    pub render_order: i32,
}

impl ChunkKey {
    #[inline]
    pub const fn new(x: i32, z: i32, render_order: i32) -> Self {
        Self { x, z, render_order }
    }

    /// Key `(dx, dz)` chunks away on the same layer. Wraps at the edge of the
    /// `i32` range; neighbor lookups go through [`ChunkKey::checked_offset`].
    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            z: self.z.wrapping_add(dz),
            ..self
        }
    }

    /// Like [`ChunkKey::offset`], but `None` past the edge of the `i32` range.
    #[inline]
    pub fn checked_offset(self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(dx)?,
            z: self.z.checked_add(dz)?,
            ..self
        })
    }

    /// Rounded world-space origin `(x, z)` of this chunk.
    ///
    /// The raw product is never used for vertex placement; rounding here keeps
    /// seams between neighbors free of sub-unit gaps.
    #[inline]
    pub fn world_origin(self, chunk_size: usize, stride: f32) -> (f32, f32) {
        let span = chunk_size as f32 * stride;
        (
            (self.x as f32 * span).round(),
            (self.z as f32 * span).round(),
        )
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkKey) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dz = i64::from(self.z - other.z);
        dx * dx + dz * dz
    }
}

impl From<(i32, i32, i32)> for ChunkKey {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<ChunkKey> for (i32, i32, i32) {
    fn from(value: ChunkKey) -> Self {
        (value.x, value.z, value.render_order)
    }
}

/// Registry membership as seen by the face resolver.
pub trait ChunkPresence {
    fn is_loaded(&self, key: ChunkKey) -> bool;
}

impl<V, S: BuildHasher> ChunkPresence for hashbrown::HashMap<ChunkKey, V, S> {
    #[inline]
    fn is_loaded(&self, key: ChunkKey) -> bool {
        self.contains_key(&key)
    }
}

impl<S: BuildHasher> ChunkPresence for hashbrown::HashSet<ChunkKey, S> {
    #[inline]
    fn is_loaded(&self, key: ChunkKey) -> bool {
        self.contains(&key)
    }
}

impl<S: BuildHasher> ChunkPresence for std::collections::HashSet<ChunkKey, S> {
    #[inline]
    fn is_loaded(&self, key: ChunkKey) -> bool {
        self.contains(&key)
    }
}

impl ChunkPresence for [ChunkKey] {
    #[inline]
    fn is_loaded(&self, key: ChunkKey) -> bool {
        self.contains(&key)
    }
}

impl<T: ChunkPresence + ?Sized> ChunkPresence for &T {
    #[inline]
    fn is_loaded(&self, key: ChunkKey) -> bool {
        (**self).is_loaded(key)
    }
}
