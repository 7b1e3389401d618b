use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use strata_geom::{Aabb, Transform, Vec3};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
    #[error("index count {0} is not a multiple of 3")]
    NotTriangles(usize),
    #[error("attribute lengths disagree with {0} positions")]
    AttributeMismatch(usize),
    #[error("merged geometry would need {0} vertices")]
    VertexOverflow(usize),
}

/// Triangle-list geometry shared by every object of a model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelGeometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<(f32, f32)>,
    pub indices: Vec<u32>,
}

impl ModelGeometry {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().copied())
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        let n = self.positions.len();
        if self.normals.len() != n || self.uvs.len() != n {
            return Err(GeometryError::AttributeMismatch(n));
        }
        if self.indices.len() % 3 != 0 {
            return Err(GeometryError::NotTriangles(self.indices.len()));
        }
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Err(GeometryError::IndexOutOfRange {
                index,
                vertex_count: n,
            });
        }
        Ok(())
    }

    /// Appends `src` transformed into world space. Indices are rebased onto
    /// the vertices already present.
    pub(crate) fn append_transformed(
        &mut self,
        src: &ModelGeometry,
        t: &Transform,
        max_vertices: usize,
    ) -> Result<(), GeometryError> {
        src.validate()?;
        let base = self.positions.len();
        let total = base + src.positions.len();
        if total > max_vertices || total > u32::MAX as usize {
            return Err(GeometryError::VertexOverflow(total));
        }
        self.positions
            .extend(src.positions.iter().map(|&p| t.transform_point(p)));
        self.normals
            .extend(src.normals.iter().map(|&n| t.transform_normal(n)));
        self.uvs.extend_from_slice(&src.uvs);
        let base = base as u32;
        self.indices.extend(src.indices.iter().map(|&i| i + base));
        Ok(())
    }
}

/// A reusable model: geometry plus the material it is drawn with.
#[derive(Clone, Debug)]
pub struct Model {
    pub id: ModelId,
    pub material: MaterialId,
    pub geometry: Arc<ModelGeometry>,
}

/// A world object placed inside a chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedObject {
    pub id: ObjectId,
    pub model: ModelId,
    pub transform: Transform,
}

#[derive(Default)]
pub struct ModelLibrary {
    models: HashMap<ModelId, Model>,
}

impl ModelLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a model; returns the previous one.
    pub fn register(&mut self, model: Model) -> Option<Model> {
        self.models.insert(model.id, model)
    }

    #[inline]
    pub fn get(&self, id: ModelId) -> Option<&Model> {
        self.models.get(&id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
