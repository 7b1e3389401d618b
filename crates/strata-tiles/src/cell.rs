use serde::{Deserialize, Serialize};

/// Opaque reference to a texture owned by the atlas/canvas collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextureRef(pub String);

impl TextureRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TextureRef {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// One validated terrain tile. Cells are replaced wholesale, never patched.
#[derive(Clone, Debug, PartialEq)]
pub struct TileCell {
    pub height: f32,
    pub depressed: bool,
    pub top: TextureRef,
    pub middle: TextureRef,
    pub water: bool,
    /// Vertex brightness in `[0, 1]`.
    pub lighting: f32,
    /// Decoration payloads handed through to the decoration collaborator.
    pub roads: Vec<toml::Value>,
    pub speckles: Vec<toml::Value>,
}

impl TileCell {
    /// A plain land tile with the same texture on top and sides.
    pub fn solid(height: f32, texture: impl Into<TextureRef>) -> Self {
        let tex = texture.into();
        Self {
            height,
            depressed: false,
            top: tex.clone(),
            middle: tex,
            water: false,
            lighting: 1.0,
            roads: Vec::new(),
            speckles: Vec::new(),
        }
    }

    pub fn with_water(mut self, water: bool) -> Self {
        self.water = water;
        self
    }

    pub fn with_depressed(mut self, depressed: bool) -> Self {
        self.depressed = depressed;
        self
    }

    /// Height of the top surface once the depression is applied.
    #[inline]
    pub fn elevation(&self, depression_depth: f32) -> f32 {
        if self.depressed {
            self.height - depression_depth
        } else {
            self.height
        }
    }

    /// Water surfaces are see-through and never hide a neighbor's side.
    #[inline]
    pub fn occludes(&self) -> bool {
        !self.water
    }
}

impl From<String> for TextureRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}
