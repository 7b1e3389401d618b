//! Shared constants for strata-mesh-cpu. Centralizes common magic numbers.

/// Snap grid for stored vertex coordinates, as a fraction of the tile stride.
/// A power of two so snapped values are exact in f32.
pub(crate) const SNAP_DIVISIONS: f32 = 4096.0;

/// Side faces thinner than this (world units) are not emitted.
pub(crate) const MIN_SIDE_SPAN: f32 = 1e-4;

/// Default UV inset from each edge of a unit UV cell.
pub const DEFAULT_UV_INSET: f32 = 0.001;

/// Default vertex merge distance for edge welding (world units).
pub const DEFAULT_WELD_EPSILON: f32 = 0.001;

/// Default depth a depressed tile sits below its nominal height.
pub const DEFAULT_DEPRESSION_DEPTH: f32 = 0.2;

// Colors
pub(crate) const OPAQUE_ALPHA: u8 = 255;
