//! Quadtree level-of-detail engine for height-field terrain.
//!
//! A [`PatchTree`] splits and merges square terrain patches so that the
//! projected geometric error of every visible patch stays under a pixel
//! tolerance. Leaf patches draw their vertices from a fixed-capacity
//! [`VertexSlabPool`], which bounds memory and, when exhausted, caps detail
//! instead of failing.

mod backend;
mod error;
mod error_metric;
mod patch;
mod patch_tree;
mod settings;
mod slab_pool;
mod vertex;

pub use backend::{DrawCall, RecordedDraw, RecordingBackend, RenderBackend};
pub use error::{InvariantViolation, LodError};
pub use error_metric::{LodCamera, ViewParams, midpoint_error, switch_distance};
pub use patch::{
    Neighbors, Patch, PatchArena, PatchId, PatchKind, PatchRect, Side, VertexBuild,
    build_indices, build_vertices,
};
pub use patch_tree::{DistanceSource, FrameStats, PatchTree};
pub use settings::LodSettings;
pub use slab_pool::{PoolExhausted, SlabIndex, VertexSlabPool};
pub use vertex::TerrainVertex;
