//! wgpu rendering for LOD terrain patches.

mod backend;
mod pipeline;

pub use backend::{GpuDraw, GpuTerrainBackend, TERRAIN_VERTEX_LAYOUT};
pub use pipeline::{CameraUniform, TERRAIN_SHADER_SOURCE, TerrainPipeline, draw_terrain};
