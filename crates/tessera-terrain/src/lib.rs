//! Height sources for the terrain LOD engine: the height-field contract plus
//! flat, procedural (fBm noise) and heightmap-backed implementations.

mod error;
mod grid;
mod heightmap;
mod source;

pub use error::TerrainError;
pub use grid::GridTerrain;
pub use heightmap::{NoiseParams, NoiseTerrain};
pub use source::{FlatTerrain, HeightSource};
