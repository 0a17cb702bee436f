//! Terrain source error types.

/// Errors that can occur when building a height source.
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    /// The heightmap image could not be opened or decoded.
    #[error("failed to load heightmap: {0}")]
    ImageLoad(#[from] image::ImageError),

    /// A grid needs at least 2×2 samples to interpolate between.
    #[error("heightmap grid must be at least 2x2 samples, got {columns}x{rows}")]
    GridTooSmall { columns: usize, rows: usize },

    /// Sample buffer length does not match the declared grid dimensions.
    #[error("heightmap has {actual} samples, expected {expected}")]
    SampleCountMismatch { expected: usize, actual: usize },
}
