//! Height source selection for the demo.

use tessera_config::{TerrainConfig, TerrainKind};
use tessera_terrain::{GridTerrain, HeightSource, NoiseTerrain, TerrainError};

#[derive(Debug, thiserror::Error)]
pub enum DemoTerrainError {
    #[error("terrain kind is Heightmap but no heightmap path is configured")]
    MissingHeightmap,

    #[error(transparent)]
    Terrain(#[from] TerrainError),
}

/// The height sources the demo can fly over.
pub enum DemoTerrain {
    Noise(NoiseTerrain),
    Grid(GridTerrain),
}

impl DemoTerrain {
    pub fn from_config(config: &TerrainConfig) -> Result<Self, DemoTerrainError> {
        match config.kind {
            TerrainKind::Noise => Ok(Self::Noise(NoiseTerrain::new(config.noise_params()))),
            TerrainKind::Heightmap => {
                let path = config
                    .heightmap
                    .as_deref()
                    .ok_or(DemoTerrainError::MissingHeightmap)?;
                Ok(Self::Grid(GridTerrain::from_image(path, config.vertical_scale)?))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Noise(_) => "noise",
            Self::Grid(_) => "heightmap",
        }
    }
}

impl HeightSource for DemoTerrain {
    fn height(&self, x: f32, z: f32) -> f32 {
        match self {
            Self::Noise(noise) => noise.height(x, z),
            Self::Grid(grid) => grid.height(x, z),
        }
    }

    fn set_area(&mut self, width: f32, depth: f32) {
        match self {
            Self::Noise(noise) => noise.set_area(width, depth),
            Self::Grid(grid) => grid.set_area(width, depth),
        }
    }
}
