//! Heightmap-backed terrain: a regular grid of samples stretched over the
//! configured world area and bilinearly interpolated.

use std::path::Path;

use crate::{HeightSource, TerrainError};

/// A height field backed by a row-major grid of samples.
///
/// Sample `(0, 0)` sits at world `(0, 0)` and sample `(columns-1, rows-1)` at
/// world `(width, depth)` of the configured area. Queries outside the area are
/// clamped to the nearest edge sample.
#[derive(Clone, Debug)]
pub struct GridTerrain {
    samples: Vec<f32>,
    columns: usize,
    rows: usize,
    width: f32,
    depth: f32,
}

impl GridTerrain {
    /// Build a grid from raw samples. The area defaults to one world unit per
    /// sample spacing until [`HeightSource::set_area`] is called.
    pub fn from_samples(
        columns: usize,
        rows: usize,
        samples: Vec<f32>,
    ) -> Result<Self, TerrainError> {
        if columns < 2 || rows < 2 {
            return Err(TerrainError::GridTooSmall { columns, rows });
        }
        let expected = columns * rows;
        if samples.len() != expected {
            return Err(TerrainError::SampleCountMismatch {
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            samples,
            columns,
            rows,
            width: (columns - 1) as f32,
            depth: (rows - 1) as f32,
        })
    }

    /// Load a grayscale heightmap image; full white maps to `vertical_scale`.
    pub fn from_image(path: &Path, vertical_scale: f32) -> Result<Self, TerrainError> {
        let image = image::open(path)?.into_luma16();
        let (columns, rows) = (image.width() as usize, image.height() as usize);
        let samples = image
            .pixels()
            .map(|p| f32::from(p.0[0]) / f32::from(u16::MAX) * vertical_scale)
            .collect();
        log::info!("Loaded {columns}x{rows} heightmap from {}", path.display());
        Self::from_samples(columns, rows, samples)
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    fn sample(&self, column: usize, row: usize) -> f32 {
        self.samples[row * self.columns + column]
    }
}

impl HeightSource for GridTerrain {
    fn height(&self, x: f32, z: f32) -> f32 {
        let max_u = (self.columns - 1) as f32;
        let max_v = (self.rows - 1) as f32;
        let u = (x / self.width * max_u).clamp(0.0, max_u);
        let v = (z / self.depth * max_v).clamp(0.0, max_v);

        let c0 = (u.floor() as usize).min(self.columns - 2);
        let r0 = (v.floor() as usize).min(self.rows - 2);
        let fu = u - c0 as f32;
        let fv = v - r0 as f32;

        let bottom = self.sample(c0, r0) * (1.0 - fu) + self.sample(c0 + 1, r0) * fu;
        let top = self.sample(c0, r0 + 1) * (1.0 - fu) + self.sample(c0 + 1, r0 + 1) * fu;
        bottom * (1.0 - fv) + top * fv
    }

    fn set_area(&mut self, width: f32, depth: f32) {
        self.width = width;
        self.depth = depth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_grid() -> GridTerrain {
        // 3x3 grid rising by 1 per column.
        let samples = vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 1.0, 2.0];
        GridTerrain::from_samples(3, 3, samples).unwrap()
    }

    #[test]
    fn test_exact_samples_at_grid_points() {
        let mut grid = ramp_grid();
        grid.set_area(100.0, 100.0);
        assert_eq!(grid.height(0.0, 0.0), 0.0);
        assert_eq!(grid.height(50.0, 0.0), 1.0);
        assert_eq!(grid.height(100.0, 100.0), 2.0);
    }

    #[test]
    fn test_bilinear_between_samples() {
        let mut grid = ramp_grid();
        grid.set_area(100.0, 100.0);
        assert!((grid.height(25.0, 40.0) - 0.5).abs() < 1e-6);
        assert!((grid.height(75.0, 90.0) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_area_clamps_to_edge() {
        let mut grid = ramp_grid();
        grid.set_area(100.0, 100.0);
        assert_eq!(grid.height(-10.0, 50.0), 0.0);
        assert_eq!(grid.height(103.0, 50.0), 2.0);
    }

    #[test]
    fn test_rejects_degenerate_grid() {
        let err = GridTerrain::from_samples(1, 4, vec![0.0; 4]).unwrap_err();
        assert!(matches!(err, TerrainError::GridTooSmall { columns: 1, rows: 4 }));
    }

    #[test]
    fn test_rejects_sample_count_mismatch() {
        let err = GridTerrain::from_samples(2, 2, vec![0.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            TerrainError::SampleCountMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_load_from_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("height.png");
        let mut img = image::GrayImage::new(2, 2);
        img.put_pixel(1, 0, image::Luma([255]));
        img.put_pixel(1, 1, image::Luma([255]));
        img.save(&path).unwrap();

        let mut grid = GridTerrain::from_image(&path, 10.0).unwrap();
        grid.set_area(1.0, 1.0);
        assert_eq!(grid.columns(), 2);
        assert!(grid.height(0.0, 0.5).abs() < 1e-4);
        assert!((grid.height(1.0, 0.5) - 10.0).abs() < 1e-4);
    }
}
