//! Tuning knobs for the patch tree.

use crate::LodError;

/// Configuration for a [`PatchTree`](crate::PatchTree).
#[derive(Clone, Debug, PartialEq)]
pub struct LodSettings {
    /// Vertices per patch edge. Default: 17.
    pub resolution: u32,
    /// Maximum projected error, in pixels, a patch may show before it splits. Default: 4.
    pub error_threshold_pixels: f32,
    /// Maximum number of concurrently live leaf slabs. Default: 1024.
    pub pool_capacity: usize,
    /// Merge dead-zone factor: an internal patch merges only once the viewer is
    /// further than `switch_distance * hysteresis`. 1.0 is the literal rule.
    pub hysteresis: f32,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            resolution: 17,
            error_threshold_pixels: 4.0,
            pool_capacity: 1024,
            hysteresis: 1.0,
        }
    }
}

impl LodSettings {
    /// Check every field, returning the first invalid one.
    pub fn validate(&self) -> Result<(), LodError> {
        if self.resolution < 2 {
            return Err(LodError::InvalidResolution(self.resolution));
        }
        if self.pool_capacity == 0 {
            return Err(LodError::ZeroPoolCapacity);
        }
        if !self.offsets_fit_u32() {
            return Err(LodError::PoolTooLarge {
                capacity: self.pool_capacity,
                resolution: self.resolution,
            });
        }
        if !(self.error_threshold_pixels.is_finite() && self.error_threshold_pixels > 0.0) {
            return Err(LodError::InvalidErrorThreshold(self.error_threshold_pixels));
        }
        if !(self.hysteresis.is_finite() && self.hysteresis >= 1.0) {
            return Err(LodError::InvalidHysteresis(self.hysteresis));
        }
        Ok(())
    }

    /// Whether every vertex and index offset into a full pool fits in `u32`.
    fn offsets_fit_u32(&self) -> bool {
        let res = u64::from(self.resolution);
        let cells = res.saturating_sub(1);
        let per_slab = (res * res).max(cells * cells * 6);
        (self.pool_capacity as u64)
            .checked_mul(per_slab)
            .is_some_and(|total| total <= u64::from(u32::MAX))
    }

    /// Vertices in one slab (`resolution²`).
    pub fn vertices_per_patch(&self) -> usize {
        let res = self.resolution as usize;
        res * res
    }

    /// Indices in one leaf's triangle list: two triangles per grid cell.
    pub fn indices_per_patch(&self) -> usize {
        let cells = self.resolution.saturating_sub(1) as usize;
        cells * cells * 6
    }
}
