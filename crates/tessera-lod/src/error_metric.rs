//! Conversion between world-space geometric error and the viewer distance at
//! which that error projects to the pixel tolerance.

use glam::Vec3;

use crate::LodError;

/// Projection parameters the error metric depends on.
///
/// Passed explicitly into every build rather than read from a renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewParams {
    near: f32,
    half_fov_y: f32,
    viewport_height: f32,
}

impl ViewParams {
    /// Create view parameters from a near plane distance, half the vertical
    /// field of view in radians, and the viewport height in pixels.
    pub fn new(near: f32, half_fov_y: f32, viewport_height: f32) -> Result<Self, LodError> {
        if !(near.is_finite() && near > 0.0) {
            return Err(LodError::InvalidNearPlane(near));
        }
        if !(half_fov_y > 0.0 && half_fov_y < std::f32::consts::FRAC_PI_2) {
            return Err(LodError::InvalidFieldOfView(half_fov_y));
        }
        if !(viewport_height.is_finite() && viewport_height > 0.0) {
            return Err(LodError::InvalidViewportHeight(viewport_height));
        }
        Ok(Self {
            near,
            half_fov_y,
            viewport_height,
        })
    }

    /// Same as [`ViewParams::new`] but takes the full vertical field of view.
    pub fn from_vertical_fov(
        near: f32,
        fov_y: f32,
        viewport_height: f32,
    ) -> Result<Self, LodError> {
        Self::new(near, fov_y * 0.5, viewport_height)
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn half_fov_y(&self) -> f32 {
        self.half_fov_y
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    /// Factor turning world-space error into switch distance for a given
    /// pixel tolerance.
    pub fn distance_scale(&self, error_threshold_pixels: f32) -> f32 {
        let top = self.half_fov_y.tan() * self.near;
        let a = self.near / top;
        let t = (2.0 * error_threshold_pixels) / self.viewport_height;
        a / t
    }
}

impl Default for ViewParams {
    /// 45° vertical field of view, 0.1 near plane, 720 pixel viewport.
    fn default() -> Self {
        Self {
            near: 0.1,
            half_fov_y: std::f32::consts::FRAC_PI_8,
            viewport_height: 720.0,
        }
    }
}

/// Viewer state consumed once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LodCamera {
    /// Viewer position in world space.
    pub position: Vec3,
    pub view: ViewParams,
}

impl LodCamera {
    pub fn new(position: Vec3, view: ViewParams) -> Self {
        Self { position, view }
    }
}

/// Distance beyond which `max_error` world units project to fewer than
/// `error_threshold_pixels` on screen.
///
/// Zero error yields zero distance.
pub fn switch_distance(max_error: f32, view: &ViewParams, error_threshold_pixels: f32) -> f32 {
    max_error * view.distance_scale(error_threshold_pixels)
}

/// Deviation of the true midpoint height from the linear interpolation of
/// the two endpoint heights.
pub fn midpoint_error(start: f32, midpoint: f32, end: f32) -> f32 {
    (midpoint - (start + end) * 0.5).abs()
}
