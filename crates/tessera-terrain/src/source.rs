//! The height-field contract consumed by the LOD engine.

/// A deterministic height function over world `(x, z)`.
///
/// Implementations must be defined continuously over the configured area and
/// slightly beyond it: patch builds sample half a grid step past the far edge
/// of every patch, so queries just outside `[0, width] × [0, depth]` happen on
/// every tile border. What an out-of-area query returns is up to the source.
pub trait HeightSource {
    /// Height at world position `(x, z)`.
    fn height(&self, x: f32, z: f32) -> f32;

    /// Configure the world-space area the source covers.
    ///
    /// Called once by the patch tree before the first build.
    fn set_area(&mut self, _width: f32, _depth: f32) {}
}

impl<F> HeightSource for F
where
    F: Fn(f32, f32) -> f32,
{
    fn height(&self, x: f32, z: f32) -> f32 {
        self(x, z)
    }
}

/// A constant-height plane.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlatTerrain {
    /// Height returned everywhere.
    pub elevation: f32,
}

impl FlatTerrain {
    pub fn new(elevation: f32) -> Self {
        Self { elevation }
    }
}

impl HeightSource for FlatTerrain {
    fn height(&self, _x: f32, _z: f32) -> f32 {
        self.elevation
    }
}
