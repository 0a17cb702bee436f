//! Scripted camera path: a descending diagonal approach towards the tile centre.

use glam::Vec3;
use tessera_terrain::HeightSource;

pub struct FlightPath {
    start: Vec3,
    end: Vec3,
    frames: u32,
}

impl FlightPath {
    /// Path from above the tile's near corner at `start_altitude` to above its
    /// centre at `end_altitude`, spread over `frames` frames.
    pub fn new(
        tile_width: f32,
        tile_depth: f32,
        start_altitude: f32,
        end_altitude: f32,
        frames: u32,
    ) -> Self {
        Self {
            start: Vec3::new(tile_width * 0.1, start_altitude, tile_depth * 0.1),
            end: Vec3::new(tile_width * 0.5, end_altitude, tile_depth * 0.5),
            frames,
        }
    }

    /// Camera position at `frame`, with altitude measured above the ground
    /// directly below.
    pub fn position<H: HeightSource + ?Sized>(&self, frame: u32, terrain: &H) -> Vec3 {
        let t = if self.frames > 1 {
            (frame.min(self.frames - 1) as f32) / (self.frames - 1) as f32
        } else {
            1.0
        };
        let p = self.start.lerp(self.end, t);
        Vec3::new(p.x, p.y + terrain.height(p.x, p.z), p.z)
    }

    /// Point the camera looks at: the end of the path, on the ground.
    pub fn target<H: HeightSource + ?Sized>(&self, terrain: &H) -> Vec3 {
        Vec3::new(self.end.x, terrain.height(self.end.x, self.end.z), self.end.z)
    }
}
