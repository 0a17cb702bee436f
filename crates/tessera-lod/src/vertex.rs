use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// One terrain grid vertex as written into a slab.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
}

impl TerrainVertex {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

const _: () = assert!(std::mem::size_of::<TerrainVertex>() == 12);
