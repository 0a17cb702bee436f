//! GPU mirror of a patch tree's vertex slab pool.
//!
//! All slabs share one vertex buffer laid out exactly like the CPU arena, so
//! a leaf's `base_vertex` is valid on both sides. Each slab also owns a fixed
//! region of one index buffer. Draw calls received during a frame are
//! recorded and replayed into a render pass with [`GpuTerrainBackend::encode`].

use tessera_lod::{DrawCall, LodSettings, RenderBackend, SlabIndex, TerrainVertex};

const VERTEX_SIZE: wgpu::BufferAddress = std::mem::size_of::<TerrainVertex>() as wgpu::BufferAddress;
const INDEX_SIZE: wgpu::BufferAddress = std::mem::size_of::<u32>() as wgpu::BufferAddress;

/// Vertex layout of [`TerrainVertex`]: a single `vec3<f32>` position at location 0.
pub const TERRAIN_VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: VERTEX_SIZE,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x3,
    }],
};

/// One recorded leaf draw, ready to replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuDraw {
    /// First index of the slab's region in the shared index buffer.
    pub first_index: u32,
    pub index_count: u32,
    pub base_vertex: i32,
    /// Patch depth, passed to the shader as the instance index for tinting.
    pub level: u32,
}

/// [`RenderBackend`] that writes slabs straight into wgpu buffers.
pub struct GpuTerrainBackend {
    queue: wgpu::Queue,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    indices_per_slab: u32,
    draws: Vec<GpuDraw>,
    bytes_uploaded: u64,
}

impl GpuTerrainBackend {
    /// Allocate buffers large enough for every slab the tree can hold.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, settings: &LodSettings) -> Self {
        let slabs = settings.pool_capacity as wgpu::BufferAddress;
        let vertex_bytes = slabs * settings.vertices_per_patch() as wgpu::BufferAddress * VERTEX_SIZE;
        let index_bytes = slabs * settings.indices_per_patch() as wgpu::BufferAddress * INDEX_SIZE;

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terrain-slab-vertices"),
            size: vertex_bytes,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terrain-slab-indices"),
            size: index_bytes,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::info!(
            "Terrain GPU buffers: {} KiB vertices, {} KiB indices",
            vertex_bytes / 1024,
            index_bytes / 1024
        );

        Self {
            queue: queue.clone(),
            vertex_buffer,
            index_buffer,
            indices_per_slab: settings.indices_per_patch() as u32,
            draws: Vec::new(),
            bytes_uploaded: 0,
        }
    }

    /// Drop last frame's draw list. Call before [`PatchTree::per_frame`](tessera_lod::PatchTree::per_frame).
    pub fn begin_frame(&mut self) {
        self.draws.clear();
        self.bytes_uploaded = 0;
    }

    /// Replay this frame's draws. The caller sets the pipeline and bind groups.
    pub fn encode(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        if self.draws.is_empty() {
            return;
        }
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        for draw in &self.draws {
            render_pass.draw_indexed(
                draw.first_index..draw.first_index + draw.index_count,
                draw.base_vertex,
                draw.level..draw.level + 1,
            );
        }
    }

    pub fn draws(&self) -> &[GpuDraw] {
        &self.draws
    }

    /// Bytes written to the GPU since [`GpuTerrainBackend::begin_frame`].
    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded
    }

    fn first_index(&self, slab: SlabIndex) -> u32 {
        slab.index() as u32 * self.indices_per_slab
    }
}

impl RenderBackend for GpuTerrainBackend {
    fn upload_vertices(&mut self, _slab: SlabIndex, base_vertex: u32, vertices: &[TerrainVertex]) {
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let offset = wgpu::BufferAddress::from(base_vertex) * VERTEX_SIZE;
        self.queue.write_buffer(&self.vertex_buffer, offset, bytes);
        self.bytes_uploaded += bytes.len() as u64;
    }

    fn upload_indices(&mut self, slab: SlabIndex, indices: &[u32]) {
        debug_assert!(indices.len() <= self.indices_per_slab as usize);
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        let offset = wgpu::BufferAddress::from(self.first_index(slab)) * INDEX_SIZE;
        self.queue.write_buffer(&self.index_buffer, offset, bytes);
        self.bytes_uploaded += bytes.len() as u64;
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        self.draws.push(GpuDraw {
            first_index: self.first_index(call.slab),
            index_count: call.indices.len() as u32,
            base_vertex: call.base_vertex as i32,
            level: u32::from(call.level),
        });
    }
}
