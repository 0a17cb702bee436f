//! The seam between the patch tree and whatever draws it.

use crate::{PatchId, SlabIndex, TerrainVertex};

/// One leaf draw issued during [`PatchTree::render`](crate::PatchTree::render).
#[derive(Clone, Copy, Debug)]
pub struct DrawCall<'a> {
    pub patch: PatchId,
    pub slab: SlabIndex,
    /// Offset added to every index, i.e. the slab's first vertex in the arena.
    pub base_vertex: u32,
    /// Slab-relative triangle list.
    pub indices: &'a [u32],
    /// Quadtree depth of the patch, for debug colouring.
    pub level: u8,
}

/// Receives geometry uploads and draw requests from a patch tree.
///
/// Uploads for a slab always arrive before the first draw that uses it in a
/// frame. A backend may keep per-slab state: a slab index is reused only
/// after its previous owner is gone.
pub trait RenderBackend {
    /// The slab's vertices changed.
    fn upload_vertices(&mut self, slab: SlabIndex, base_vertex: u32, vertices: &[TerrainVertex]);

    /// The slab's triangle list changed.
    fn upload_indices(&mut self, slab: SlabIndex, indices: &[u32]);

    fn draw(&mut self, call: &DrawCall<'_>);
}

/// Owned copy of a [`DrawCall`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedDraw {
    pub patch: PatchId,
    pub slab: SlabIndex,
    pub base_vertex: u32,
    pub index_count: usize,
    pub level: u8,
}

/// Backend that just records what it was asked to do. Used headless and in tests.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    /// `(slab, vertex count)` per vertex upload.
    pub vertex_uploads: Vec<(SlabIndex, usize)>,
    /// `(slab, index count)` per index upload.
    pub index_uploads: Vec<(SlabIndex, usize)>,
    pub draws: Vec<RecordedDraw>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything recorded so far.
    pub fn clear(&mut self) {
        self.vertex_uploads.clear();
        self.index_uploads.clear();
        self.draws.clear();
    }

    /// Total triangles across all recorded draws.
    pub fn triangle_count(&self) -> usize {
        self.draws.iter().map(|d| d.index_count / 3).sum()
    }
}

impl RenderBackend for RecordingBackend {
    fn upload_vertices(&mut self, slab: SlabIndex, _base_vertex: u32, vertices: &[TerrainVertex]) {
        self.vertex_uploads.push((slab, vertices.len()));
    }

    fn upload_indices(&mut self, slab: SlabIndex, indices: &[u32]) {
        self.index_uploads.push((slab, indices.len()));
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        self.draws.push(RecordedDraw {
            patch: call.patch,
            slab: call.slab,
            base_vertex: call.base_vertex,
            index_count: call.indices.len(),
            level: call.level,
        });
    }
}
