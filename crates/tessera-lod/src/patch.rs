//! Quadtree patch nodes, the arena that owns them, and per-leaf geometry.

use glam::Vec3;
use tessera_terrain::HeightSource;

use crate::{SlabIndex, TerrainVertex, midpoint_error};

/// Handle to a patch in a [`PatchArena`].
///
/// Handles carry a generation, so a handle to a destroyed patch stays dead
/// even after its slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatchId {
    index: u32,
    generation: u32,
}

/// Axis-aligned world-space rectangle covered by a patch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchRect {
    /// Lower-left corner, x.
    pub x: f32,
    /// Lower-left corner, z.
    pub z: f32,
    pub width: f32,
    pub depth: f32,
}

impl PatchRect {
    pub fn new(x: f32, z: f32, width: f32, depth: f32) -> Self {
        Self { x, z, width, depth }
    }

    /// Centre of the rectangle as `(x, z)`.
    pub fn centre(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.z + self.depth * 0.5)
    }

    /// The four half-size quadrants, ordered
    /// \[`(x, z)`, `(x + w/2, z)`, `(x, z + d/2)`, `(x + w/2, z + d/2)`\].
    pub fn quadrants(&self) -> [PatchRect; 4] {
        let hw = self.width * 0.5;
        let hd = self.depth * 0.5;
        [
            PatchRect::new(self.x, self.z, hw, hd),
            PatchRect::new(self.x + hw, self.z, hw, hd),
            PatchRect::new(self.x, self.z + hd, hw, hd),
            PatchRect::new(self.x + hw, self.z + hd, hw, hd),
        ]
    }

    pub fn area(&self) -> f32 {
        self.width * self.depth
    }
}

/// Edge of a patch. Left/right run along x, down/up along z.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
    Down,
    Up,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Down, Side::Up];

    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::Down => Side::Up,
            Side::Up => Side::Down,
        }
    }
}

/// Non-owning links to the patches across each edge.
///
/// Links are never followed for lifetime purposes; a link to a destroyed
/// patch simply stops resolving.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Neighbors {
    pub left: Option<PatchId>,
    pub right: Option<PatchId>,
    pub down: Option<PatchId>,
    pub up: Option<PatchId>,
}

impl Neighbors {
    pub fn get(&self, side: Side) -> Option<PatchId> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
            Side::Down => self.down,
            Side::Up => self.up,
        }
    }

    /// Links for the four children of a split, in quadrant order: siblings
    /// link to each other and outer edges inherit the parent's links.
    pub(crate) fn for_children(outer: Neighbors, children: [PatchId; 4]) -> [Neighbors; 4] {
        let [bl, br, tl, tr] = children;
        [
            Neighbors {
                left: outer.left,
                right: Some(br),
                down: outer.down,
                up: Some(tl),
            },
            Neighbors {
                left: Some(bl),
                right: outer.right,
                down: outer.down,
                up: Some(tr),
            },
            Neighbors {
                left: outer.left,
                right: Some(tr),
                down: Some(bl),
                up: outer.up,
            },
            Neighbors {
                left: Some(tl),
                right: outer.right,
                down: Some(br),
                up: outer.up,
            },
        ]
    }
}

/// What a patch owns: a vertex slab as a leaf, or four children once split.
#[derive(Clone, Debug, PartialEq)]
pub enum PatchKind {
    /// Rendered directly from its slab.
    Leaf {
        slab: SlabIndex,
        /// Slab-relative triangle list.
        indices: Vec<u32>,
    },
    /// Subdivided. Children are ordered as [`PatchRect::quadrants`].
    Internal { children: [PatchId; 4] },
}

/// One quadtree node.
#[derive(Clone, Debug)]
pub struct Patch {
    pub(crate) rect: PatchRect,
    pub(crate) level: u8,
    pub(crate) parent: Option<PatchId>,
    pub(crate) kind: PatchKind,
    /// Valid once this node has been built at least once.
    pub(crate) switch_distance: Option<f32>,
    pub(crate) reference_point: Vec3,
    pub(crate) neighbors: Neighbors,
    pub(crate) dirty_vertices: bool,
    pub(crate) dirty_indices: bool,
}

impl Patch {
    /// A new leaf holding `slab`, with geometry still to be built.
    pub(crate) fn new_leaf(
        rect: PatchRect,
        level: u8,
        parent: Option<PatchId>,
        slab: SlabIndex,
    ) -> Self {
        let (cx, cz) = rect.centre();
        Self {
            rect,
            level,
            parent,
            kind: PatchKind::Leaf {
                slab,
                indices: Vec::new(),
            },
            switch_distance: None,
            reference_point: Vec3::new(cx, 0.0, cz),
            neighbors: Neighbors::default(),
            dirty_vertices: true,
            dirty_indices: true,
        }
    }

    pub fn rect(&self) -> PatchRect {
        self.rect
    }

    /// Depth in the quadtree; the root is level 0.
    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn parent(&self) -> Option<PatchId> {
        self.parent
    }

    pub fn kind(&self) -> &PatchKind {
        &self.kind
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, PatchKind::Leaf { .. })
    }

    pub fn slab(&self) -> Option<SlabIndex> {
        match self.kind {
            PatchKind::Leaf { slab, .. } => Some(slab),
            PatchKind::Internal { .. } => None,
        }
    }

    pub fn children(&self) -> Option<[PatchId; 4]> {
        match self.kind {
            PatchKind::Leaf { .. } => None,
            PatchKind::Internal { children } => Some(children),
        }
    }

    /// The leaf's triangle list; empty for internal patches and unbuilt leaves.
    pub fn indices(&self) -> &[u32] {
        match &self.kind {
            PatchKind::Leaf { indices, .. } => indices,
            PatchKind::Internal { .. } => &[],
        }
    }

    /// Viewer distance below which this patch wants more detail, as of its
    /// most recent build.
    pub fn switch_distance(&self) -> Option<f32> {
        self.switch_distance
    }

    /// Patch centre; carries the sampled terrain height once built.
    pub fn reference_point(&self) -> Vec3 {
        self.reference_point
    }

    pub fn neighbors(&self) -> &Neighbors {
        &self.neighbors
    }

    pub fn needs_rebuild(&self) -> bool {
        self.dirty_vertices || self.dirty_indices
    }

    /// A built leaf with no pending rebuild: the only state a split starts from.
    pub(crate) fn is_clean_leaf(&self) -> bool {
        self.is_leaf() && !self.needs_rebuild() && self.switch_distance.is_some()
    }
}

struct Slot {
    generation: u32,
    patch: Option<Patch>,
}

/// Owns every patch of a tree; patches refer to each other by [`PatchId`].
#[derive(Default)]
pub struct PatchArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl PatchArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, patch: Patch) -> PatchId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.patch = Some(patch);
            return PatchId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            patch: Some(patch),
        });
        PatchId {
            index,
            generation: 0,
        }
    }

    /// Remove a patch, invalidating every outstanding handle to it.
    pub fn remove(&mut self, id: PatchId) -> Option<Patch> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let patch = slot.patch.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(patch)
    }

    pub fn get(&self, id: PatchId) -> Option<&Patch> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.patch.as_ref())
    }

    pub fn get_mut(&mut self, id: PatchId) -> Option<&mut Patch> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.patch.as_mut())
    }

    pub fn contains(&self, id: PatchId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live patches.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

/// Result of sampling one leaf's grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexBuild {
    /// Largest midpoint deviation found in either grid direction.
    pub max_error: f32,
    /// Patch centre with the terrain height sampled there.
    pub reference_point: Vec3,
}

/// Sample `resolution²` grid points over `rect` into `out` (row-major, rows
/// along z) and measure the largest interpolation error.
///
/// Each grid point also samples half a step ahead in x and in z, which for
/// the last row and column lands outside the patch, and on the tile's far
/// edges outside the tile. The height source decides what those queries return.
pub fn build_vertices<H: HeightSource + ?Sized>(
    rect: &PatchRect,
    resolution: u32,
    terrain: &H,
    out: &mut [TerrainVertex],
) -> VertexBuild {
    let res = resolution as usize;
    debug_assert_eq!(out.len(), res * res);

    let dx = rect.width / (resolution - 1) as f32;
    let dz = rect.depth / (resolution - 1) as f32;
    let mut max_error = 0.0_f32;

    for row in 0..res {
        let z = rect.z + row as f32 * dz;
        for col in 0..res {
            let x = rect.x + col as f32 * dx;
            let h = terrain.height(x, z);

            let x_error = midpoint_error(
                h,
                terrain.height(x + dx * 0.5, z),
                terrain.height(x + dx, z),
            );
            let z_error = midpoint_error(
                h,
                terrain.height(x, z + dz * 0.5),
                terrain.height(x, z + dz),
            );
            max_error = max_error.max(x_error.max(z_error));

            out[row * res + col] = TerrainVertex::new(x, h, z);
        }
    }

    let (cx, cz) = rect.centre();
    VertexBuild {
        max_error,
        reference_point: Vec3::new(cx, terrain.height(cx, cz), cz),
    }
}

/// Triangle list over the `(resolution - 1)²` grid cells, two triangles per
/// cell, slab-relative indices.
pub fn build_indices(resolution: u32, out: &mut Vec<u32>) {
    let res = resolution;
    let cells = res.saturating_sub(1);
    out.clear();
    out.reserve((cells * cells * 6) as usize);

    for row in 0..cells {
        for col in 0..cells {
            let index = row * res + col;
            out.extend_from_slice(&[index, index + 1, index + res]);
            out.extend_from_slice(&[index + 1, index + 1 + res, index + res]);
        }
    }
}
