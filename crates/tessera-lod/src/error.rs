//! LOD engine error types.

use crate::{PatchId, SlabIndex};

/// Invalid configuration detected when building a tree or its view parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LodError {
    /// A patch needs at least one grid cell.
    #[error("patch resolution must be at least 2 vertices per edge, got {0}")]
    InvalidResolution(u32),

    #[error("slab pool capacity must be non-zero")]
    ZeroPoolCapacity,

    /// Vertex or index offsets into the pool must fit in `u32`.
    #[error("{capacity} slabs at resolution {resolution} overflow 32-bit vertex or index offsets")]
    PoolTooLarge { capacity: usize, resolution: u32 },

    #[error("error threshold must be a positive number of pixels, got {0}")]
    InvalidErrorThreshold(f32),

    #[error("hysteresis factor must be finite and at least 1.0, got {0}")]
    InvalidHysteresis(f32),

    #[error("tile extents must be positive and finite, got {width} x {depth}")]
    InvalidTileSize { width: f32, depth: f32 },

    #[error("near plane distance must be positive and finite, got {0}")]
    InvalidNearPlane(f32),

    #[error("half vertical field of view must lie in (0, pi/2) radians, got {0}")]
    InvalidFieldOfView(f32),

    #[error("viewport height must be positive, got {0}")]
    InvalidViewportHeight(f32),
}

/// A broken structural invariant found by [`PatchTree::check_invariants`](crate::PatchTree::check_invariants).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("patch {0:?} is referenced but not live")]
    MissingPatch(PatchId),

    #[error("leaf {patch:?} holds slab {slab:?} which the pool does not consider allocated")]
    UnallocatedSlab { patch: PatchId, slab: SlabIndex },

    #[error("slab {0:?} is held by more than one leaf")]
    SharedSlab(SlabIndex),

    #[error("child {child:?} does not record {parent:?} as its parent")]
    WrongParent { parent: PatchId, child: PatchId },

    #[error("children of {0:?} do not exactly tile their parent")]
    BadPartition(PatchId),

    #[error("{leaves} leaves but {in_use} slabs in use")]
    SlabCountMismatch { leaves: usize, in_use: usize },

    #[error("{reachable} patches reachable from the root but {live} live in the arena")]
    OrphanedPatches { reachable: usize, live: usize },
}
