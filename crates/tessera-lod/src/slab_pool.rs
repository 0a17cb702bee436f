//! Fixed-capacity vertex arena carved into equal slabs, one per leaf patch.
//!
//! The arena is allocated once at construction. Patches acquire and return
//! slabs by index as the quadtree splits and merges, so the number of
//! concurrently live leaves can never exceed the pool capacity. Running out
//! of slabs is an ordinary outcome that callers handle by keeping coarser
//! detail.

use crate::TerrainVertex;

/// Index of one slab inside a [`VertexSlabPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlabIndex(u32);

impl SlabIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Every slab in the pool is currently held by a patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("vertex slab pool exhausted: all {capacity} slabs are in use")]
pub struct PoolExhausted {
    pub capacity: usize,
}

/// Owns the vertex arena and the free set of slabs.
pub struct VertexSlabPool {
    /// `capacity * slab_len` vertices, slab `i` at `i * slab_len`.
    vertices: Vec<TerrainVertex>,
    slab_len: usize,
    /// Free slabs; popped from the back, so low indices are handed out first.
    free: Vec<SlabIndex>,
    /// Per-slab ownership flag, guards against double release.
    allocated: Vec<bool>,
}

impl VertexSlabPool {
    /// Create a pool of `capacity` slabs of `slab_len` vertices each.
    pub fn new(capacity: usize, slab_len: usize) -> Self {
        Self {
            vertices: vec![TerrainVertex::default(); capacity * slab_len],
            slab_len,
            free: (0..capacity as u32).rev().map(SlabIndex).collect(),
            allocated: vec![false; capacity],
        }
    }

    /// Take a free slab.
    pub fn allocate(&mut self) -> Result<SlabIndex, PoolExhausted> {
        let slab = self.free.pop().ok_or(PoolExhausted {
            capacity: self.capacity(),
        })?;
        self.allocated[slab.index()] = true;
        Ok(slab)
    }

    /// Take `N` slabs at once, or none at all.
    pub fn allocate_many<const N: usize>(&mut self) -> Result<[SlabIndex; N], PoolExhausted> {
        if self.free.len() < N {
            return Err(PoolExhausted {
                capacity: self.capacity(),
            });
        }
        let mut slabs = [SlabIndex(0); N];
        for slot in &mut slabs {
            *slot = self.allocate()?;
        }
        Ok(slabs)
    }

    /// Return a slab to the free set.
    ///
    /// Releasing a slab that is not allocated is a caller bug: it trips a
    /// debug assertion, and release builds log it and leave the free set
    /// untouched.
    pub fn deallocate(&mut self, slab: SlabIndex) {
        let Some(allocated) = self.allocated.get_mut(slab.index()) else {
            debug_assert!(false, "slab {} does not belong to this pool", slab.0);
            log::error!("Ignoring release of foreign slab {}", slab.0);
            return;
        };
        debug_assert!(*allocated, "slab {} released twice", slab.0);
        if !*allocated {
            log::error!("Ignoring double release of slab {}", slab.0);
            return;
        }
        *allocated = false;
        self.free.push(slab);
    }

    /// Whether `slab` is currently held by a patch.
    pub fn is_allocated(&self, slab: SlabIndex) -> bool {
        self.allocated.get(slab.index()).copied().unwrap_or(false)
    }

    /// The vertices of one slab.
    pub fn slab(&self, slab: SlabIndex) -> &[TerrainVertex] {
        let start = self.base_vertex(slab) as usize;
        &self.vertices[start..start + self.slab_len]
    }

    /// Writable view over one slab's vertices.
    pub fn slab_mut(&mut self, slab: SlabIndex) -> &mut [TerrainVertex] {
        let start = self.base_vertex(slab) as usize;
        &mut self.vertices[start..start + self.slab_len]
    }

    /// Offset of the slab's first vertex in the whole arena.
    pub fn base_vertex(&self, slab: SlabIndex) -> u32 {
        slab.0 * self.slab_len as u32
    }

    /// The whole arena, for backends that mirror it in one buffer.
    pub fn vertices(&self) -> &[TerrainVertex] {
        &self.vertices
    }

    pub fn capacity(&self) -> usize {
        self.allocated.len()
    }

    /// Number of free slabs.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Number of slabs currently held.
    pub fn in_use(&self) -> usize {
        self.capacity() - self.available()
    }

    /// Vertices per slab.
    pub fn slab_len(&self) -> usize {
        self.slab_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_hands_out_distinct_slabs() {
        let mut pool = VertexSlabPool::new(4, 9);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(pool.in_use(), 2);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_exhaustion_is_reported_not_fatal() {
        let mut pool = VertexSlabPool::new(2, 4);
        pool.allocate().unwrap();
        pool.allocate().unwrap();
        assert_eq!(pool.allocate(), Err(PoolExhausted { capacity: 2 }));
        assert_eq!(pool.in_use(), 2);
    }

    #[test]
    fn test_released_slab_is_reused() {
        let mut pool = VertexSlabPool::new(3, 4);
        let a = pool.allocate().unwrap();
        let _b = pool.allocate().unwrap();
        pool.deallocate(a);
        assert!(!pool.is_allocated(a));
        assert_eq!(pool.allocate().unwrap(), a);
    }

    #[test]
    fn test_allocate_many_is_all_or_nothing() {
        let mut pool = VertexSlabPool::new(5, 4);
        let _held = pool.allocate().unwrap();
        let _held2 = pool.allocate().unwrap();

        assert!(pool.allocate_many::<4>().is_err());
        assert_eq!(pool.available(), 3, "failed bulk allocation must not leak");

        let slabs = pool.allocate_many::<3>().unwrap();
        assert_eq!(pool.available(), 0);
        for slab in slabs {
            assert!(pool.is_allocated(slab));
        }
    }

    #[test]
    fn test_slabs_are_disjoint_views() {
        let mut pool = VertexSlabPool::new(2, 3);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        pool.slab_mut(a).fill(TerrainVertex::new(1.0, 1.0, 1.0));
        pool.slab_mut(b).fill(TerrainVertex::new(2.0, 2.0, 2.0));

        assert_eq!(pool.base_vertex(b), 3);
        assert!(pool.slab(a).iter().all(|v| v.position == [1.0; 3]));
        assert!(pool.slab(b).iter().all(|v| v.position == [2.0; 3]));
        assert_eq!(pool.vertices().len(), 6);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "released twice")]
    fn test_double_release_asserts_in_debug() {
        let mut pool = VertexSlabPool::new(2, 4);
        let a = pool.allocate().unwrap();
        pool.deallocate(a);
        pool.deallocate(a);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_double_release_is_ignored_in_release() {
        let mut pool = VertexSlabPool::new(2, 4);
        let a = pool.allocate().unwrap();
        pool.deallocate(a);
        pool.deallocate(a);
        assert_eq!(pool.available(), 2);
        let x = pool.allocate().unwrap();
        let y = pool.allocate().unwrap();
        assert_ne!(x, y);
    }
}
