//! Owns one terrain tile's quadtree and drives it once per frame.
//!
//! Each frame runs three walks over the tree:
//!
//! 1. **LOD**: clean leaves whose switch distance exceeds the viewer
//!    distance split; internal patches the viewer has moved beyond merge.
//! 2. **Update**: leaves with stale geometry resample the height source into
//!    their slab and hand the result to the render backend.
//! 3. **Render**: every built leaf issues one indexed draw, in child order.
//!
//! A freshly split child has no switch distance until it is built, so the
//! tree refines at most one level per frame.

use glam::Vec3;
use tessera_terrain::HeightSource;

use crate::{
    DrawCall, InvariantViolation, LodCamera, LodError, LodSettings, Neighbors, Patch, PatchArena,
    PatchId, PatchKind, PatchRect, RenderBackend, Side, VertexSlabPool, ViewParams, build_indices,
    build_vertices, switch_distance,
};

/// Where [`PatchTree::per_frame`] takes its LOD-driving distance from.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum DistanceSource {
    /// Distance from the camera to the root patch's reference point.
    #[default]
    Camera,
    /// A fixed operator-supplied distance, for exercising LOD transitions
    /// without moving the camera.
    Simulated(f32),
}

/// What one frame did to the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Distance fed to the LOD walk.
    pub distance: f32,
    pub splits: u32,
    pub merges: u32,
    /// Splits refused because the slab pool could not supply four children.
    pub declined_splits: u32,
    pub vertex_builds: u32,
    pub index_builds: u32,
    pub draw_calls: u32,
    pub live_leaves: usize,
    pub slabs_in_use: usize,
    /// Deepest leaf level.
    pub max_level: u8,
}

/// A single terrain tile's LOD quadtree and the slab pool backing its leaves.
pub struct PatchTree<H: HeightSource> {
    terrain: H,
    settings: LodSettings,
    pool: VertexSlabPool,
    arena: PatchArena,
    root: PatchId,
    distance_source: DistanceSource,
    /// Counters since the start of the current frame.
    stats: FrameStats,
}

impl<H: HeightSource> PatchTree<H> {
    /// Create a tree over `[0, tile_width] × [0, tile_depth]` with a single
    /// unbuilt root leaf.
    pub fn new(
        mut terrain: H,
        tile_width: f32,
        tile_depth: f32,
        settings: LodSettings,
    ) -> Result<Self, LodError> {
        settings.validate()?;
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(tile_width) || !valid(tile_depth) {
            return Err(LodError::InvalidTileSize {
                width: tile_width,
                depth: tile_depth,
            });
        }

        terrain.set_area(tile_width, tile_depth);

        let mut pool = VertexSlabPool::new(settings.pool_capacity, settings.vertices_per_patch());
        let slab = pool.allocate().map_err(|_| LodError::ZeroPoolCapacity)?;

        let mut arena = PatchArena::new();
        let rect = PatchRect::new(0.0, 0.0, tile_width, tile_depth);
        let root = arena.insert(Patch::new_leaf(rect, 0, None, slab));

        log::debug!(
            "Created patch tree: {tile_width}x{tile_depth} tile, {} slabs of {} vertices",
            settings.pool_capacity,
            settings.vertices_per_patch()
        );

        Ok(Self {
            terrain,
            settings,
            pool,
            arena,
            root,
            distance_source: DistanceSource::Camera,
            stats: FrameStats::default(),
        })
    }

    pub fn set_distance_source(&mut self, source: DistanceSource) {
        self.distance_source = source;
    }

    #[must_use]
    pub fn distance_source(&self) -> DistanceSource {
        self.distance_source
    }

    /// Run one frame: pick the viewer distance, reshape the tree, rebuild
    /// stale leaves and draw.
    pub fn per_frame<B: RenderBackend + ?Sized>(
        &mut self,
        camera: &LodCamera,
        backend: &mut B,
    ) -> FrameStats {
        self.stats = FrameStats::default();

        let distance = match self.distance_source {
            DistanceSource::Simulated(distance) => distance,
            DistanceSource::Camera => camera.position.distance(self.root_reference_point()),
        };
        self.stats.distance = distance;

        self.update_lod(distance);
        self.update(&camera.view, backend);
        self.stats.draw_calls = self.render(backend);

        let leaves = self.leaves();
        self.stats.live_leaves = leaves.len();
        self.stats.slabs_in_use = self.pool.in_use();
        self.stats.max_level = leaves
            .iter()
            .filter_map(|id| self.arena.get(*id))
            .map(Patch::level)
            .max()
            .unwrap_or(0);

        if self.stats.splits + self.stats.merges + self.stats.declined_splits > 0 {
            log::debug!(
                "LOD at distance {distance:.1}: {} splits, {} merges, {} declined, {} leaves",
                self.stats.splits,
                self.stats.merges,
                self.stats.declined_splits,
                self.stats.live_leaves
            );
        }

        self.stats
    }

    /// Split or merge patches so the tree matches `distance`.
    ///
    /// The same distance is applied at every depth. A patch compares it
    /// against the switch distance of its own most recent build: below it a
    /// clean leaf splits, above it (scaled by the hysteresis factor) an
    /// internal patch merges, and an exactly equal distance leaves it alone.
    pub fn update_lod(&mut self, distance: f32) {
        self.update_lod_at(self.root, distance);
    }

    fn update_lod_at(&mut self, id: PatchId, distance: f32) {
        let Some(patch) = self.arena.get(id) else {
            return;
        };
        // Unbuilt or dirty leaves have no trustworthy switch distance yet.
        let Some(switch) = patch.switch_distance else {
            return;
        };

        match patch.children() {
            None => {
                if distance < switch && patch.is_clean_leaf() {
                    self.split(id);
                }
            }
            Some(children) => {
                if distance < switch {
                    for child in children {
                        self.update_lod_at(child, distance);
                    }
                } else if distance > switch * self.settings.hysteresis {
                    self.merge(id);
                }
            }
        }
    }

    /// Turn leaf `id` into an internal patch with four fresh leaf children.
    ///
    /// Only a built leaf with up-to-date geometry can split; the resulting
    /// internal patch keeps that build's switch distance for merge decisions.
    /// The leaf's own slab passes to the first child, so a split needs three
    /// more free slabs. Without them the split is declined and the leaf is
    /// left untouched. Returns whether the split happened.
    pub fn split(&mut self, id: PatchId) -> bool {
        let Some(patch) = self.arena.get(id) else {
            return false;
        };
        if !patch.is_clean_leaf() {
            return false;
        }
        let Some(own) = patch.slab() else {
            return false;
        };
        let rect = patch.rect;
        let level = patch.level;
        let outer = patch.neighbors;

        let [a, b, c] = match self.pool.allocate_many::<3>() {
            Ok(slabs) => slabs,
            Err(err) => {
                self.stats.declined_splits += 1;
                log::debug!("Split of level {level} patch declined: {err}");
                return false;
            }
        };
        let slabs = [own, a, b, c];
        let quadrants = rect.quadrants();

        let children: [PatchId; 4] = std::array::from_fn(|i| {
            self.arena
                .insert(Patch::new_leaf(quadrants[i], level + 1, Some(id), slabs[i]))
        });
        for (child, links) in children.iter().zip(Neighbors::for_children(outer, children)) {
            if let Some(child) = self.arena.get_mut(*child) {
                child.neighbors = links;
            }
        }

        if let Some(patch) = self.arena.get_mut(id) {
            patch.kind = PatchKind::Internal { children };
            patch.dirty_vertices = false;
            patch.dirty_indices = false;
        }
        self.stats.splits += 1;
        true
    }

    /// Collapse internal patch `id` back into a single leaf.
    ///
    /// The whole subtree below it is destroyed and its slabs returned before
    /// a slab for the merged leaf is taken, so merging always succeeds. The
    /// leaf is rebuilt on the next update. Returns whether a merge happened.
    pub fn merge(&mut self, id: PatchId) -> bool {
        let Some(children) = self.arena.get(id).and_then(Patch::children) else {
            return false;
        };
        for child in children {
            self.destroy(child);
        }

        let slab = self
            .pool
            .allocate()
            .expect("a merged subtree releases at least four slabs");
        let Some(patch) = self.arena.get_mut(id) else {
            self.pool.deallocate(slab);
            return false;
        };
        patch.kind = PatchKind::Leaf {
            slab,
            indices: Vec::new(),
        };
        patch.dirty_vertices = true;
        patch.dirty_indices = true;

        self.stats.merges += 1;
        true
    }

    /// Remove `id` and everything below it, children first.
    fn destroy(&mut self, id: PatchId) {
        if let Some(children) = self.arena.get(id).and_then(Patch::children) {
            for child in children {
                self.destroy(child);
            }
        }
        if let Some(slab) = self.arena.remove(id).and_then(|patch| patch.slab()) {
            self.pool.deallocate(slab);
        }
    }

    /// Rebuild the geometry of every leaf marked dirty and upload it.
    pub fn update<B: RenderBackend + ?Sized>(&mut self, view: &ViewParams, backend: &mut B) {
        self.update_at(self.root, view, backend);
    }

    fn update_at<B: RenderBackend + ?Sized>(
        &mut self,
        id: PatchId,
        view: &ViewParams,
        backend: &mut B,
    ) {
        let Some(patch) = self.arena.get(id) else {
            return;
        };
        if let Some(children) = patch.children() {
            for child in children {
                self.update_at(child, view, backend);
            }
            return;
        }

        let Some(slab) = patch.slab() else {
            return;
        };
        let rect = patch.rect;
        let resolution = self.settings.resolution;

        if patch.dirty_vertices {
            let build = build_vertices(
                &rect,
                resolution,
                &self.terrain,
                self.pool.slab_mut(slab),
            );
            let distance = switch_distance(
                build.max_error,
                view,
                self.settings.error_threshold_pixels,
            );
            backend.upload_vertices(slab, self.pool.base_vertex(slab), self.pool.slab(slab));

            if let Some(patch) = self.arena.get_mut(id) {
                patch.switch_distance = Some(distance);
                patch.reference_point = build.reference_point;
                patch.dirty_vertices = false;
            }
            self.stats.vertex_builds += 1;
        }

        let Some(patch) = self.arena.get_mut(id) else {
            return;
        };
        if patch.dirty_indices {
            if let PatchKind::Leaf { indices, .. } = &mut patch.kind {
                build_indices(resolution, indices);
                backend.upload_indices(slab, indices);
            }
            patch.dirty_indices = false;
            self.stats.index_builds += 1;
        }
    }

    /// Issue one draw per built leaf, depth-first in child order. Leaves still
    /// waiting on a rebuild are skipped. Returns the number of draws.
    pub fn render<B: RenderBackend + ?Sized>(&self, backend: &mut B) -> u32 {
        let mut draws = 0;
        self.render_at(self.root, backend, &mut draws);
        draws
    }

    fn render_at<B: RenderBackend + ?Sized>(&self, id: PatchId, backend: &mut B, draws: &mut u32) {
        let Some(patch) = self.arena.get(id) else {
            return;
        };
        match &patch.kind {
            PatchKind::Internal { children } => {
                for child in children {
                    self.render_at(*child, backend, draws);
                }
            }
            PatchKind::Leaf { slab, indices } => {
                if patch.needs_rebuild() {
                    return;
                }
                backend.draw(&DrawCall {
                    patch: id,
                    slab: *slab,
                    base_vertex: self.pool.base_vertex(*slab),
                    indices,
                    level: patch.level,
                });
                *draws += 1;
            }
        }
    }

    #[must_use]
    pub fn patch(&self, id: PatchId) -> Option<&Patch> {
        self.arena.get(id)
    }

    #[must_use]
    pub fn root(&self) -> PatchId {
        self.root
    }

    /// All current leaves, in render order.
    #[must_use]
    pub fn leaves(&self) -> Vec<PatchId> {
        let mut leaves = Vec::new();
        self.collect_leaves(self.root, &mut leaves);
        leaves
    }

    fn collect_leaves(&self, id: PatchId, out: &mut Vec<PatchId>) {
        match self.arena.get(id).map(Patch::children) {
            Some(Some(children)) => {
                for child in children {
                    self.collect_leaves(child, out);
                }
            }
            Some(None) => out.push(id),
            None => {}
        }
    }

    /// The live patch across `side` of `id`, if any.
    #[must_use]
    pub fn neighbor(&self, id: PatchId, side: Side) -> Option<PatchId> {
        self.arena
            .get(id)?
            .neighbors
            .get(side)
            .filter(|other| self.arena.contains(*other))
    }

    #[must_use]
    pub fn pool(&self) -> &VertexSlabPool {
        &self.pool
    }

    #[must_use]
    pub fn terrain(&self) -> &H {
        &self.terrain
    }

    #[must_use]
    pub fn settings(&self) -> &LodSettings {
        &self.settings
    }

    /// Counters accumulated since the last [`PatchTree::per_frame`] began.
    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Number of live patches, leaves and internal.
    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.arena.len()
    }

    fn root_reference_point(&self) -> Vec3 {
        self.arena
            .get(self.root)
            .map_or(Vec3::ZERO, Patch::reference_point)
    }

    /// Walk the whole tree and verify its structure: every leaf holds its own
    /// allocated slab, every internal patch has four children that tile it
    /// exactly and point back at it, and nothing live is unreachable.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut held = vec![false; self.pool.capacity()];
        let mut leaves = 0;
        let mut reachable = 0;
        let mut stack = vec![self.root];

        while let Some(id) = stack.pop() {
            let patch = self
                .arena
                .get(id)
                .ok_or(InvariantViolation::MissingPatch(id))?;
            reachable += 1;

            match &patch.kind {
                PatchKind::Leaf { slab, .. } => {
                    if !self.pool.is_allocated(*slab) {
                        return Err(InvariantViolation::UnallocatedSlab {
                            patch: id,
                            slab: *slab,
                        });
                    }
                    if std::mem::replace(&mut held[slab.index()], true) {
                        return Err(InvariantViolation::SharedSlab(*slab));
                    }
                    leaves += 1;
                }
                PatchKind::Internal { children } => {
                    let quadrants = patch.rect.quadrants();
                    for (child_id, quadrant) in children.iter().zip(quadrants) {
                        let child = self
                            .arena
                            .get(*child_id)
                            .ok_or(InvariantViolation::MissingPatch(*child_id))?;
                        if child.parent != Some(id) {
                            return Err(InvariantViolation::WrongParent {
                                parent: id,
                                child: *child_id,
                            });
                        }
                        if child.rect != quadrant || child.level != patch.level + 1 {
                            return Err(InvariantViolation::BadPartition(id));
                        }
                        stack.push(*child_id);
                    }
                }
            }
        }

        if leaves != self.pool.in_use() {
            return Err(InvariantViolation::SlabCountMismatch {
                leaves,
                in_use: self.pool.in_use(),
            });
        }
        if reachable != self.arena.len() {
            return Err(InvariantViolation::OrphanedPatches {
                reachable,
                live: self.arena.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingBackend;
    use tessera_terrain::{FlatTerrain, NoiseParams, NoiseTerrain};

    const TILE: f32 = 128.0;

    fn wavy(x: f32, z: f32) -> f32 {
        (x * 0.37).sin() * 4.0 + (z * 0.23).cos() * 3.0
    }

    fn step(x: f32, _z: f32) -> f32 {
        if x < 37.3 { 0.0 } else { 10.0 }
    }

    fn tree_with<H: HeightSource>(terrain: H, settings: LodSettings) -> PatchTree<H> {
        PatchTree::new(terrain, TILE, TILE, settings).unwrap()
    }

    fn simulated<H: HeightSource>(terrain: H, distance: f32) -> PatchTree<H> {
        let mut tree = tree_with(terrain, LodSettings::default());
        tree.set_distance_source(DistanceSource::Simulated(distance));
        tree
    }

    /// Build the root so it has a switch distance.
    fn built<H: HeightSource>(terrain: H) -> PatchTree<H> {
        let mut tree = tree_with(terrain, LodSettings::default());
        rebuild(&mut tree);
        tree
    }

    fn rebuild<H: HeightSource>(tree: &mut PatchTree<H>) {
        tree.update(&ViewParams::default(), &mut RecordingBackend::new());
    }

    #[test]
    fn test_new_tree_is_single_dirty_root() {
        let tree = tree_with(wavy, LodSettings::default());
        let root = tree.patch(tree.root()).unwrap();

        assert!(root.is_leaf());
        assert!(root.needs_rebuild());
        assert_eq!(root.switch_distance(), None);
        assert_eq!(root.rect(), PatchRect::new(0.0, 0.0, TILE, TILE));
        assert_eq!(root.level(), 0);
        assert_eq!(tree.pool().in_use(), 1);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_new_rejects_bad_configuration() {
        assert!(matches!(
            PatchTree::new(wavy, 0.0, 10.0, LodSettings::default()),
            Err(LodError::InvalidTileSize { .. })
        ));
        assert!(matches!(
            PatchTree::new(wavy, 10.0, f32::NAN, LodSettings::default()),
            Err(LodError::InvalidTileSize { .. })
        ));
        let settings = LodSettings {
            pool_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            PatchTree::new(wavy, 10.0, 10.0, settings),
            Err(LodError::ZeroPoolCapacity)
        ));
    }

    #[test]
    fn test_new_configures_terrain_area() {
        let terrain = NoiseTerrain::new(NoiseParams::default());
        let tree = PatchTree::new(terrain, 256.0, 512.0, LodSettings::default()).unwrap();
        assert_eq!(tree.terrain().area(), (256.0, 512.0));
    }

    #[test]
    fn test_split_partitions_parent() {
        let mut tree = built(wavy);
        let root = tree.root();
        assert!(tree.split(root));

        let parent = tree.patch(root).unwrap();
        let children = parent.children().unwrap();
        let quadrants = parent.rect().quadrants();
        for (child, quadrant) in children.iter().zip(quadrants) {
            let child = tree.patch(*child).unwrap();
            assert_eq!(child.rect(), quadrant);
            assert_eq!(child.rect().width, TILE / 2.0);
            assert_eq!(child.parent(), Some(root));
            assert!(child.is_leaf());
            assert!(child.needs_rebuild());
        }
        assert_eq!(tree.pool().in_use(), 4);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_split_requires_built_leaf() {
        let mut tree = tree_with(wavy, LodSettings::default());
        let root = tree.root();
        assert!(!tree.split(root));
        assert!(tree.patch(root).unwrap().is_leaf());
        assert_eq!(tree.pool().in_use(), 1);
        assert_eq!(tree.stats().splits, 0);

        // A merged leaf waits for its rebuild before it can split again.
        rebuild(&mut tree);
        assert!(tree.split(root));
        assert!(tree.merge(root));
        assert!(!tree.split(root));
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_early_split_attempt_does_not_stall_lod() {
        let mut tree = tree_with(wavy, LodSettings::default());
        let root = tree.root();
        let camera = LodCamera::default();
        let mut backend = RecordingBackend::new();
        tree.split(root);

        tree.set_distance_source(DistanceSource::Simulated(0.0));
        for _ in 0..6 {
            backend.clear();
            tree.per_frame(&camera, &mut backend);
        }
        assert!(tree.stats().max_level > 1);

        tree.set_distance_source(DistanceSource::Simulated(f32::MAX));
        for _ in 0..6 {
            backend.clear();
            tree.per_frame(&camera, &mut backend);
        }
        let root_patch = tree.patch(root).unwrap();
        assert!(root_patch.is_leaf());
        assert!(root_patch.switch_distance().is_some());
        assert_eq!(tree.pool().in_use(), 1);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_split_rejects_internal_patch() {
        let mut tree = built(wavy);
        let root = tree.root();
        assert!(tree.split(root));
        assert!(!tree.split(root));
        assert_eq!(tree.pool().in_use(), 4);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut tree = tree_with(wavy, LodSettings::default());
        let view = ViewParams::default();
        let mut backend = RecordingBackend::new();

        tree.update(&view, &mut backend);
        assert_eq!(backend.vertex_uploads.len(), 1);
        assert_eq!(backend.index_uploads.len(), 1);
        assert_eq!(tree.stats().vertex_builds, 1);

        backend.clear();
        tree.update(&view, &mut backend);
        assert!(backend.vertex_uploads.is_empty());
        assert!(backend.index_uploads.is_empty());
        assert_eq!(tree.stats().vertex_builds, 1);
        assert_eq!(tree.stats().index_builds, 1);
    }

    #[test]
    fn test_upload_carries_full_slab() {
        let mut tree = tree_with(wavy, LodSettings::default());
        let mut backend = RecordingBackend::new();
        tree.update(&ViewParams::default(), &mut backend);

        let slab = tree.patch(tree.root()).unwrap().slab().unwrap();
        assert_eq!(backend.vertex_uploads, vec![(slab, 17 * 17)]);
        assert_eq!(backend.index_uploads, vec![(slab, 16 * 16 * 6)]);
    }

    #[test]
    fn test_split_then_merge_restores_rect() {
        let mut tree = built(wavy);
        let root = tree.root();
        let before = tree.patch(root).unwrap().rect();

        assert!(tree.split(root));
        assert!(tree.merge(root));

        let after = tree.patch(root).unwrap();
        assert!(after.is_leaf());
        assert!(after.needs_rebuild());
        assert_eq!(after.rect(), before);
        assert_eq!(tree.pool().in_use(), 1);
        assert_eq!(tree.patch_count(), 1);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_merge_releases_whole_subtree() {
        let mut tree = built(wavy);
        let root = tree.root();
        tree.split(root);
        let children = tree.patch(root).unwrap().children().unwrap();
        rebuild(&mut tree);
        assert!(tree.split(children[0]));
        assert!(tree.split(children[3]));
        assert_eq!(tree.pool().in_use(), 10);
        assert_eq!(tree.patch_count(), 13);

        assert!(tree.merge(root));
        assert_eq!(tree.pool().in_use(), 1);
        assert_eq!(tree.patch_count(), 1);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_merge_rejects_leaf() {
        let mut tree = built(wavy);
        assert!(!tree.merge(tree.root()));
        assert_eq!(tree.pool().in_use(), 1);
    }

    #[test]
    fn test_tighter_threshold_gives_larger_switch_distance() {
        let camera = LodCamera::default();
        let mut backend = RecordingBackend::new();
        let mut switch = |pixels: f32| {
            let settings = LodSettings {
                error_threshold_pixels: pixels,
                ..Default::default()
            };
            let mut tree = tree_with(wavy, settings);
            tree.set_distance_source(DistanceSource::Simulated(f32::MAX));
            tree.per_frame(&camera, &mut backend);
            tree.patch(tree.root()).unwrap().switch_distance().unwrap()
        };

        let tight = switch(1.0);
        let loose = switch(8.0);
        assert!(tight > loose);
        assert!((tight / loose - 8.0).abs() < 1e-3);
    }

    #[test]
    fn test_pool_exhaustion_declines_split() {
        let settings = LodSettings {
            pool_capacity: 4,
            ..Default::default()
        };
        let mut tree = tree_with(wavy, settings);
        tree.set_distance_source(DistanceSource::Simulated(0.0));
        let camera = LodCamera::default();
        let mut backend = RecordingBackend::new();

        tree.per_frame(&camera, &mut backend);
        let stats = tree.per_frame(&camera, &mut backend);
        assert_eq!(stats.splits, 1);
        assert_eq!(stats.slabs_in_use, 4);
        let leaves = tree.leaves();
        let rects: Vec<PatchRect> = leaves
            .iter()
            .map(|id| tree.patch(*id).unwrap().rect())
            .collect();

        let stats = tree.per_frame(&camera, &mut backend);
        assert_eq!(stats.splits, 0);
        assert_eq!(stats.declined_splits, 4);
        assert_eq!(stats.slabs_in_use, 4);
        assert_eq!(tree.leaves(), leaves);
        for (id, rect) in leaves.iter().zip(rects) {
            let leaf = tree.patch(*id).unwrap();
            assert!(leaf.is_leaf());
            assert!(!leaf.needs_rebuild());
            assert_eq!(leaf.rect(), rect);
        }
        assert_eq!(stats.draw_calls, 4);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_flat_terrain_never_splits() {
        let mut tree = simulated(FlatTerrain::new(7.0), 0.0);
        let camera = LodCamera::default();
        let mut backend = RecordingBackend::new();

        for _ in 0..3 {
            let stats = tree.per_frame(&camera, &mut backend);
            assert_eq!(stats.splits, 0);
            assert_eq!(stats.live_leaves, 1);
        }
        let switch = tree.patch(tree.root()).unwrap().switch_distance().unwrap();
        assert_eq!(switch, 0.0);
        assert!(!switch.is_nan());
    }

    #[test]
    fn test_step_discontinuity_splits_once() {
        let mut tree = simulated(step, 100.0);
        let camera = LodCamera::default();
        let mut backend = RecordingBackend::new();

        let first = tree.per_frame(&camera, &mut backend);
        assert_eq!(first.splits, 0);
        assert_eq!(first.vertex_builds, 1);
        assert_eq!(first.slabs_in_use, 1);
        // Half-step sample at x=36 sees the low side, x=40 the high side.
        let switch = tree.patch(tree.root()).unwrap().switch_distance().unwrap();
        let expected = 5.0 * ViewParams::default().distance_scale(4.0);
        assert!((switch - expected).abs() < 1e-2);

        let second = tree.per_frame(&camera, &mut backend);
        assert_eq!(second.splits, 1);
        assert_eq!(second.merges, 0);
        assert_eq!(second.slabs_in_use, 4);
        assert_eq!(second.vertex_builds, 4);
        assert_eq!(second.max_level, 1);
    }

    #[test]
    fn test_render_visits_leaves_in_child_order() {
        let mut tree = simulated(step, 100.0);
        let camera = LodCamera::default();
        let mut backend = RecordingBackend::new();
        tree.per_frame(&camera, &mut backend);
        backend.clear();
        tree.per_frame(&camera, &mut backend);

        let children = tree.patch(tree.root()).unwrap().children().unwrap();
        let drawn: Vec<PatchId> = backend.draws.iter().map(|d| d.patch).collect();
        assert_eq!(drawn, children.to_vec());
        assert_eq!(drawn, tree.leaves());

        for draw in &backend.draws {
            assert_eq!(draw.level, 1);
            assert_eq!(draw.index_count, 16 * 16 * 6);
            assert_eq!(draw.base_vertex, draw.slab.index() as u32 * 17 * 17);
        }
        assert_eq!(backend.triangle_count(), 4 * 16 * 16 * 2);
    }

    #[test]
    fn test_render_skips_unbuilt_leaves() {
        let tree = tree_with(wavy, LodSettings::default());
        let mut backend = RecordingBackend::new();
        assert_eq!(tree.render(&mut backend), 0);
        assert!(backend.draws.is_empty());
    }

    #[test]
    fn test_children_link_to_siblings_and_outer_neighbors() {
        let mut tree = built(wavy);
        let root = tree.root();
        tree.split(root);
        let [bl, br, tl, tr] = tree.patch(root).unwrap().children().unwrap();

        assert_eq!(tree.neighbor(bl, Side::Right), Some(br));
        assert_eq!(tree.neighbor(bl, Side::Up), Some(tl));
        assert_eq!(tree.neighbor(bl, Side::Left), None);
        assert_eq!(tree.neighbor(tr, Side::Down), Some(br));
        assert_eq!(tree.neighbor(tr, Side::Left), Some(tl));

        // Grandchildren on the outer edge of `br` inherit its links.
        rebuild(&mut tree);
        assert!(tree.split(br));
        let [gbl, _, gtl, _] = tree.patch(br).unwrap().children().unwrap();
        assert_eq!(tree.neighbor(gbl, Side::Left), Some(bl));
        assert_eq!(tree.neighbor(gtl, Side::Left), Some(bl));
        assert_eq!(tree.neighbor(gtl, Side::Up), Some(tr));
    }

    #[test]
    fn test_destroyed_patches_stop_resolving() {
        let mut tree = built(wavy);
        let root = tree.root();
        tree.split(root);
        let old = tree.patch(root).unwrap().children().unwrap();

        tree.merge(root);
        rebuild(&mut tree);
        assert!(tree.split(root));
        let new = tree.patch(root).unwrap().children().unwrap();

        for id in old {
            assert!(tree.patch(id).is_none());
            assert_eq!(tree.neighbor(id, Side::Right), None);
            assert!(!new.contains(&id));
        }
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_literal_rule_merges_only_beyond_switch_distance() {
        let mut tree = built(wavy);
        let root = tree.root();
        let switch = tree.patch(root).unwrap().switch_distance().unwrap();

        tree.update_lod(switch);
        assert!(tree.patch(root).unwrap().is_leaf(), "equal distance must not split");

        tree.update_lod(switch * 0.5);
        assert!(!tree.patch(root).unwrap().is_leaf());

        tree.update_lod(switch);
        assert!(!tree.patch(root).unwrap().is_leaf(), "equal distance must not merge");

        tree.update_lod(switch * 1.01);
        assert!(tree.patch(root).unwrap().is_leaf());
        assert_eq!(tree.stats().splits, 1);
        assert_eq!(tree.stats().merges, 1);
    }

    #[test]
    fn test_hysteresis_widens_merge_band() {
        let settings = LodSettings {
            hysteresis: 1.5,
            ..Default::default()
        };
        let mut tree = tree_with(wavy, settings);
        tree.update(&ViewParams::default(), &mut RecordingBackend::new());
        let root = tree.root();
        let switch = tree.patch(root).unwrap().switch_distance().unwrap();

        tree.update_lod(switch * 0.5);
        assert!(!tree.patch(root).unwrap().is_leaf());

        tree.update_lod(switch * 1.2);
        assert!(!tree.patch(root).unwrap().is_leaf());

        tree.update_lod(switch * 1.6);
        assert!(tree.patch(root).unwrap().is_leaf());
    }

    #[test]
    fn test_dirty_leaf_does_not_split() {
        let mut tree = tree_with(wavy, LodSettings::default());
        tree.update_lod(0.0);
        assert!(tree.patch(tree.root()).unwrap().is_leaf());
        assert_eq!(tree.stats().splits, 0);
    }

    #[test]
    fn test_camera_distance_uses_root_reference_point() {
        let mut tree = tree_with(FlatTerrain::new(5.0), LodSettings::default());
        let mut backend = RecordingBackend::new();
        let camera = LodCamera::new(Vec3::new(64.0, 5.0, 94.0), ViewParams::default());

        // Before the first build the reference point sits at height zero.
        let first = tree.per_frame(&camera, &mut backend);
        assert!((first.distance - (25.0_f32 + 900.0).sqrt()).abs() < 1e-4);

        let second = tree.per_frame(&camera, &mut backend);
        assert!((second.distance - 30.0).abs() < 1e-4);
        assert_eq!(
            tree.patch(tree.root()).unwrap().reference_point(),
            Vec3::new(64.0, 5.0, 64.0)
        );
    }

    #[test]
    fn test_invariants_hold_during_fly_over() {
        let terrain = NoiseTerrain::new(NoiseParams::default());
        let settings = LodSettings {
            pool_capacity: 64,
            resolution: 9,
            ..Default::default()
        };
        let mut tree = PatchTree::new(terrain, 1024.0, 1024.0, settings).unwrap();
        let mut backend = RecordingBackend::new();

        for frame in 0..40 {
            let height = 4000.0 - frame as f32 * 100.0;
            let position = Vec3::new(512.0, height.abs(), 512.0);
            let camera = LodCamera::new(position, ViewParams::default());
            let stats = tree.per_frame(&camera, &mut backend);

            assert_eq!(tree.check_invariants(), Ok(()));
            assert_eq!(stats.live_leaves, stats.slabs_in_use);
            assert!(stats.slabs_in_use <= 64);
            assert_eq!(stats.draw_calls as usize, stats.live_leaves);
        }
    }
}
