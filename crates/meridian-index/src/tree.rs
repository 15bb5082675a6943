//! Disk-backed R*-tree.
//!
//! `M` and `N` are the minimum and maximum branch factors. The tree
//! owns its nodes through the root handle and downward traversal;
//! parent handles are non-owning back references used for ascent
//! during split and condense.

use crate::node::{Branch, Entry, Node, TAG_BRANCH, TAG_LEAF};
use crate::split;
use meridian_common::geom::{Point, Rect, DIMENSIONS};
use meridian_common::{IndexConfig, MeridianError, Result};
use meridian_storage::{NodeAllocator, NodeHandle, PinnedPtr};
use std::path::{Path, PathBuf};

/// Fraction of an overflowing node's entries removed for forced
/// reinsertion.
const REINSERT_FRACTION: f64 = 0.3;

/// A disk-backed R*-tree over multi-dimensional points.
///
/// The page cache, the node allocator, and the backing file are owned
/// here; the only external state is the backing file plus a meta file
/// holding the root handle, rewritten on [`RStarTree::flush`].
///
/// The buffer pool must be able to hold at least one page per tree
/// level, since a descent pins the path it walks.
pub struct RStarTree<const M: usize, const N: usize> {
    allocator: NodeAllocator,
    root: NodeHandle,
    meta_path: PathBuf,
    /// One flag per level: whether this top-level operation has
    /// already forced a reinsertion there.
    has_reinserted: Vec<bool>,
}

impl<const M: usize, const N: usize> RStarTree<M, N> {
    /// Opens or creates the index described by `config`.
    ///
    /// A fresh backing file gets an empty leaf as the root. A
    /// non-empty one is reopened by reading the root handle from
    /// `<backing_file>.meta`.
    pub fn open(config: IndexConfig) -> Result<Self> {
        assert!(M >= 1, "minimum branch factor must be at least 1");
        assert!(N > M, "maximum branch factor must exceed the minimum");
        assert!(
            2 * M <= N + 1,
            "an overfull node must admit a split into two legal halves"
        );

        let allocator = NodeAllocator::open(&config)?;
        allocator.register_type_size(TAG_LEAF, Node::<M, N>::SIZE as u16);
        allocator.register_type_size(TAG_BRANCH, Node::<M, N>::SIZE as u16);

        let meta_path = meta_path_for(&config.backing_file);

        let root = if allocator.cache().preexisting_page_count() == 0 {
            let (mut ptr, handle) = allocator.allocate::<Node<M, N>>(TAG_LEAF)?;
            ptr.write(Node::new(handle, NodeHandle::null(), 0));
            handle
        } else {
            read_meta(&meta_path)?
        };

        let root_level = allocator.resolve::<Node<M, N>>(root)?.level;
        tracing::debug!(%root, root_level, "index opened");

        Ok(Self {
            allocator,
            root,
            meta_path,
            has_reinserted: vec![false; root_level as usize + 1],
        })
    }

    /// Writes every dirty page back to the backing file, then rewrites
    /// the meta file with the current root handle.
    pub fn flush(&self) -> Result<()> {
        self.allocator.cache().writeback_all_pages()?;
        std::fs::write(&self.meta_path, self.root.to_bytes())?;
        Ok(())
    }

    /// The current root handle.
    pub fn root_handle(&self) -> NodeHandle {
        self.root
    }

    fn node(&self, handle: NodeHandle) -> Result<PinnedPtr<'_, Node<M, N>>> {
        self.allocator.resolve(handle)
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Inserts a point.
    pub fn insert(&mut self, point: Point) -> Result<()> {
        let root_level = self.node(self.root)?.level;
        self.has_reinserted.clear();
        self.has_reinserted.resize(root_level as usize + 1, false);

        self.insert_entry(Entry::Point(point), 0)
    }

    /// Inserts an entry into some node at `level`, handling overflow.
    fn insert_entry(&mut self, entry: Entry, level: u16) -> Result<()> {
        let rect = entry.rect();
        let target = self.choose_subtree(&rect, level)?;

        let full = self.node(target)?.is_full();
        if full {
            return self.overflow_treatment(target, entry, level);
        }

        {
            let mut node = self.node(target)?;
            let pushed = node.push(entry);
            debug_assert!(pushed);
        }
        if let Entry::Branch(b) = entry {
            let mut child = self.node(b.child)?;
            child.parent = target;
        }
        self.adjust_upward(target)
    }

    /// Descends from the root to the node at `target_level` whose
    /// rectangle needs the least enlargement to admit `rect`. Ties go
    /// to the smaller area, then (directly above the leaves) to the
    /// smaller overlap enlargement.
    fn choose_subtree(&self, rect: &Rect, target_level: u16) -> Result<NodeHandle> {
        let mut current = self.root;
        loop {
            let node = self.node(current)?;
            debug_assert!(node.level >= target_level);
            if node.level == target_level {
                return Ok(current);
            }

            let at_leaf_parent = node.level == 1;
            let entries = node.entries();
            let mut best: Option<(usize, f64, f64)> = None;
            for (i, e) in entries.iter().enumerate() {
                let b = e.as_branch().expect("entries above the leaves are branches");
                let enlargement = b.rect.expansion_area(rect);
                let area = b.rect.area();
                let better = match best {
                    None => true,
                    Some((best_i, best_enl, best_area)) => {
                        enlargement < best_enl
                            || (enlargement == best_enl && area < best_area)
                            || (enlargement == best_enl
                                && area == best_area
                                && at_leaf_parent
                                && overlap_enlargement(entries, i, rect)
                                    < overlap_enlargement(entries, best_i, rect))
                    }
                };
                if better {
                    best = Some((i, enlargement, area));
                }
            }

            let (idx, _, _) = best.expect("descending through a node with no entries");
            let child = entries[idx].as_branch().expect("chosen entry is a branch").child;
            drop(node);
            current = child;
        }
    }

    /// R* overflow treatment: forced reinsertion the first time a
    /// level overflows within one top-level operation, split after
    /// that. The root never reinserts, it splits.
    fn overflow_treatment(&mut self, handle: NodeHandle, extra: Entry, level: u16) -> Result<()> {
        let is_root = handle == self.root;
        if !is_root && !self.has_reinserted[level as usize] {
            self.has_reinserted[level as usize] = true;
            self.forced_reinsert(handle, extra, level)
        } else {
            self.split_and_propagate(handle, extra)
        }
    }

    /// Removes the entries furthest from the node's centre and
    /// reinserts them from the top.
    fn forced_reinsert(&mut self, handle: NodeHandle, extra: Entry, level: u16) -> Result<()> {
        let mut all = self.node(handle)?.entries().to_vec();
        all.push(extra);

        let count = ((N as f64) * REINSERT_FRACTION).round() as usize;
        let count = count.clamp(1, all.len() - M);
        let (keep, reinsert) = split::reinsert_split(&all, count);

        {
            let mut node = self.node(handle)?;
            node.set_entries(&keep);
        }

        // The extra entry had no parent yet; if it stayed, it does now.
        if let Entry::Branch(b) = extra {
            if keep.contains(&extra) {
                let mut child = self.node(b.child)?;
                child.parent = handle;
            }
        }
        self.adjust_upward(handle)?;

        tracing::debug!(%handle, level, reinserted = reinsert.len(), "forced reinsertion");
        for e in reinsert {
            self.insert_entry(e, level)?;
        }
        Ok(())
    }

    /// Splits an overfull node and propagates the new sibling upward,
    /// growing a new root when the old root splits.
    fn split_and_propagate(&mut self, handle: NodeHandle, extra: Entry) -> Result<()> {
        let (level, parent_handle, mut all) = {
            let node = self.node(handle)?;
            (node.level, node.parent, node.entries().to_vec())
        };
        all.push(extra);

        let (first, second) = split::split_entries::<M>(&all);
        let bbox_first = entries_bbox(&first);
        let bbox_second = entries_bbox(&second);

        {
            let mut node = self.node(handle)?;
            node.set_entries(&first);
        }

        let tag = if level == 0 { TAG_LEAF } else { TAG_BRANCH };
        let sibling_handle = {
            let (mut ptr, new_handle) = self.allocator.allocate::<Node<M, N>>(tag)?;
            let mut sibling = Node::new(new_handle, parent_handle, level);
            sibling.set_entries(&second);
            ptr.write(sibling);
            new_handle
        };
        tracing::debug!(%handle, sibling = %sibling_handle, level, "node split");

        if level > 0 {
            for e in &second {
                let b = e.as_branch().expect("entries above the leaves are branches");
                let mut child = self.node(b.child)?;
                child.parent = sibling_handle;
            }
            if let Entry::Branch(b) = extra {
                if first.contains(&extra) {
                    let mut child = self.node(b.child)?;
                    child.parent = handle;
                }
            }
        }

        if parent_handle.is_null() {
            // Root split: grow a new root over both halves.
            let new_root = {
                let (mut ptr, new_root) = self.allocator.allocate::<Node<M, N>>(TAG_BRANCH)?;
                let mut root_node = Node::new(new_root, NodeHandle::null(), level + 1);
                root_node.push(Entry::Branch(Branch {
                    child: handle,
                    rect: bbox_first,
                }));
                root_node.push(Entry::Branch(Branch {
                    child: sibling_handle,
                    rect: bbox_second,
                }));
                ptr.write(root_node);
                new_root
            };
            {
                let mut first_half = self.node(handle)?;
                first_half.parent = new_root;
            }
            {
                let mut second_half = self.node(sibling_handle)?;
                second_half.parent = new_root;
            }
            self.root = new_root;
            self.has_reinserted.push(false);
            tracing::debug!(root = %new_root, height = level + 2, "tree grew a level");
            return Ok(());
        }

        {
            let mut parent = self.node(parent_handle)?;
            let idx = parent
                .find_branch(handle)
                .expect("split node registered in its parent");
            parent.branch_mut(idx).rect = bbox_first;
        }

        let new_branch = Entry::Branch(Branch {
            child: sibling_handle,
            rect: bbox_second,
        });
        let parent_full = self.node(parent_handle)?.is_full();
        if parent_full {
            self.overflow_treatment(parent_handle, new_branch, level + 1)
        } else {
            {
                let mut parent = self.node(parent_handle)?;
                let pushed = parent.push(new_branch);
                debug_assert!(pushed);
            }
            self.adjust_upward(parent_handle)
        }
    }

    /// Tightens ancestor bounding rectangles from `handle` to the
    /// root.
    fn adjust_upward(&self, mut handle: NodeHandle) -> Result<()> {
        loop {
            let (parent_handle, bbox) = {
                let node = self.node(handle)?;
                (node.parent, node.bounding_box())
            };
            if parent_handle.is_null() {
                return Ok(());
            }
            {
                let mut parent = self.node(parent_handle)?;
                let idx = parent
                    .find_branch(handle)
                    .expect("child registered in its parent");
                parent.branch_mut(idx).rect = bbox;
            }
            handle = parent_handle;
        }
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Removes one instance of `point`. Removing an absent point is a
    /// silent no-op.
    pub fn remove(&mut self, point: Point) -> Result<()> {
        let root_level = self.node(self.root)?.level;
        self.has_reinserted.clear();
        self.has_reinserted.resize(root_level as usize + 1, false);

        let Some(leaf) = self.find_leaf(self.root, &point)? else {
            return Ok(());
        };

        {
            let mut node = self.node(leaf)?;
            let idx = node
                .entries()
                .iter()
                .position(|e| e.as_point() == Some(&point))
                .expect("find_leaf returned a leaf holding the point");
            node.remove(idx);
        }

        self.condense_tree(leaf)?;

        // A branch root left with a single entry promotes that child.
        loop {
            let promote = {
                let root = self.node(self.root)?;
                if !root.is_leaf() && root.len() == 1 {
                    Some(root.entry(0).as_branch().expect("branch root entry").child)
                } else {
                    None
                }
            };
            let Some(child) = promote else { break };

            let old_root = self.root;
            {
                let mut new_root = self.node(child)?;
                new_root.parent = NodeHandle::null();
            }
            self.allocator.free(old_root, Node::<M, N>::SIZE as u16);
            self.root = child;
            self.has_reinserted.pop();
            tracing::debug!(root = %child, "root promoted after condense");
        }

        Ok(())
    }

    /// Finds the leaf containing `point`, if any.
    fn find_leaf(&self, handle: NodeHandle, point: &Point) -> Result<Option<NodeHandle>> {
        let node = self.node(handle)?;
        if node.is_leaf() {
            let found = node.entries().iter().any(|e| e.as_point() == Some(point));
            return Ok(found.then_some(handle));
        }

        let children: Vec<NodeHandle> = node
            .entries()
            .iter()
            .filter_map(|e| e.as_branch())
            .filter(|b| b.rect.contains_point(point))
            .map(|b| b.child)
            .collect();
        drop(node);

        for child in children {
            if let Some(found) = self.find_leaf(child, point)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Walks from `handle` to the root, detaching under-full nodes and
    /// reinserting their entries at their original levels.
    fn condense_tree(&mut self, mut handle: NodeHandle) -> Result<()> {
        let mut orphans: Vec<(Entry, u16)> = Vec::new();

        loop {
            let (parent_handle, underfull, level) = {
                let node = self.node(handle)?;
                (node.parent, node.is_underfull(), node.level)
            };
            if parent_handle.is_null() {
                break;
            }

            if underfull {
                let entries = self.node(handle)?.entries().to_vec();
                {
                    let mut parent = self.node(parent_handle)?;
                    let idx = parent
                        .find_branch(handle)
                        .expect("condensed node registered in its parent");
                    parent.remove(idx);
                }
                tracing::debug!(%handle, level, orphaned = entries.len(), "condensing node");
                for e in entries {
                    orphans.push((e, level));
                }
                self.allocator.free(handle, Node::<M, N>::SIZE as u16);
            } else {
                let bbox = self.node(handle)?.bounding_box();
                let mut parent = self.node(parent_handle)?;
                let idx = parent
                    .find_branch(handle)
                    .expect("child registered in its parent");
                parent.branch_mut(idx).rect = bbox;
            }

            handle = parent_handle;
        }

        for (entry, level) in orphans {
            self.insert_entry(entry, level)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Returns every stored point equal to `point`.
    pub fn search_point(&self, point: &Point) -> Result<Vec<Point>> {
        let mut out = Vec::new();
        self.search_point_in(self.root, point, &mut out)?;
        Ok(out)
    }

    fn search_point_in(
        &self,
        handle: NodeHandle,
        point: &Point,
        out: &mut Vec<Point>,
    ) -> Result<()> {
        let node = self.node(handle)?;
        if node.is_leaf() {
            out.extend(
                node.entries()
                    .iter()
                    .filter_map(|e| e.as_point())
                    .filter(|p| *p == point)
                    .copied(),
            );
            return Ok(());
        }

        let children: Vec<NodeHandle> = node
            .entries()
            .iter()
            .filter_map(|e| e.as_branch())
            .filter(|b| b.rect.contains_point(point))
            .map(|b| b.child)
            .collect();
        drop(node);

        for child in children {
            self.search_point_in(child, point, out)?;
        }
        Ok(())
    }

    /// Returns every stored point inside `rect` (borders inclusive).
    pub fn search_rect(&self, rect: &Rect) -> Result<Vec<Point>> {
        let mut out = Vec::new();
        self.search_rect_in(self.root, rect, &mut out)?;
        Ok(out)
    }

    fn search_rect_in(&self, handle: NodeHandle, rect: &Rect, out: &mut Vec<Point>) -> Result<()> {
        let node = self.node(handle)?;
        if node.is_leaf() {
            out.extend(
                node.entries()
                    .iter()
                    .filter_map(|e| e.as_point())
                    .filter(|p| rect.contains_point(p))
                    .copied(),
            );
            return Ok(());
        }

        let children: Vec<NodeHandle> = node
            .entries()
            .iter()
            .filter_map(|e| e.as_branch())
            .filter(|b| b.rect.intersects(rect))
            .map(|b| b.child)
            .collect();
        drop(node);

        for child in children {
            self.search_rect_in(child, rect, out)?;
        }
        Ok(())
    }

    /// Visits every leaf, ignoring bounding rectangles. Exists to
    /// cross-check the guided searches.
    pub fn exhaustive_search(&self, point: &Point) -> Result<Vec<Point>> {
        let mut out = Vec::new();
        self.visit_leaves(self.root, &mut |p| {
            if p == *point {
                out.push(p);
            }
        })?;
        Ok(out)
    }

    fn visit_leaves(&self, handle: NodeHandle, visit: &mut impl FnMut(Point)) -> Result<()> {
        let node = self.node(handle)?;
        if node.is_leaf() {
            for e in node.entries() {
                if let Some(p) = e.as_point() {
                    visit(*p);
                }
            }
            return Ok(());
        }

        let children: Vec<NodeHandle> = node
            .entries()
            .iter()
            .filter_map(|e| e.as_branch())
            .map(|b| b.child)
            .collect();
        drop(node);

        for child in children {
            self.visit_leaves(child, visit)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Order-independent checksum over all stored points: the wrapping
    /// sum of every coordinate truncated to u32.
    pub fn checksum(&self) -> Result<u32> {
        let mut sum: u32 = 0;
        self.visit_leaves(self.root, &mut |p| {
            for d in 0..DIMENSIONS {
                sum = sum.wrapping_add(p[d] as u32);
            }
        })?;
        Ok(sum)
    }

    /// Checks the structural invariants: fill bounds, level
    /// consistency, bounding-rectangle containment, and parent back
    /// references. Returns false (and logs) on the first violation.
    pub fn validate(&self) -> Result<bool> {
        self.validate_node(self.root, NodeHandle::null(), None, None)
    }

    fn validate_node(
        &self,
        handle: NodeHandle,
        expected_parent: NodeHandle,
        expected_level: Option<u16>,
        enclosing: Option<Rect>,
    ) -> Result<bool> {
        let node = self.node(handle)?;

        if node.self_handle != handle {
            tracing::warn!(%handle, "validate: self handle mismatch");
            return Ok(false);
        }
        if node.parent != expected_parent {
            tracing::warn!(%handle, "validate: parent mismatch");
            return Ok(false);
        }
        if let Some(level) = expected_level {
            if node.level != level {
                tracing::warn!(%handle, level = node.level, expected = level, "validate: level mismatch");
                return Ok(false);
            }
        }

        let is_root = expected_parent.is_null();
        if !is_root && (node.len() < M || node.len() > N) {
            tracing::warn!(%handle, len = node.len(), "validate: fill bounds violated");
            return Ok(false);
        }

        if let Some(rect) = enclosing {
            if !node.is_empty() && !rect.contains_rect(&node.bounding_box()) {
                tracing::warn!(%handle, "validate: branch rectangle does not enclose subtree");
                return Ok(false);
            }
        }

        if node.is_leaf() {
            let all_points = node.entries().iter().all(|e| e.as_point().is_some());
            if !all_points {
                tracing::warn!(%handle, "validate: branch entry in a leaf");
            }
            return Ok(all_points);
        }

        let level = node.level;
        let children: Vec<Branch> = node
            .entries()
            .iter()
            .map(|e| match e.as_branch() {
                Some(b) => *b,
                None => Branch {
                    child: NodeHandle::null(),
                    rect: Rect::EMPTY,
                },
            })
            .collect();
        drop(node);

        for b in children {
            if b.child.is_null() {
                tracing::warn!(%handle, "validate: point entry in a branch node");
                return Ok(false);
            }
            if !self.validate_node(b.child, handle, Some(level - 1), Some(b.rect))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Collects tree statistics and logs them.
    pub fn stat(&self) -> Result<TreeStats> {
        let mut stats = TreeStats {
            height: self.node(self.root)?.level as u32 + 1,
            ..TreeStats::default()
        };
        self.stat_node(self.root, &mut stats)?;

        let cache = self.allocator.cache().stats();
        stats.resident_pages = cache.pool.used_frames as u64;
        stats.file_pages = cache.file_pages as u64;

        tracing::info!(
            height = stats.height,
            nodes = stats.nodes,
            points = stats.points,
            resident_pages = stats.resident_pages,
            file_pages = stats.file_pages,
            "tree statistics"
        );
        Ok(stats)
    }

    fn stat_node(&self, handle: NodeHandle, stats: &mut TreeStats) -> Result<()> {
        let node = self.node(handle)?;
        stats.nodes += 1;
        if node.is_leaf() {
            stats.leaves += 1;
            stats.points += node.len() as u64;
            return Ok(());
        }

        stats.branch_entries += node.len() as u64;
        let children: Vec<NodeHandle> = node
            .entries()
            .iter()
            .filter_map(|e| e.as_branch())
            .map(|b| b.child)
            .collect();
        drop(node);

        for child in children {
            self.stat_node(child, stats)?;
        }
        Ok(())
    }

    /// Logs the tree shape, one line per node.
    pub fn print(&self) -> Result<()> {
        let mut dump = String::new();
        self.print_node(self.root, 0, &mut dump)?;
        tracing::info!("tree dump:\n{}", dump);
        Ok(())
    }

    fn print_node(&self, handle: NodeHandle, depth: usize, out: &mut String) -> Result<()> {
        use std::fmt::Write;

        let node = self.node(handle)?;
        let indent = "  ".repeat(depth);
        let _ = writeln!(
            out,
            "{}{} level={} entries={}",
            indent,
            handle,
            node.level,
            node.len()
        );

        if node.is_leaf() {
            for e in node.entries() {
                if let Some(p) = e.as_point() {
                    let _ = writeln!(out, "{}  {}", indent, p);
                }
            }
            return Ok(());
        }

        let children: Vec<NodeHandle> = node
            .entries()
            .iter()
            .filter_map(|e| e.as_branch())
            .map(|b| b.child)
            .collect();
        drop(node);

        for child in children {
            self.print_node(child, depth + 1, out)?;
        }
        Ok(())
    }

    /// Renders the tree as Graphviz DOT text.
    pub fn visualize(&self) -> Result<String> {
        use std::fmt::Write;

        let mut dot = String::from("digraph rstar {\n  node [shape=record];\n");
        self.visualize_node(self.root, &mut dot)?;
        let _ = writeln!(dot, "}}");
        Ok(dot)
    }

    fn visualize_node(&self, handle: NodeHandle, out: &mut String) -> Result<()> {
        use std::fmt::Write;

        let node = self.node(handle)?;
        let name = node_name(handle);
        let _ = writeln!(
            out,
            "  {} [label=\"{} | level {} | {} entries\"];",
            name,
            handle,
            node.level,
            node.len()
        );

        if node.is_leaf() {
            return Ok(());
        }

        let children: Vec<NodeHandle> = node
            .entries()
            .iter()
            .filter_map(|e| e.as_branch())
            .map(|b| b.child)
            .collect();
        drop(node);

        for child in children {
            let _ = writeln!(out, "  {} -> {};", name, node_name(child));
            self.visualize_node(child, out)?;
        }
        Ok(())
    }
}

impl<const M: usize, const N: usize> Drop for RStarTree<M, N> {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            tracing::warn!(%err, "flush on drop failed");
        }
    }
}

/// Statistics about the tree and its storage.
#[derive(Debug, Clone, Default)]
pub struct TreeStats {
    /// Number of levels, leaves included.
    pub height: u32,
    /// Total node count.
    pub nodes: u64,
    /// Leaf node count.
    pub leaves: u64,
    /// Branch entry count across all internal nodes.
    pub branch_entries: u64,
    /// Stored point count.
    pub points: u64,
    /// Pages resident in the buffer pool.
    pub resident_pages: u64,
    /// Pages in the backing file.
    pub file_pages: u64,
}

/// `<backing_file>.meta`, next to the backing file.
fn meta_path_for(backing_file: &Path) -> PathBuf {
    let mut name = backing_file.as_os_str().to_os_string();
    name.push(".meta");
    PathBuf::from(name)
}

/// Reads the root handle from the meta file. Trailing bytes are
/// ignored.
fn read_meta(path: &Path) -> Result<NodeHandle> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < NodeHandle::SERIALIZED_SIZE {
        return Err(MeridianError::CorruptMeta {
            path: path.display().to_string(),
        });
    }
    let mut buf = [0u8; NodeHandle::SERIALIZED_SIZE];
    buf.copy_from_slice(&bytes[..NodeHandle::SERIALIZED_SIZE]);
    let handle = NodeHandle::from_bytes(&buf);
    if handle.is_null() {
        return Err(MeridianError::CorruptMeta {
            path: path.display().to_string(),
        });
    }
    Ok(handle)
}

/// How much admitting `rect` into entry `idx` would increase its
/// overlap with the sibling entries.
fn overlap_enlargement(entries: &[Entry], idx: usize, rect: &Rect) -> f64 {
    let own = entries[idx].rect();
    let expanded = own.union(rect);
    let mut delta = 0.0;
    for (j, other) in entries.iter().enumerate() {
        if j == idx {
            continue;
        }
        let other = other.rect();
        delta += expanded.overlap_area(&other) - own.overlap_area(&other);
    }
    delta
}

fn entries_bbox(entries: &[Entry]) -> Rect {
    let mut bbox = Rect::EMPTY;
    for e in entries {
        bbox.expand(&e.rect());
    }
    bbox
}

fn node_name(handle: NodeHandle) -> String {
    format!("n{}_{}", handle.page_id().0, handle.offset())
}
