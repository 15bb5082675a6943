//! Disk-backed R*-tree spatial index.
//!
//! The index stores multi-dimensional points in fixed-layout nodes
//! sub-allocated inside cached pages, and answers point and range
//! queries. Insertion follows R* semantics: least-enlargement subtree
//! choice, forced reinsertion before splitting, margin-minimizing
//! splits. Deletion condenses under-full nodes and reinserts their
//! entries.

mod node;
mod split;
mod tree;

pub use node::{Branch, Entry, Node, TAG_BRANCH, TAG_LEAF, TAG_POLYGON};
pub use tree::{RStarTree, TreeStats};
