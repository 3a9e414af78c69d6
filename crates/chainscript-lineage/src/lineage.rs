//! The resolved forest and its traversal queries.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use chainscript_types::StoryId;

use crate::node::{LineageCycleWarning, LineageEdge, LineageNode};

/// Story forest rebuilt from a registry snapshot.
///
/// # Invariants
///
/// - Parent links are acyclic.
/// - A node's `level` is its parent's level plus one; roots sit at 0.
/// - `edges` holds exactly one entry per non-root node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    /// Stories without a parent, ordered by id.
    pub roots: Vec<StoryId>,
    /// Parent links, ordered by child id.
    pub edges: Vec<LineageEdge>,
    /// One entry per cut cycle.
    pub warnings: Vec<LineageCycleWarning>,
    nodes: BTreeMap<StoryId, LineageNode>,
}

impl Lineage {
    pub(crate) fn from_parts(
        nodes: BTreeMap<StoryId, LineageNode>,
        edges: Vec<LineageEdge>,
        warnings: Vec<LineageCycleWarning>,
    ) -> Self {
        let roots = nodes
            .values()
            .filter(|node| node.is_root())
            .map(|node| node.story_id.clone())
            .collect();
        Self {
            roots,
            edges,
            warnings,
            nodes,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &StoryId) -> Option<&LineageNode> {
        self.nodes.get(id)
    }

    /// All nodes, ordered by story id.
    pub fn nodes(&self) -> impl Iterator<Item = &LineageNode> {
        self.nodes.values()
    }

    pub fn level_of(&self, id: &StoryId) -> Option<usize> {
        self.nodes.get(id).map(|node| node.level)
    }

    pub fn parent_of(&self, id: &StoryId) -> Option<&StoryId> {
        self.nodes.get(id)?.parent_story_id.as_ref()
    }

    pub fn has_cycles(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Parent chain of a story, nearest first. The story itself is not
    /// included.
    pub fn ancestors(&self, id: &StoryId) -> Vec<&LineageNode> {
        let mut result = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            let Some(node) = self.nodes.get(parent) else {
                break;
            };
            result.push(node);
            current = node.parent_story_id.as_ref();
        }
        result
    }

    /// Every story below `id`, breadth first. The story itself is not
    /// included.
    pub fn descendants(&self, id: &StoryId) -> Vec<&LineageNode> {
        let Some(start) = self.nodes.get(id) else {
            return Vec::new();
        };

        let mut visited = HashSet::new();
        visited.insert(id);
        let mut result = Vec::new();
        let mut queue: VecDeque<&StoryId> = start.children.iter().collect();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(current) {
                result.push(node);
                queue.extend(node.children.iter());
            }
        }

        result
    }

    /// Depth-first walk from every root, yielding `(depth, node)` pairs in
    /// display order.
    pub fn walk(&self) -> Vec<(usize, &LineageNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<&StoryId> = self.roots.iter().rev().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                out.push((node.level, node));
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }
}
