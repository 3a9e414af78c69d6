//! Parent resolution, cycle breaking, and level assignment.
//!
//! Each story's parent is the first of these that applies:
//! 1. its explicit `parent_story_id`, if that names another existing story;
//! 2. the owner of its `parent_block_hash`, if another story owns it;
//! 3. the owner of the first `parent_block_hash` in its chain that belongs
//!    to a different story;
//! 4. none, making it a root.
//!
//! Stories are processed in id order, so the result is deterministic for a
//! given snapshot.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use chainscript_ledger::{BlockLocation, RegistrySnapshot, StoryRecord};
use chainscript_types::{BlockHash, StoryId};

use crate::lineage::Lineage;
use crate::node::{EdgeSource, LineageCycleWarning, LineageEdge, LineageNode};

/// Rebuild the lineage forest of a snapshot.
pub fn resolve_lineage(snapshot: &RegistrySnapshot) -> Lineage {
    LineageResolver::new(snapshot).resolve()
}

/// Single-pass lineage resolver over one snapshot.
pub struct LineageResolver<'a> {
    stories: BTreeMap<&'a StoryId, &'a StoryRecord>,
    owners: HashMap<BlockHash, BlockLocation>,
}

impl<'a> LineageResolver<'a> {
    pub fn new(snapshot: &'a RegistrySnapshot) -> Self {
        Self {
            stories: snapshot.stories.iter().map(|s| (&s.id, s)).collect(),
            owners: snapshot.hash_index(),
        }
    }

    pub fn resolve(&self) -> Lineage {
        let mut parents: BTreeMap<StoryId, (StoryId, EdgeSource)> = BTreeMap::new();
        for story in self.stories.values() {
            if let Some(link) = self.parent_link(story) {
                parents.insert(story.id.clone(), link);
            }
        }

        let warnings = break_cycles(self.stories.keys().copied(), &mut parents);

        let edges: Vec<LineageEdge> = parents
            .iter()
            .map(|(child, (parent, source))| LineageEdge {
                parent: parent.clone(),
                child: child.clone(),
                source: *source,
            })
            .collect();

        let nodes = self.build_nodes(&parents);
        debug!(
            stories = nodes.len(),
            edges = edges.len(),
            cycles = warnings.len(),
            "lineage resolved"
        );
        Lineage::from_parts(nodes, edges, warnings)
    }

    /// Tentative parent of one story, before cycle breaking.
    fn parent_link(&self, story: &StoryRecord) -> Option<(StoryId, EdgeSource)> {
        if let Some(parent) = &story.parent_story_id {
            if *parent != story.id && self.stories.contains_key(parent) {
                return Some((parent.clone(), EdgeSource::ExplicitParent));
            }
        }

        if let Some(owner) = story
            .parent_block_hash
            .and_then(|hash| self.foreign_owner(&hash, &story.id))
        {
            return Some((owner, EdgeSource::BranchPoint));
        }

        story
            .chain
            .iter()
            .filter_map(|block| block.parent_block_hash())
            .find_map(|hash| self.foreign_owner(&hash, &story.id))
            .map(|owner| (owner, EdgeSource::BlockScan))
    }

    /// Owner of `hash`, unless that owner is `story` itself.
    fn foreign_owner(&self, hash: &BlockHash, story: &StoryId) -> Option<StoryId> {
        self.owners
            .get(hash)
            .filter(|location| location.story != *story)
            .map(|location| location.story.clone())
    }

    /// Assign levels breadth first from the roots.
    fn build_nodes(
        &self,
        parents: &BTreeMap<StoryId, (StoryId, EdgeSource)>,
    ) -> BTreeMap<StoryId, LineageNode> {
        let mut children: BTreeMap<&StoryId, Vec<StoryId>> = BTreeMap::new();
        for (child, (parent, _)) in parents {
            children.entry(parent).or_default().push(child.clone());
        }

        let mut nodes: BTreeMap<StoryId, LineageNode> = self
            .stories
            .values()
            .map(|story| {
                let node = LineageNode {
                    story_id: story.id.clone(),
                    title: story.title.clone(),
                    parent_story_id: parents.get(&story.id).map(|(p, _)| p.clone()),
                    level: 0,
                    children: children.get(&story.id).cloned().unwrap_or_default(),
                };
                (story.id.clone(), node)
            })
            .collect();

        let mut queue: VecDeque<(StoryId, usize)> = nodes
            .values()
            .filter(|node| node.is_root())
            .map(|node| (node.story_id.clone(), 0))
            .collect();

        while let Some((id, level)) = queue.pop_front() {
            let Some(node) = nodes.get_mut(&id) else {
                continue;
            };
            node.level = level;
            for child in &node.children {
                queue.push_back((child.clone(), level + 1));
            }
        }

        nodes
    }
}

/// Cut parent links until the graph is acyclic.
///
/// Walks up from every story in id order. When a walk reaches a story
/// already on its own path, the last story on the path (whose link closes
/// the loop) loses its parent and a warning is recorded.
fn break_cycles<'a>(
    ids: impl Iterator<Item = &'a StoryId>,
    parents: &mut BTreeMap<StoryId, (StoryId, EdgeSource)>,
) -> Vec<LineageCycleWarning> {
    let mut warnings = Vec::new();
    let mut settled: HashSet<StoryId> = HashSet::new();

    for id in ids {
        let mut path: Vec<StoryId> = Vec::new();
        let mut on_path: HashSet<StoryId> = HashSet::new();
        let mut current = id.clone();

        loop {
            if settled.contains(&current) {
                break;
            }
            if on_path.contains(&current) {
                let start = path.iter().position(|id| *id == current).unwrap_or(0);
                let cycle = path[start..].to_vec();
                if let Some(closing) = path.last() {
                    parents.remove(closing);
                    let warning = LineageCycleWarning {
                        story_id: closing.clone(),
                        cycle,
                    };
                    warn!(%warning, "lineage cycle broken");
                    warnings.push(warning);
                }
                break;
            }

            on_path.insert(current.clone());
            path.push(current.clone());
            match parents.get(&current) {
                Some((parent, _)) => current = parent.clone(),
                None => break,
            }
        }

        settled.extend(path);
    }

    warnings
}

#[cfg(test)]
mod tests {
    use chainscript_ledger::{LedgerConfig, StoryReader, StoryRegistry, StoryWriter};

    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn finalize(
        registry: &StoryRegistry,
        story: &StoryId,
        branch_from: Option<BlockHash>,
    ) -> BlockHash {
        let block = registry
            .submit_passage(story, &words(300), "author", branch_from)
            .unwrap();
        registry.verify_block(story, &block.hash(), "alice").unwrap();
        registry.verify_block(story, &block.hash(), "bob").unwrap();
        block.hash()
    }

    fn bare(id: u128, parent: Option<u128>) -> StoryRecord {
        StoryRecord {
            id: StoryId::from_u128(id),
            title: format!("story {id}"),
            parent_story_id: parent.map(StoryId::from_u128),
            parent_block_hash: None,
            chain: Vec::new(),
            pending: Default::default(),
        }
    }

    #[test]
    fn branch_by_block_hash_resolves_to_owner() {
        let registry = StoryRegistry::new(LedgerConfig::default()).unwrap();
        let a = registry.create_story("A", None, None).unwrap();
        let p1 = finalize(&registry, &a, None);
        let b = registry.create_story("B", None, Some(p1)).unwrap();

        let lineage = resolve_lineage(&registry.snapshot().unwrap());
        assert_eq!(lineage.roots, vec![a.clone()]);
        assert_eq!(lineage.parent_of(&b), Some(&a));
        assert_eq!(lineage.level_of(&b), Some(1));
        assert_eq!(lineage.edges[0].source, EdgeSource::BranchPoint);
        assert!(lineage.warnings.is_empty());
    }

    #[test]
    fn explicit_parent_wins_over_branch_point() {
        let registry = StoryRegistry::default();
        let a = registry.create_story("A", None, None).unwrap();
        let c = registry.create_story("C", None, None).unwrap();
        let in_c = finalize(&registry, &c, None);

        let mut b = bare(u128::MAX, None);
        b.parent_story_id = Some(a.clone());
        b.parent_block_hash = Some(in_c);
        let mut stories = registry.snapshot().unwrap().stories;
        stories.push(b.clone());
        let snapshot = RegistrySnapshot::new(stories);

        let lineage = resolve_lineage(&snapshot);
        assert_eq!(lineage.parent_of(&b.id), Some(&a));
        let edge = lineage.edges.iter().find(|e| e.child == b.id).unwrap();
        assert_eq!(edge.source, EdgeSource::ExplicitParent);
    }

    #[test]
    fn block_scan_finds_inline_branch() {
        let registry = StoryRegistry::default();
        let a = registry.create_story("A", None, None).unwrap();
        let p1 = finalize(&registry, &a, None);
        let d = registry.create_story("D", None, None).unwrap();
        finalize(&registry, &d, Some(p1));

        let lineage = resolve_lineage(&registry.snapshot().unwrap());
        assert_eq!(lineage.parent_of(&d), Some(&a));
        let edge = lineage.edges.iter().find(|e| e.child == d).unwrap();
        assert_eq!(edge.source, EdgeSource::BlockScan);
    }

    #[test]
    fn same_story_branch_point_is_ignored() {
        let registry = StoryRegistry::default();
        let a = registry.create_story("A", None, None).unwrap();
        let p1 = finalize(&registry, &a, None);
        finalize(&registry, &a, Some(p1));

        let lineage = resolve_lineage(&registry.snapshot().unwrap());
        assert_eq!(lineage.roots, vec![a]);
        assert!(lineage.edges.is_empty());
    }

    #[test]
    fn self_reference_and_missing_parent_are_roots() {
        let snapshot = RegistrySnapshot::new(vec![bare(1, Some(1)), bare(2, Some(99))]);
        let lineage = resolve_lineage(&snapshot);
        assert_eq!(lineage.roots.len(), 2);
        assert!(lineage.edges.is_empty());
        assert!(lineage.warnings.is_empty());
    }

    #[test]
    fn levels_and_traversal() {
        let snapshot = RegistrySnapshot::new(vec![
            bare(1, None),
            bare(2, Some(1)),
            bare(3, Some(2)),
            bare(4, Some(1)),
        ]);
        let lineage = resolve_lineage(&snapshot);
        let id = StoryId::from_u128;

        assert_eq!(lineage.level_of(&id(3)), Some(2));
        assert_eq!(lineage.node(&id(1)).unwrap().children, vec![id(2), id(4)]);

        let ancestors: Vec<_> = lineage
            .ancestors(&id(3))
            .iter()
            .map(|n| n.story_id.clone())
            .collect();
        assert_eq!(ancestors, vec![id(2), id(1)]);

        let descendants: Vec<_> = lineage
            .descendants(&id(1))
            .iter()
            .map(|n| n.story_id.clone())
            .collect();
        assert_eq!(descendants, vec![id(2), id(4), id(3)]);

        let walk: Vec<_> = lineage.walk().iter().map(|(_, n)| n.story_id.clone()).collect();
        assert_eq!(walk, vec![id(1), id(2), id(3), id(4)]);
    }

    #[test]
    fn cycle_is_cut_with_warning() {
        let snapshot = RegistrySnapshot::new(vec![
            bare(1, Some(3)),
            bare(2, Some(1)),
            bare(3, Some(2)),
            bare(4, Some(2)),
        ]);
        let lineage = resolve_lineage(&snapshot);
        let id = StoryId::from_u128;

        assert_eq!(lineage.warnings.len(), 1);
        let warning = &lineage.warnings[0];
        assert_eq!(warning.cycle, vec![id(1), id(3), id(2)]);
        assert_eq!(warning.story_id, id(2));

        assert_eq!(lineage.roots, vec![id(2)]);
        assert_eq!(lineage.level_of(&id(3)), Some(1));
        assert_eq!(lineage.level_of(&id(1)), Some(2));
        assert_eq!(lineage.level_of(&id(4)), Some(1));
        assert_eq!(lineage.edges.len(), 3);
    }

    #[test]
    fn every_story_gets_a_level() {
        let snapshot = RegistrySnapshot::new(vec![bare(1, Some(2)), bare(2, Some(1))]);
        let lineage = resolve_lineage(&snapshot);
        assert_eq!(lineage.len(), 2);
        assert!(lineage.has_cycles());
        for node in lineage.nodes() {
            let expected = usize::from(node.parent_story_id.is_some());
            assert_eq!(node.level, expected);
        }
    }

    #[test]
    fn lineage_serializes_for_display() {
        let snapshot = RegistrySnapshot::new(vec![bare(1, None), bare(2, Some(1))]);
        let json = serde_json::to_value(resolve_lineage(&snapshot)).unwrap();
        assert_eq!(json["edges"][0]["source"], "explicit_parent");
        assert_eq!(json["roots"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn unsorted_snapshot_resolves_like_sorted() {
        let id = StoryId::from_u128;
        let stories = vec![bare(3, None), bare(1, Some(3)), bare(2, Some(3))];
        let json = serde_json::json!({ "stories": stories });
        let loaded: RegistrySnapshot = serde_json::from_value(json).unwrap();
        let raw = RegistrySnapshot { stories };

        for snapshot in [&loaded, &raw] {
            let lineage = resolve_lineage(snapshot);
            assert_eq!(lineage.parent_of(&id(1)), Some(&id(3)));
            assert_eq!(lineage.parent_of(&id(2)), Some(&id(3)));
            assert_eq!(lineage.roots, vec![id(3)]);
            assert_eq!(lineage.node(&id(3)).unwrap().children, vec![id(1), id(2)]);
        }
    }

    #[test]
    fn cycle_cut_does_not_depend_on_field_order() {
        let sorted =
            RegistrySnapshot::new(vec![bare(1, Some(3)), bare(2, Some(1)), bare(3, Some(2))]);
        let shuffled = RegistrySnapshot {
            stories: vec![bare(3, Some(2)), bare(2, Some(1)), bare(1, Some(3))],
        };
        let a = resolve_lineage(&sorted);
        let b = resolve_lineage(&shuffled);
        assert_eq!(a.warnings, b.warnings);
        assert_eq!(a.roots, b.roots);
    }

    #[test]
    fn registry_reader_is_enough() {
        let registry = StoryRegistry::default();
        let a = registry.create_story("A", None, None).unwrap();
        let b = registry.create_story("B", Some(a.clone()), None).unwrap();
        let lineage = resolve_lineage(&registry.snapshot().unwrap());
        assert_eq!(lineage.parent_of(&b), Some(&a));
        assert_eq!(registry.story_ids().unwrap().len(), lineage.len());
    }
}
