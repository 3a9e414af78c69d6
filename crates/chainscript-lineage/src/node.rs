//! Nodes, edges, and warnings of the lineage forest.

use std::fmt;

use serde::{Deserialize, Serialize};

use chainscript_types::StoryId;

/// One story's place in the forest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageNode {
    pub story_id: StoryId,
    pub title: String,
    /// Resolved parent. `None` for roots, including stories whose parent
    /// link was cut to break a cycle.
    pub parent_story_id: Option<StoryId>,
    /// Distance from the root of this story's tree.
    pub level: usize,
    /// Direct children, ordered by story id.
    pub children: Vec<StoryId>,
}

impl LineageNode {
    /// Returns `true` if this story has no resolved parent.
    pub fn is_root(&self) -> bool {
        self.parent_story_id.is_none()
    }

    pub fn summary(&self) -> String {
        format!("{} ({}) level={}", self.title, self.story_id.short_id(), self.level)
    }
}

/// Which rule produced a parent link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    /// The story named its parent story directly.
    ExplicitParent,
    /// The story's branch point is a block finalized in the parent.
    BranchPoint,
    /// A block in the story's chain branches from the parent.
    BlockScan,
}

impl fmt::Display for EdgeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExplicitParent => write!(f, "explicit parent"),
            Self::BranchPoint => write!(f, "branch point"),
            Self::BlockScan => write!(f, "block scan"),
        }
    }
}

/// A parent → child link that survived cycle breaking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub parent: StoryId,
    pub child: StoryId,
    pub source: EdgeSource,
}

/// Reported when parent links form a cycle. `story_id` lost its parent
/// link and became a root; `cycle` lists the stories on the loop in walk
/// order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageCycleWarning {
    pub story_id: StoryId,
    pub cycle: Vec<StoryId>,
}

impl fmt::Display for LineageCycleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.cycle.iter().map(StoryId::short_id).collect();
        write!(
            f,
            "lineage cycle {} cut at story {}",
            path.join(" -> "),
            self.story_id.short_id()
        )
    }
}
