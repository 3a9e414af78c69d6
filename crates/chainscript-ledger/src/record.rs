//! Persisted story layout and read-only registry snapshots.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use chainscript_crypto::ContentHasher;
use chainscript_types::{BlockHash, StoryId};

use crate::block::Block;
use crate::error::LedgerError;

/// One persisted story: its identity, branch links, finalized chain, and
/// pending pool keyed by block hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub id: StoryId,
    pub title: String,
    #[serde(default)]
    pub parent_story_id: Option<StoryId>,
    #[serde(default)]
    pub parent_block_hash: Option<BlockHash>,
    #[serde(default)]
    pub chain: Vec<Block>,
    #[serde(default)]
    pub pending: BTreeMap<BlockHash, Block>,
}

impl StoryRecord {
    pub fn summary(&self) -> StorySummary {
        StorySummary {
            id: self.id.clone(),
            title: self.title.clone(),
            parent_story_id: self.parent_story_id.clone(),
            chain_length: self.chain.len(),
            pending_count: self.pending.len(),
            tail_hash: self.chain.last().map(Block::hash),
        }
    }
}

/// Listing entry for a story.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySummary {
    pub id: StoryId,
    pub title: String,
    pub parent_story_id: Option<StoryId>,
    pub chain_length: usize,
    pub pending_count: usize,
    pub tail_hash: Option<BlockHash>,
}

/// Owner and chain position of a finalized block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockLocation {
    pub story: StoryId,
    pub index: usize,
}

/// A consistent, read-only copy of every story in a registry, ordered by
/// story id.
///
/// Deserializing sorts the stories, so a store written by hand or by
/// another tool still comes back in id order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SnapshotRepr")]
pub struct RegistrySnapshot {
    pub stories: Vec<StoryRecord>,
}

#[derive(Deserialize)]
struct SnapshotRepr {
    #[serde(default)]
    stories: Vec<StoryRecord>,
}

impl From<SnapshotRepr> for RegistrySnapshot {
    fn from(repr: SnapshotRepr) -> Self {
        Self::new(repr.stories)
    }
}

impl RegistrySnapshot {
    pub fn new(mut stories: Vec<StoryRecord>) -> Self {
        stories.sort_by(|a, b| a.id.cmp(&b.id));
        Self { stories }
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn get(&self, id: &StoryId) -> Option<&StoryRecord> {
        self.stories.iter().find(|s| s.id == *id)
    }

    /// Stories in id order, whatever order the `stories` field holds.
    pub fn ordered(&self) -> Vec<&StoryRecord> {
        let mut stories: Vec<&StoryRecord> = self.stories.iter().collect();
        stories.sort_by(|a, b| a.id.cmp(&b.id));
        stories
    }

    pub fn contains(&self, id: &StoryId) -> bool {
        self.get(id).is_some()
    }

    /// Map every finalized block hash to its owning story and position.
    ///
    /// Pending blocks are not indexed: only finalized blocks can serve as
    /// branch points. If two stories claim the same hash the first story
    /// in id order wins.
    pub fn hash_index(&self) -> HashMap<BlockHash, BlockLocation> {
        let mut index = HashMap::new();
        for story in self.ordered() {
            for (position, block) in story.chain.iter().enumerate() {
                index.entry(block.hash()).or_insert_with(|| BlockLocation {
                    story: story.id.clone(),
                    index: position,
                });
            }
        }
        index
    }

    pub fn summaries(&self) -> Vec<StorySummary> {
        self.stories.iter().map(StoryRecord::summary).collect()
    }

    /// Digest of the whole snapshot, covering pending pools and verifier
    /// lists as well as finalized chains.
    pub fn digest(&self) -> Result<BlockHash, LedgerError> {
        ContentHasher::DOCUMENT
            .hash_json(self)
            .map_err(|e| LedgerError::Serialization(e.to_string()))
    }
}
