//! A single narrative thread: finalized chain plus pending pool.
//!
//! # Invariants
//!
//! - `chain[i].previous_hash == chain[i - 1].hash` for `i > 0`.
//! - `chain[0].previous_hash` is the genesis sentinel for a root story and
//!   absent for a branch story, whose first block names its branch point.
//! - A block leaves `pending` exactly once, when it is appended to `chain`.
//!
//! `Story` is not synchronized; the registry serializes access to it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use chainscript_crypto::ChainOrigin;
use chainscript_types::{BlockHash, StoryId};

use crate::block::{Block, BlockLink};
use crate::config::{LedgerConfig, PassageRules};
use crate::error::{CorruptionError, CorruptionReason, LedgerError};
use crate::record::StoryRecord;

/// Result of a successful verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub block_hash: BlockHash,
    /// `true` only for the verification that moved the block into the chain.
    pub finalized: bool,
    pub verification_count: u32,
    /// Chain index, once finalized.
    pub index: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Story {
    id: StoryId,
    title: String,
    parent_story_id: Option<StoryId>,
    parent_block_hash: Option<BlockHash>,
    chain: Vec<Block>,
    pending: BTreeMap<BlockHash, Block>,
}

impl Story {
    pub fn new(
        id: StoryId,
        title: impl Into<String>,
        parent_story_id: Option<StoryId>,
        parent_block_hash: Option<BlockHash>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            parent_story_id,
            parent_block_hash,
            chain: Vec::new(),
            pending: BTreeMap::new(),
        }
    }

    /// Rebuild a story from its persisted record.
    ///
    /// Pending entries must be keyed by their own hash. Chains are not
    /// validated here; that is `validate_chain`'s job.
    pub fn from_record(record: StoryRecord) -> Result<Self, LedgerError> {
        for (key, block) in &record.pending {
            if *key != block.hash() || block.is_finalized() {
                return Err(CorruptionError {
                    story: record.id.clone(),
                    at_index: block.index() as usize,
                    reason: CorruptionReason::HashMismatch,
                }
                .into());
            }
        }

        Ok(Self {
            id: record.id,
            title: record.title,
            parent_story_id: record.parent_story_id,
            parent_block_hash: record.parent_block_hash,
            chain: record.chain,
            pending: record.pending,
        })
    }

    pub fn to_record(&self) -> StoryRecord {
        StoryRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            parent_story_id: self.parent_story_id.clone(),
            parent_block_hash: self.parent_block_hash,
            chain: self.chain.clone(),
            pending: self.pending.clone(),
        }
    }

    pub fn id(&self) -> &StoryId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn parent_story_id(&self) -> Option<&StoryId> {
        self.parent_story_id.as_ref()
    }

    pub fn parent_block_hash(&self) -> Option<BlockHash> {
        self.parent_block_hash
    }

    /// A story is a branch, chain-wise, when it carries a branch point.
    pub fn is_branch(&self) -> bool {
        self.parent_block_hash.is_some()
    }

    pub fn origin(&self) -> ChainOrigin {
        if self.is_branch() {
            ChainOrigin::BranchPoint
        } else {
            ChainOrigin::Genesis
        }
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Pending blocks ordered by creation time, then hash.
    pub fn pending(&self) -> Vec<&Block> {
        let mut blocks: Vec<&Block> = self.pending.values().collect();
        blocks.sort_by(|a, b| {
            a.timestamp()
                .cmp(&b.timestamp())
                .then_with(|| a.hash().cmp(&b.hash()))
        });
        blocks
    }

    pub fn tail_hash(&self) -> Option<BlockHash> {
        self.chain.last().map(Block::hash)
    }

    /// The `previous_hash` the next finalized block must carry.
    pub fn expected_previous_hash(&self) -> Option<BlockHash> {
        match self.chain.last() {
            Some(tail) => Some(tail.hash()),
            None if self.is_branch() => None,
            None => Some(BlockHash::GENESIS),
        }
    }

    /// Finalized or pending block with the given hash.
    pub fn find_block(&self, hash: &BlockHash) -> Option<&Block> {
        self.pending
            .get(hash)
            .or_else(|| self.chain.iter().find(|b| b.hash() == *hash))
    }

    pub fn contains_finalized(&self, hash: &BlockHash) -> bool {
        self.chain.iter().any(|b| b.hash() == *hash)
    }

    /// Passages of the finalized chain joined by blank lines.
    pub fn text(&self) -> String {
        self.chain
            .iter()
            .map(Block::passage)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Link for a block created now against the current tail.
    ///
    /// The first block of a branch story inherits the story's branch point
    /// unless the caller names a different one.
    pub fn next_link(&self, branch_from: Option<BlockHash>) -> BlockLink {
        let inherited = if self.chain.is_empty() {
            self.parent_block_hash
        } else {
            None
        };
        BlockLink {
            index: self.chain.len() as u64,
            previous_hash: self.expected_previous_hash(),
            parent_block_hash: branch_from.or(inherited),
        }
    }

    /// Create a pending block from a passage. The caller has already
    /// checked that `branch_from` names a finalized block.
    pub fn submit(
        &mut self,
        rules: &PassageRules,
        passage: impl Into<String>,
        author: impl Into<String>,
        branch_from: Option<BlockHash>,
    ) -> Result<Block, LedgerError> {
        let block = Block::create(rules, self.next_link(branch_from), passage, author)?;
        self.insert_pending(block)
    }

    pub(crate) fn insert_pending(&mut self, block: Block) -> Result<Block, LedgerError> {
        let hash = block.hash();
        if self.pending.contains_key(&hash) || self.contains_finalized(&hash) {
            return Err(LedgerError::HashCollision(hash));
        }
        self.pending.insert(hash, block.clone());
        Ok(block)
    }

    /// Register a verification and promote the block if this call crossed
    /// the threshold.
    ///
    /// The whole sequence is all-or-nothing: if promotion fails the
    /// verification is revoked and the block stays pending unchanged.
    ///
    /// A stale block can never be promoted, since its index and previous
    /// hash are covered by its hash. It stays in the pending pool as a
    /// record of the lost race; the author has to resubmit the passage.
    pub fn verify(
        &mut self,
        block_hash: &BlockHash,
        verifier: &str,
        config: &LedgerConfig,
    ) -> Result<VerifyOutcome, LedgerError> {
        let Some(block) = self.pending.get_mut(block_hash) else {
            if self.contains_finalized(block_hash) {
                return Err(LedgerError::AlreadyFinalized(*block_hash));
            }
            return Err(LedgerError::BlockNotFound(*block_hash));
        };

        let crossed = block.register_verification(verifier, config.verification_threshold)?;
        let verification_count = block.verification_count();
        if !crossed {
            return Ok(VerifyOutcome {
                block_hash: *block_hash,
                finalized: false,
                verification_count,
                index: None,
            });
        }

        match self.promote(block_hash) {
            Ok(index) => Ok(VerifyOutcome {
                block_hash: *block_hash,
                finalized: true,
                verification_count,
                index: Some(index),
            }),
            Err(err) => {
                if let Some(block) = self.pending.get_mut(block_hash) {
                    block.revoke_verification(verifier);
                }
                Err(err)
            }
        }
    }

    /// Move a pending block to the end of the chain.
    fn promote(&mut self, block_hash: &BlockHash) -> Result<u64, LedgerError> {
        let block = self
            .pending
            .get(block_hash)
            .ok_or(LedgerError::BlockNotFound(*block_hash))?;

        if block.recompute_hash() != block.hash() {
            return Err(CorruptionError {
                story: self.id.clone(),
                at_index: block.index() as usize,
                reason: CorruptionReason::HashMismatch,
            }
            .into());
        }

        let expected = self.expected_previous_hash();
        let next_index = self.chain.len() as u64;
        if block.previous_hash() != expected || block.index() != next_index {
            return Err(LedgerError::StaleChain {
                block: *block_hash,
                expected,
                found: block.previous_hash(),
            });
        }

        let Some(mut block) = self.pending.remove(block_hash) else {
            return Err(LedgerError::BlockNotFound(*block_hash));
        };
        block.finalize();
        self.chain.push(block);
        Ok(next_index)
    }
}
