//! Story blocks and their verification state machine.
//!
//! A [`Block`] is created `Pending` with its hash already fixed over the
//! frozen field set. Verification events may only touch
//! `verification_count` and `verifier_ids`, and only while pending. The
//! single transition to `Finalized` is performed by the owning story.

use serde::{Deserialize, Serialize};

use chainscript_crypto::{BlockPreimage, ChainLinked, ContentHasher};
use chainscript_types::{BlockHash, Timestamp};

use crate::config::PassageRules;
use crate::error::LedgerError;

/// Number of whitespace-delimited tokens in a passage.
pub fn word_count(passage: &str) -> usize {
    passage.split_whitespace().count()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    Pending,
    Finalized,
}

/// Where a new block attaches: its candidate chain position and links.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockLink {
    /// Chain length at creation time; the only index the block can take.
    pub index: u64,
    pub previous_hash: Option<BlockHash>,
    pub parent_block_hash: Option<BlockHash>,
}

/// One author's passage plus its integrity metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    passage: String,
    author: String,
    timestamp: Timestamp,
    previous_hash: Option<BlockHash>,
    parent_block_hash: Option<BlockHash>,
    hash: BlockHash,
    verification_count: u32,
    verifier_ids: Vec<String>,
    status: BlockStatus,
}

impl Block {
    /// Create a pending block stamped with the current time.
    pub fn create(
        rules: &PassageRules,
        link: BlockLink,
        passage: impl Into<String>,
        author: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        Self::create_at(rules, link, passage, author, Timestamp::now())
    }

    /// Create a pending block with an explicit timestamp.
    pub fn create_at(
        rules: &PassageRules,
        link: BlockLink,
        passage: impl Into<String>,
        author: impl Into<String>,
        timestamp: Timestamp,
    ) -> Result<Self, LedgerError> {
        let passage = passage.into();
        rules.check(&passage)?;

        let mut block = Self {
            index: link.index,
            passage,
            author: author.into(),
            timestamp,
            previous_hash: link.previous_hash,
            parent_block_hash: link.parent_block_hash,
            hash: BlockHash::GENESIS,
            verification_count: 0,
            verifier_ids: Vec::new(),
            status: BlockStatus::Pending,
        };
        block.hash = block.recompute_hash();
        Ok(block)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn passage(&self) -> &str {
        &self.passage
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn previous_hash(&self) -> Option<BlockHash> {
        self.previous_hash
    }

    pub fn parent_block_hash(&self) -> Option<BlockHash> {
        self.parent_block_hash
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn verification_count(&self) -> u32 {
        self.verification_count
    }

    pub fn verifier_ids(&self) -> &[String] {
        &self.verifier_ids
    }

    pub fn status(&self) -> BlockStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == BlockStatus::Pending
    }

    pub fn is_finalized(&self) -> bool {
        self.status == BlockStatus::Finalized
    }

    pub fn word_count(&self) -> usize {
        word_count(&self.passage)
    }

    pub fn has_verified(&self, verifier: &str) -> bool {
        self.verifier_ids.iter().any(|v| v == verifier)
    }

    /// The canonical field set covered by the hash.
    pub fn preimage(&self) -> BlockPreimage<'_> {
        BlockPreimage {
            index: self.index,
            passage: &self.passage,
            author: &self.author,
            timestamp: self.timestamp,
            previous_hash: self.previous_hash,
            parent_block_hash: self.parent_block_hash,
        }
    }

    /// Hash recomputed from the current fields.
    pub fn recompute_hash(&self) -> BlockHash {
        ContentHasher::BLOCK.hash_block(&self.preimage())
    }

    /// Record a co-signature from `verifier`.
    ///
    /// Returns `true` once the count is at or above `threshold`. The
    /// owning story removes the block from its pending pool on promotion,
    /// so a pending block never signals twice for the same chain slot.
    pub fn register_verification(
        &mut self,
        verifier: &str,
        threshold: u32,
    ) -> Result<bool, LedgerError> {
        if self.is_finalized() {
            return Err(LedgerError::AlreadyFinalized(self.hash));
        }
        if self.has_verified(verifier) {
            return Err(LedgerError::AlreadyVerified {
                block: self.hash,
                verifier: verifier.to_string(),
            });
        }

        self.verifier_ids.push(verifier.to_string());
        self.verification_count += 1;
        Ok(self.verification_count >= threshold)
    }

    /// Undo the most recent verification by `verifier` after a failed
    /// promotion.
    pub(crate) fn revoke_verification(&mut self, verifier: &str) {
        if let Some(pos) = self.verifier_ids.iter().rposition(|v| v == verifier) {
            self.verifier_ids.remove(pos);
            self.verification_count = self.verification_count.saturating_sub(1);
        }
    }

    pub(crate) fn finalize(&mut self) {
        self.status = BlockStatus::Finalized;
    }

    #[cfg(test)]
    pub(crate) fn tamper_passage(&mut self, passage: &str) {
        self.passage = passage.to_string();
    }

    #[cfg(test)]
    pub(crate) fn tamper_previous_hash(&mut self, previous_hash: Option<BlockHash>) {
        self.previous_hash = previous_hash;
        self.hash = self.recompute_hash();
    }
}

impl ChainLinked for Block {
    fn chain_index(&self) -> u64 {
        self.index
    }

    fn block_hash(&self) -> BlockHash {
        self.hash
    }

    fn previous_hash(&self) -> Option<BlockHash> {
        self.previous_hash
    }

    fn parent_block_hash(&self) -> Option<BlockHash> {
        self.parent_block_hash
    }

    fn computed_hash(&self) -> BlockHash {
        self.recompute_hash()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn genesis_link() -> BlockLink {
        BlockLink {
            index: 0,
            previous_hash: Some(BlockHash::GENESIS),
            parent_block_hash: None,
        }
    }

    fn pending(n: usize) -> Block {
        Block::create(&PassageRules::default(), genesis_link(), words(n), "alice").unwrap()
    }

    #[test]
    fn create_computes_hash_and_starts_pending() {
        let block = pending(300);
        assert!(block.is_pending());
        assert_eq!(block.verification_count(), 0);
        assert!(block.verifier_ids().is_empty());
        assert_eq!(block.hash(), block.recompute_hash());
        assert_eq!(block.previous_hash(), Some(BlockHash::GENESIS));
    }

    #[test]
    fn word_count_boundaries() {
        let rules = PassageRules::default();
        for accepted in [250, 500] {
            assert!(Block::create(&rules, genesis_link(), words(accepted), "a").is_ok());
        }
        for rejected in [249, 501] {
            let err = Block::create(&rules, genesis_link(), words(rejected), "a").unwrap_err();
            assert_eq!(
                err,
                LedgerError::WordCount {
                    actual: rejected,
                    min: 250,
                    max: 500
                }
            );
        }
    }

    #[test]
    fn word_count_splits_on_any_whitespace() {
        assert_eq!(word_count("  one\ttwo\n\nthree  "), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn same_fields_same_hash() {
        let rules = PassageRules::default();
        let ts = Timestamp::from_millis(1_000);
        let a = Block::create_at(&rules, genesis_link(), words(260), "bob", ts).unwrap();
        let b = Block::create_at(&rules, genesis_link(), words(260), "bob", ts).unwrap();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn threshold_crossed_on_reaching_count() {
        let mut block = pending(300);
        assert!(!block.register_verification("alice", 2).unwrap());
        assert!(block.register_verification("bob", 2).unwrap());
        assert_eq!(block.verification_count(), 2);
    }

    #[test]
    fn count_above_lowered_threshold_still_crosses() {
        let mut block = pending(300);
        for verifier in ["alice", "bob"] {
            assert!(!block.register_verification(verifier, 3).unwrap());
        }
        assert!(block.register_verification("carol", 2).unwrap());
        assert_eq!(block.verification_count(), 3);
    }

    #[test]
    fn duplicate_verifier_is_rejected() {
        let mut block = pending(300);
        block.register_verification("alice", 2).unwrap();
        let err = block.register_verification("alice", 2).unwrap_err();
        assert_eq!(
            err,
            LedgerError::AlreadyVerified {
                block: block.hash(),
                verifier: "alice".into()
            }
        );
        assert_eq!(block.verification_count(), 1);
    }

    #[test]
    fn finalized_block_rejects_verification() {
        let mut block = pending(300);
        block.finalize();
        let err = block.register_verification("alice", 2).unwrap_err();
        assert_eq!(err, LedgerError::AlreadyFinalized(block.hash()));
    }

    #[test]
    fn revoke_undoes_registration() {
        let mut block = pending(300);
        block.register_verification("alice", 2).unwrap();
        block.revoke_verification("alice");
        assert_eq!(block.verification_count(), 0);
        assert!(!block.has_verified("alice"));
    }

    #[test]
    fn verification_does_not_change_hash() {
        let mut block = pending(300);
        let before = block.hash();
        block.register_verification("alice", 2).unwrap();
        assert_eq!(block.recompute_hash(), before);
    }

    #[test]
    fn serializes_hash_fields_as_hex() {
        let block = pending(250);
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["previous_hash"], "0".repeat(64));
        assert!(json["parent_block_hash"].is_null());
        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }

    proptest! {
        #[test]
        fn passages_within_bounds_are_accepted(n in 250usize..=500) {
            let block = Block::create(&PassageRules::default(), genesis_link(), words(n), "p");
            prop_assert!(block.is_ok());
        }

        #[test]
        fn passages_outside_bounds_are_rejected(n in prop_oneof![0usize..250, 501usize..700]) {
            let result = Block::create(&PassageRules::default(), genesis_link(), words(n), "p");
            let is_word_count_error = matches!(result, Err(LedgerError::WordCount { .. }));
            prop_assert!(is_word_count_error);
        }
    }
}
