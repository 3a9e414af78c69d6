use chainscript_types::{BlockHash, StoryId};

use crate::block::Block;
use crate::error::LedgerError;
use crate::record::{RegistrySnapshot, StoryRecord};
use crate::story::VerifyOutcome;

/// Write boundary for story creation, submission, and verification.
pub trait StoryWriter: Send + Sync {
    /// Register a new story under a fresh id. `parent_story_id` and
    /// `parent_block_hash` must resolve when given.
    fn create_story(
        &self,
        title: &str,
        parent_story_id: Option<StoryId>,
        parent_block_hash: Option<BlockHash>,
    ) -> Result<StoryId, LedgerError>;

    /// Create a pending block carrying `passage`, linked to the story's
    /// current tail.
    fn submit_passage(
        &self,
        story_id: &StoryId,
        passage: &str,
        author: &str,
        branch_from: Option<BlockHash>,
    ) -> Result<Block, LedgerError>;

    /// Record one verifier's co-signature on a pending block.
    fn verify_block(
        &self,
        story_id: &StoryId,
        block_hash: &BlockHash,
        verifier: &str,
    ) -> Result<VerifyOutcome, LedgerError>;
}

/// Read boundary for story queries.
pub trait StoryReader: Send + Sync {
    fn get_story(&self, story_id: &StoryId) -> Result<StoryRecord, LedgerError>;

    fn get_chain(&self, story_id: &StoryId) -> Result<Vec<Block>, LedgerError>;

    /// Pending blocks ordered by creation time, then hash.
    fn get_pending(&self, story_id: &StoryId) -> Result<Vec<Block>, LedgerError>;

    /// Finalized or pending block `hash` within the story.
    fn find_block(
        &self,
        story_id: &StoryId,
        hash: &BlockHash,
    ) -> Result<Option<Block>, LedgerError>;

    /// Finalized passages joined by blank lines.
    fn story_text(&self, story_id: &StoryId) -> Result<String, LedgerError>;

    fn story_ids(&self) -> Result<Vec<StoryId>, LedgerError>;

    /// Story owning the finalized block `hash`, if any.
    fn owner_of(&self, hash: &BlockHash) -> Result<Option<StoryId>, LedgerError>;

    fn snapshot(&self) -> Result<RegistrySnapshot, LedgerError>;
}
