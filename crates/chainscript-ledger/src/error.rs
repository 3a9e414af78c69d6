use std::fmt;

use chainscript_crypto::ChainError;
use chainscript_types::{BlockHash, StoryId};

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("passage has {actual} words; expected between {min} and {max}")]
    WordCount {
        actual: usize,
        min: usize,
        max: usize,
    },

    #[error("story not found: {0}")]
    StoryNotFound(StoryId),

    #[error("parent not found: {0}")]
    ParentNotFound(ParentLink),

    #[error("branch target not found: {0}")]
    BranchTargetNotFound(BlockHash),

    #[error("block not found: {0}")]
    BlockNotFound(BlockHash),

    #[error("duplicate story id: {0}")]
    DuplicateStory(StoryId),

    #[error("{verifier} has already verified block {}", .block.short_hex())]
    AlreadyVerified { block: BlockHash, verifier: String },

    #[error("block {} is already finalized", .0.short_hex())]
    AlreadyFinalized(BlockHash),

    #[error(
        "block {} is stale: chain expects previous hash {}, block carries {}; \
         resubmit the passage against the current tail",
        .block.short_hex(),
        describe_link(.expected),
        describe_link(.found)
    )]
    StaleChain {
        block: BlockHash,
        expected: Option<BlockHash>,
        found: Option<BlockHash>,
    },

    #[error("hash collision on block {0}")]
    HashCollision(BlockHash),

    #[error(transparent)]
    Corruption(#[from] CorruptionError),

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification used by callers to decide how to react.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input; never partially applied, safe to retry once corrected.
    Validation,
    /// Expected under contention; re-read current state and retry.
    Concurrency,
    /// Data corruption or a broken promotion discipline; fatal for the story.
    Integrity,
    /// Infrastructure failure inside the core (poisoned locks, encoding).
    Internal,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WordCount { .. }
            | Self::StoryNotFound(_)
            | Self::ParentNotFound(_)
            | Self::BranchTargetNotFound(_)
            | Self::BlockNotFound(_)
            | Self::DuplicateStory(_)
            | Self::InvalidConfig(_) => ErrorKind::Validation,
            Self::AlreadyVerified { .. }
            | Self::AlreadyFinalized(_)
            | Self::StaleChain { .. }
            | Self::HashCollision(_) => ErrorKind::Concurrency,
            Self::Corruption(_) => ErrorKind::Integrity,
            Self::LockPoisoned(_) | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` for contention errors the caller can retry after
    /// re-reading state.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Concurrency
    }
}

/// The parent reference that failed to resolve in `create_story`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParentLink {
    Story(StoryId),
    Block(BlockHash),
}

impl fmt::Display for ParentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Story(id) => write!(f, "story {id}"),
            Self::Block(hash) => write!(f, "block {hash}"),
        }
    }
}

/// A chain integrity failure for one story.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("chain of story {story} is corrupt at index {at_index}: {reason}")]
pub struct CorruptionError {
    pub story: StoryId,
    pub at_index: usize,
    pub reason: CorruptionReason,
}

impl CorruptionError {
    pub fn from_chain(story: StoryId, err: ChainError) -> Self {
        let reason = match err {
            ChainError::HashMismatch { .. } => CorruptionReason::HashMismatch,
            ChainError::BrokenLink { .. } => CorruptionReason::BrokenLink,
            ChainError::DanglingBranchPoint { .. } => CorruptionReason::DanglingBranchPoint,
        };
        Self {
            story,
            at_index: err.index(),
            reason,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CorruptionReason {
    /// Stored hash differs from the hash recomputed over the block's fields.
    HashMismatch,
    /// `previous_hash` (or the recorded index) does not match the chain.
    BrokenLink,
    /// A branch point names a block that exists nowhere in the registry.
    DanglingBranchPoint,
}

impl fmt::Display for CorruptionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashMismatch => write!(f, "HashMismatch"),
            Self::BrokenLink => write!(f, "BrokenLink"),
            Self::DanglingBranchPoint => write!(f, "DanglingBranchPoint"),
        }
    }
}

fn describe_link(link: &Option<BlockHash>) -> String {
    match link {
        None => "none".into(),
        Some(hash) if hash.is_genesis() => "genesis".into(),
        Some(hash) => hash.short_hex(),
    }
}
