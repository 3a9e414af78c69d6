use chainscript_types::BlockHash;

/// Trait for blocks that participate in a story's hash chain.
pub trait ChainLinked {
    /// Position recorded in the block itself.
    fn chain_index(&self) -> u64;
    /// The block's stored hash.
    fn block_hash(&self) -> BlockHash;
    /// Hash of the preceding block (genesis sentinel or absent for the first).
    fn previous_hash(&self) -> Option<BlockHash>;
    /// Branch point this block descends from, if any.
    fn parent_block_hash(&self) -> Option<BlockHash>;
    /// Hash recomputed from the block's current fields.
    fn computed_hash(&self) -> BlockHash;
}

/// How the first block of a chain is anchored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainOrigin {
    /// Root story: the first block points at the genesis sentinel.
    Genesis,
    /// Branch story: the first block has no previous hash and names a
    /// branch point through `parent_block_hash` instead.
    BranchPoint,
}

/// Hash chain integrity verifier.
///
/// Verifies that a sequence of blocks forms a valid hash chain: each
/// block's hash is correctly computed from its fields, each block's
/// `previous_hash` matches its predecessor, and every branch point
/// resolves.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a chain of blocks.
    ///
    /// `resolves` answers whether a branch point hash names an existing
    /// finalized block; it is consulted for the first block of a branch
    /// chain and for any block that carries a `parent_block_hash`.
    ///
    /// Checks, per block in order (first failure wins):
    /// 1. Stored hash equals the recomputed hash
    /// 2. Recorded index equals the position in the chain
    /// 3. `previous_hash` links to the predecessor (or to the origin)
    /// 4. Branch points resolve
    pub fn verify_chain<B, F>(
        blocks: &[B],
        origin: ChainOrigin,
        resolves: F,
    ) -> Result<(), ChainError>
    where
        B: ChainLinked,
        F: Fn(&BlockHash) -> bool,
    {
        for (index, block) in blocks.iter().enumerate() {
            if block.computed_hash() != block.block_hash() {
                return Err(ChainError::HashMismatch { index });
            }

            if block.chain_index() != index as u64 {
                return Err(ChainError::BrokenLink { index });
            }

            if index == 0 {
                match (origin, block.previous_hash()) {
                    (ChainOrigin::Genesis, Some(prev)) if prev.is_genesis() => {}
                    (ChainOrigin::BranchPoint, None) => {
                        if block.parent_block_hash().is_none() {
                            return Err(ChainError::DanglingBranchPoint { index });
                        }
                    }
                    _ => return Err(ChainError::BrokenLink { index }),
                }
            } else {
                let expected_prev = blocks[index - 1].block_hash();
                if block.previous_hash() != Some(expected_prev) {
                    return Err(ChainError::BrokenLink { index });
                }
            }

            if let Some(branch_point) = block.parent_block_hash() {
                if !resolves(&branch_point) {
                    return Err(ChainError::DanglingBranchPoint { index });
                }
            }
        }

        Ok(())
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum ChainError {
    #[error("hash mismatch at index {index}: computed hash differs from stored")]
    HashMismatch { index: usize },

    #[error("broken link at index {index}: previous hash does not match")]
    BrokenLink { index: usize },

    #[error("dangling branch point at index {index}: parent block does not resolve")]
    DanglingBranchPoint { index: usize },
}

impl ChainError {
    /// Chain position where verification failed.
    pub fn index(&self) -> usize {
        match self {
            Self::HashMismatch { index }
            | Self::BrokenLink { index }
            | Self::DanglingBranchPoint { index } => *index,
        }
    }
}
