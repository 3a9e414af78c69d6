use std::collections::HashSet;

use tracing::warn;

use chainscript_crypto::{ChainOrigin, HashChainVerifier};
use chainscript_types::{BlockHash, StoryId};

use crate::error::{CorruptionError, LedgerError};
use crate::record::{RegistrySnapshot, StoryRecord};
use crate::traits::StoryReader;

/// Result of validating one story's finalized chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub story_id: StoryId,
    pub title: String,
    pub chain_length: usize,
    pub pending_count: usize,
    pub corruption: Option<CorruptionError>,
}

impl ValidationReport {
    /// Returns `true` if every check passed.
    pub fn is_valid(&self) -> bool {
        self.corruption.is_none()
    }

    fn for_record(record: &StoryRecord, result: Result<(), CorruptionError>) -> Self {
        Self {
            story_id: record.id.clone(),
            title: record.title.clone(),
            chain_length: record.chain.len(),
            pending_count: record.pending.len(),
            corruption: result.err(),
        }
    }
}

/// Chain integrity validator. Read-only; never repairs anything.
pub struct ChainValidator;

impl ChainValidator {
    /// Check one persisted story. `resolves` answers whether a branch point
    /// names a finalized block anywhere in the registry.
    pub fn validate_record<F>(record: &StoryRecord, resolves: F) -> Result<(), CorruptionError>
    where
        F: Fn(&BlockHash) -> bool,
    {
        let origin = if record.parent_block_hash.is_some() {
            ChainOrigin::BranchPoint
        } else {
            ChainOrigin::Genesis
        };

        HashChainVerifier::verify_chain(&record.chain, origin, resolves).map_err(|err| {
            let corruption = CorruptionError::from_chain(record.id.clone(), err);
            warn!(
                story = %record.id,
                at_index = corruption.at_index,
                reason = %corruption.reason,
                "chain validation failed"
            );
            corruption
        })
    }

    /// Validate a single story through a reader.
    pub fn validate_story<R: StoryReader>(
        reader: &R,
        story_id: &StoryId,
    ) -> Result<ValidationReport, LedgerError> {
        let record = reader.get_story(story_id)?;

        let mut resolved = HashSet::new();
        for hash in record.chain.iter().filter_map(|b| b.parent_block_hash()) {
            if reader.owner_of(&hash)?.is_some() {
                resolved.insert(hash);
            }
        }

        let result = Self::validate_record(&record, |hash| resolved.contains(hash));
        Ok(ValidationReport::for_record(&record, result))
    }

    /// Validate every story in a snapshot, in id order.
    pub fn validate_snapshot(snapshot: &RegistrySnapshot) -> Vec<ValidationReport> {
        let index = snapshot.hash_index();
        snapshot
            .stories
            .iter()
            .map(|record| {
                let result = Self::validate_record(record, |hash| index.contains_key(hash));
                ValidationReport::for_record(record, result)
            })
            .collect()
    }

    /// Validate every story visible through a reader.
    pub fn validate_all<R: StoryReader>(reader: &R) -> Result<Vec<ValidationReport>, LedgerError> {
        Ok(Self::validate_snapshot(&reader.snapshot()?))
    }
}
