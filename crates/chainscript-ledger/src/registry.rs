//! The owned set of all stories.
//!
//! Stories live behind their own `Mutex` inside a map guarded by a
//! `RwLock`; a second index maps every finalized block hash to its owner.
//! Locks are always taken in the order map, story, index.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use chainscript_types::{BlockHash, StoryId};

use crate::block::Block;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, ParentLink};
use crate::record::{RegistrySnapshot, StoryRecord, StorySummary};
use crate::story::{Story, VerifyOutcome};
use crate::traits::{StoryReader, StoryWriter};
use crate::validation::{ChainValidator, ValidationReport};

type StoryHandle = Arc<Mutex<Story>>;

/// In-process registry of stories, safe to share across threads.
#[derive(Debug)]
pub struct StoryRegistry {
    config: LedgerConfig,
    stories: RwLock<HashMap<StoryId, StoryHandle>>,
    block_owners: RwLock<HashMap<BlockHash, StoryId>>,
}

impl StoryRegistry {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            config,
            stories: RwLock::new(HashMap::new()),
            block_owners: RwLock::new(HashMap::new()),
        })
    }

    /// Rebuild a registry from persisted records.
    ///
    /// Chains are loaded as stored; run [`StoryRegistry::validate_all`] to
    /// check them.
    pub fn from_records(
        config: LedgerConfig,
        records: impl IntoIterator<Item = StoryRecord>,
    ) -> Result<Self, LedgerError> {
        config.validate()?;

        let mut stories = HashMap::new();
        let mut owners = HashMap::new();
        for record in records {
            let story = Story::from_record(record)?;
            if stories.contains_key(story.id()) {
                return Err(LedgerError::DuplicateStory(story.id().clone()));
            }
            for block in story.chain() {
                if owners.insert(block.hash(), story.id().clone()).is_some() {
                    return Err(LedgerError::HashCollision(block.hash()));
                }
            }
            stories.insert(story.id().clone(), Arc::new(Mutex::new(story)));
        }

        debug!(
            stories = stories.len(),
            finalized_blocks = owners.len(),
            "registry loaded"
        );

        Ok(Self {
            config,
            stories: RwLock::new(stories),
            block_owners: RwLock::new(owners),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn len(&self) -> Result<usize, LedgerError> {
        Ok(self.read_stories()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.read_stories()?.is_empty())
    }

    /// Register a story under a caller-chosen id.
    pub fn create_story_with_id(
        &self,
        id: StoryId,
        title: &str,
        parent_story_id: Option<StoryId>,
        parent_block_hash: Option<BlockHash>,
    ) -> Result<StoryId, LedgerError> {
        let branch_point = self.resolve_parents(parent_story_id.as_ref(), parent_block_hash)?;
        let story = Story::new(id.clone(), title, parent_story_id, branch_point);

        let mut stories = self.write_stories()?;
        if stories.contains_key(&id) {
            return Err(LedgerError::DuplicateStory(id));
        }
        stories.insert(id.clone(), Arc::new(Mutex::new(story)));

        debug!(
            story = %id,
            title,
            branch_point = ?branch_point,
            "story created"
        );
        Ok(id)
    }

    /// Listing of every story, ordered by id.
    pub fn summaries(&self) -> Result<Vec<StorySummary>, LedgerError> {
        Ok(self.snapshot()?.summaries())
    }

    /// Validate one story's finalized chain against the registry.
    pub fn validate_chain(&self, story_id: &StoryId) -> Result<(), LedgerError> {
        let report = ChainValidator::validate_story(self, story_id)?;
        match report.corruption {
            Some(corruption) => Err(corruption.into()),
            None => Ok(()),
        }
    }

    /// One report per story, in id order.
    pub fn validate_all(&self) -> Result<Vec<ValidationReport>, LedgerError> {
        ChainValidator::validate_all(self)
    }

    /// Check the parent references of a new story and work out its branch
    /// point.
    fn resolve_parents(
        &self,
        parent_story_id: Option<&StoryId>,
        parent_block_hash: Option<BlockHash>,
    ) -> Result<Option<BlockHash>, LedgerError> {
        let parent = match parent_story_id {
            Some(id) => Some(self.story_handle(id).map_err(|err| match err {
                LedgerError::StoryNotFound(id) => LedgerError::ParentNotFound(ParentLink::Story(id)),
                other => other,
            })?),
            None => None,
        };

        if let Some(hash) = parent_block_hash {
            let owner = self.read_owners()?.get(&hash).cloned();
            return match (owner, parent_story_id) {
                (None, _) => Err(LedgerError::ParentNotFound(ParentLink::Block(hash))),
                (Some(owner), Some(expected)) if owner != *expected => {
                    Err(LedgerError::ParentNotFound(ParentLink::Block(hash)))
                }
                (Some(_), _) => Ok(Some(hash)),
            };
        }

        match parent {
            Some(handle) => Ok(lock_story(&handle)?.tail_hash()),
            None => Ok(None),
        }
    }

    fn story_handle(&self, story_id: &StoryId) -> Result<StoryHandle, LedgerError> {
        self.read_stories()?
            .get(story_id)
            .cloned()
            .ok_or_else(|| LedgerError::StoryNotFound(story_id.clone()))
    }

    fn with_story<T>(
        &self,
        story_id: &StoryId,
        f: impl FnOnce(&Story) -> T,
    ) -> Result<T, LedgerError> {
        let handle = self.story_handle(story_id)?;
        let story = lock_story(&handle)?;
        Ok(f(&story))
    }

    fn read_stories(&self) -> Result<RwLockReadGuard<'_, HashMap<StoryId, StoryHandle>>, LedgerError> {
        self.stories
            .read()
            .map_err(|_| LedgerError::LockPoisoned("story map"))
    }

    fn write_stories(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<StoryId, StoryHandle>>, LedgerError> {
        self.stories
            .write()
            .map_err(|_| LedgerError::LockPoisoned("story map"))
    }

    fn read_owners(&self) -> Result<RwLockReadGuard<'_, HashMap<BlockHash, StoryId>>, LedgerError> {
        self.block_owners
            .read()
            .map_err(|_| LedgerError::LockPoisoned("block index"))
    }

    fn write_owners(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<BlockHash, StoryId>>, LedgerError> {
        self.block_owners
            .write()
            .map_err(|_| LedgerError::LockPoisoned("block index"))
    }
}

impl Default for StoryRegistry {
    fn default() -> Self {
        Self {
            config: LedgerConfig::default(),
            stories: RwLock::new(HashMap::new()),
            block_owners: RwLock::new(HashMap::new()),
        }
    }
}

fn lock_story(handle: &StoryHandle) -> Result<MutexGuard<'_, Story>, LedgerError> {
    handle.lock().map_err(|_| LedgerError::LockPoisoned("story"))
}

impl StoryWriter for StoryRegistry {
    fn create_story(
        &self,
        title: &str,
        parent_story_id: Option<StoryId>,
        parent_block_hash: Option<BlockHash>,
    ) -> Result<StoryId, LedgerError> {
        self.create_story_with_id(StoryId::new(), title, parent_story_id, parent_block_hash)
    }

    fn submit_passage(
        &self,
        story_id: &StoryId,
        passage: &str,
        author: &str,
        branch_from: Option<BlockHash>,
    ) -> Result<Block, LedgerError> {
        let handle = self.story_handle(story_id)?;

        if let Some(target) = branch_from {
            if !self.read_owners()?.contains_key(&target) {
                return Err(LedgerError::BranchTargetNotFound(target));
            }
        }

        let mut story = lock_story(&handle)?;
        let block = story.submit(&self.config.passage, passage, author, branch_from)?;

        debug!(
            story = %story_id,
            block = %block.hash().short_hex(),
            index = block.index(),
            author,
            words = block.word_count(),
            "passage submitted"
        );
        Ok(block)
    }

    fn verify_block(
        &self,
        story_id: &StoryId,
        block_hash: &BlockHash,
        verifier: &str,
    ) -> Result<VerifyOutcome, LedgerError> {
        let handle = self.story_handle(story_id)?;
        let mut story = lock_story(&handle)?;

        let outcome = match story.verify(block_hash, verifier, &self.config) {
            Ok(outcome) => outcome,
            Err(err) => {
                if err.is_retryable() {
                    debug!(
                        story = %story_id,
                        block = %block_hash.short_hex(),
                        verifier,
                        error = %err,
                        "verification rejected"
                    );
                } else if let LedgerError::Corruption(_) = err {
                    warn!(
                        story = %story_id,
                        block = %block_hash.short_hex(),
                        error = %err,
                        "pending block failed integrity check"
                    );
                }
                return Err(err);
            }
        };

        if outcome.finalized {
            self.write_owners()?.insert(*block_hash, story_id.clone());
            info!(
                story = %story_id,
                block = %block_hash.short_hex(),
                index = ?outcome.index,
                "block finalized"
            );
        } else {
            debug!(
                story = %story_id,
                block = %block_hash.short_hex(),
                verifier,
                count = outcome.verification_count,
                "verification recorded"
            );
        }
        Ok(outcome)
    }
}

impl StoryReader for StoryRegistry {
    fn get_story(&self, story_id: &StoryId) -> Result<StoryRecord, LedgerError> {
        self.with_story(story_id, Story::to_record)
    }

    fn get_chain(&self, story_id: &StoryId) -> Result<Vec<Block>, LedgerError> {
        self.with_story(story_id, |story| story.chain().to_vec())
    }

    fn get_pending(&self, story_id: &StoryId) -> Result<Vec<Block>, LedgerError> {
        self.with_story(story_id, |story| {
            story.pending().into_iter().cloned().collect()
        })
    }

    fn find_block(
        &self,
        story_id: &StoryId,
        hash: &BlockHash,
    ) -> Result<Option<Block>, LedgerError> {
        self.with_story(story_id, |story| story.find_block(hash).cloned())
    }

    fn story_text(&self, story_id: &StoryId) -> Result<String, LedgerError> {
        self.with_story(story_id, Story::text)
    }

    fn story_ids(&self) -> Result<Vec<StoryId>, LedgerError> {
        let mut ids: Vec<StoryId> = self.read_stories()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn owner_of(&self, hash: &BlockHash) -> Result<Option<StoryId>, LedgerError> {
        Ok(self.read_owners()?.get(hash).cloned())
    }

    fn snapshot(&self) -> Result<RegistrySnapshot, LedgerError> {
        let stories = self.read_stories()?;
        let mut handles: Vec<(&StoryId, &StoryHandle)> = stories.iter().collect();
        handles.sort_by(|a, b| a.0.cmp(b.0));

        let mut guards = Vec::with_capacity(handles.len());
        for (_, handle) in handles {
            guards.push(lock_story(handle)?);
        }
        let records = guards.iter().map(|story| story.to_record()).collect();
        Ok(RegistrySnapshot::new(records))
    }
}
