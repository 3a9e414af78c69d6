//! Story ledger for ChainScript.
//!
//! This crate is the heart of ChainScript. It provides:
//! - [`Block`] with its pending → finalized verification state machine
//! - [`Story`]: a hash-linked chain of finalized blocks plus a pending pool
//! - `StoryWriter` / `StoryReader` trait boundaries
//! - [`StoryRegistry`], the owned, per-story-locked set of all stories
//! - Chain validation (hash, linkage, branch points)
//! - Persisted record layout and registry snapshots

pub mod block;
pub mod config;
pub mod error;
pub mod record;
pub mod registry;
pub mod story;
pub mod traits;
pub mod validation;

pub use block::{word_count, Block, BlockLink, BlockStatus};
pub use config::{
    LedgerConfig, PassageRules, DEFAULT_VERIFICATION_THRESHOLD, MAX_PASSAGE_WORDS,
    MIN_PASSAGE_WORDS,
};
pub use error::{CorruptionError, CorruptionReason, ErrorKind, LedgerError, ParentLink};
pub use record::{BlockLocation, RegistrySnapshot, StoryRecord, StorySummary};
pub use registry::StoryRegistry;
pub use story::{Story, VerifyOutcome};
pub use traits::{StoryReader, StoryWriter};
pub use validation::{ChainValidator, ValidationReport};

pub use chainscript_types::{BlockHash, StoryId, Timestamp};
