//! Foundation types for ChainScript.
//!
//! Every other ChainScript crate depends on `chainscript-types`.
//!
//! # Key Types
//!
//! - [`BlockHash`]: 32-byte content hash of a block (and the genesis sentinel)
//! - [`StoryId`]: UUID v7 story identifier, ordered by creation time
//! - [`Timestamp`]: wall-clock milliseconds since the UNIX epoch

pub mod error;
pub mod hash;
pub mod story_id;
pub mod timestamp;

pub use error::TypeError;
pub use hash::BlockHash;
pub use story_id::StoryId;
pub use timestamp::Timestamp;
