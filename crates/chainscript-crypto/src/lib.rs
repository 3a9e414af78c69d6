//! Hashing primitives for ChainScript.
//!
//! Provides the canonical block encoding, domain-separated BLAKE3 hashing,
//! and hash chain verification for story chains.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod canonical;
pub mod chain;
pub mod hasher;

pub use canonical::BlockPreimage;
pub use chain::{ChainError, ChainLinked, ChainOrigin, HashChainVerifier};
pub use hasher::{ContentHasher, HasherError};
