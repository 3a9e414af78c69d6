use chainscript_types::BlockHash;

use crate::canonical::BlockPreimage;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"chainscript-block-v1"`) that is
/// prepended to every hash computation, so identical bytes hashed for
/// different purposes never collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for story blocks.
    pub const BLOCK: Self = Self {
        domain: "chainscript-block-v1",
    };
    /// Hasher for serialized snapshots and other JSON documents.
    pub const DOCUMENT: Self = Self {
        domain: "chainscript-document-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> BlockHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        BlockHash::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a block's canonical field set.
    pub fn hash_block(&self, preimage: &BlockPreimage<'_>) -> BlockHash {
        self.hash(&preimage.to_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<BlockHash, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
