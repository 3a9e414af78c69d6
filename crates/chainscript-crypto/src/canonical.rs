//! Canonical byte encoding of a block's hashed fields.
//!
//! Fields are written in a fixed order, each prefixed with a one-byte tag:
//!
//! | tag    | field               | encoding                                      |
//! |--------|---------------------|-----------------------------------------------|
//! | `0x01` | `index`             | u64 little endian                             |
//! | `0x02` | `passage`           | u64 LE byte length, then UTF-8 bytes          |
//! | `0x03` | `author`            | u64 LE byte length, then UTF-8 bytes          |
//! | `0x04` | `timestamp`         | u64 LE milliseconds                           |
//! | `0x05` | `previous_hash`     | `0x00` if absent, else `0x01` and 32 bytes    |
//! | `0x06` | `parent_block_hash` | `0x00` if absent, else `0x01` and 32 bytes    |
//!
//! Length prefixes make the encoding injective: no two distinct field sets
//! share a byte string, however the text fields are split.

use chainscript_types::{BlockHash, Timestamp};

const TAG_INDEX: u8 = 0x01;
const TAG_PASSAGE: u8 = 0x02;
const TAG_AUTHOR: u8 = 0x03;
const TAG_TIMESTAMP: u8 = 0x04;
const TAG_PREVIOUS_HASH: u8 = 0x05;
const TAG_PARENT_BLOCK_HASH: u8 = 0x06;

/// Borrowed view of the fields a block hash covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockPreimage<'a> {
    pub index: u64,
    pub passage: &'a str,
    pub author: &'a str,
    pub timestamp: Timestamp,
    pub previous_hash: Option<BlockHash>,
    pub parent_block_hash: Option<BlockHash>,
}

impl BlockPreimage<'_> {
    /// Encode the fields in canonical order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(self.passage.len() + self.author.len() + 3 * 8 + 2 * 33 + 6);

        out.push(TAG_INDEX);
        out.extend_from_slice(&self.index.to_le_bytes());

        out.push(TAG_PASSAGE);
        write_str(&mut out, self.passage);

        out.push(TAG_AUTHOR);
        write_str(&mut out, self.author);

        out.push(TAG_TIMESTAMP);
        out.extend_from_slice(&self.timestamp.as_millis().to_le_bytes());

        out.push(TAG_PREVIOUS_HASH);
        write_optional_hash(&mut out, self.previous_hash.as_ref());

        out.push(TAG_PARENT_BLOCK_HASH);
        write_optional_hash(&mut out, self.parent_block_hash.as_ref());

        out
    }
}

fn write_str(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u64).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

fn write_optional_hash(out: &mut Vec<u8>, value: Option<&BlockHash>) {
    match value {
        None => out.push(0x00),
        Some(hash) => {
            out.push(0x01);
            out.extend_from_slice(hash.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn base() -> BlockPreimage<'static> {
        BlockPreimage {
            index: 3,
            passage: "once upon a time",
            author: "alice@example.com",
            timestamp: Timestamp::from_millis(42),
            previous_hash: Some(BlockHash::from_hash([9; 32])),
            parent_block_hash: None,
        }
    }

    #[test]
    fn layout_starts_with_index_tag() {
        let bytes = base().to_bytes();
        assert_eq!(bytes[0], TAG_INDEX);
        assert_eq!(&bytes[1..9], &3u64.to_le_bytes());
        assert_eq!(bytes[9], TAG_PASSAGE);
    }

    #[test]
    fn absent_and_genesis_previous_hash_differ() {
        let mut absent = base();
        absent.previous_hash = None;
        let mut genesis = base();
        genesis.previous_hash = Some(BlockHash::GENESIS);
        assert_ne!(absent.to_bytes(), genesis.to_bytes());
    }

    #[test]
    fn parent_block_hash_is_covered() {
        let mut branched = base();
        branched.parent_block_hash = Some(BlockHash::from_hash([5; 32]));
        assert_ne!(base().to_bytes(), branched.to_bytes());
    }

    #[test]
    fn shifting_text_between_fields_changes_encoding() {
        let mut a = base();
        a.passage = "ab";
        a.author = "c";
        let mut b = base();
        b.passage = "a";
        b.author = "bc";
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    proptest! {
        #[test]
        fn encoding_is_deterministic(
            index in any::<u64>(),
            passage in ".*",
            author in ".*",
            millis in any::<u64>(),
        ) {
            let preimage = BlockPreimage {
                index,
                passage: &passage,
                author: &author,
                timestamp: Timestamp::from_millis(millis),
                previous_hash: None,
                parent_block_hash: None,
            };
            prop_assert_eq!(preimage.to_bytes(), preimage.to_bytes());
        }

        #[test]
        fn distinct_indices_encode_differently(a in any::<u64>(), b in any::<u64>()) {
            prop_assume!(a != b);
            let mut left = base();
            left.index = a;
            let mut right = base();
            right.index = b;
            prop_assert_ne!(left.to_bytes(), right.to_bytes());
        }
    }
}
