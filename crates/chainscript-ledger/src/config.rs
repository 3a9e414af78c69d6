use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Distinct verifiers needed to finalize a pending block.
pub const DEFAULT_VERIFICATION_THRESHOLD: u32 = 2;
/// Fewest whitespace-delimited words a passage may have.
pub const MIN_PASSAGE_WORDS: usize = 250;
/// Most whitespace-delimited words a passage may have.
pub const MAX_PASSAGE_WORDS: usize = 500;

/// Configuration for a story registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Number of distinct verifiers that co-sign a block before it is
    /// appended to its story's chain.
    pub verification_threshold: u32,
    /// Bounds applied to every submitted passage.
    pub passage: PassageRules,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            verification_threshold: DEFAULT_VERIFICATION_THRESHOLD,
            passage: PassageRules::default(),
        }
    }
}

impl LedgerConfig {
    /// Reject configurations under which no block could ever finalize or
    /// no passage could ever be accepted.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.verification_threshold == 0 {
            return Err(LedgerError::InvalidConfig(
                "verification_threshold must be at least 1".into(),
            ));
        }
        self.passage.validate()
    }
}

/// Word-count bounds for passages, inclusive on both ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassageRules {
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for PassageRules {
    fn default() -> Self {
        Self {
            min_words: MIN_PASSAGE_WORDS,
            max_words: MAX_PASSAGE_WORDS,
        }
    }
}

impl PassageRules {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.min_words == 0 || self.min_words > self.max_words {
            return Err(LedgerError::InvalidConfig(format!(
                "passage bounds [{}, {}] are empty",
                self.min_words, self.max_words
            )));
        }
        Ok(())
    }

    /// Check a passage against the bounds, returning its word count.
    pub fn check(&self, passage: &str) -> Result<usize, LedgerError> {
        let actual = crate::block::word_count(passage);
        if actual < self.min_words || actual > self.max_words {
            return Err(LedgerError::WordCount {
                actual,
                min: self.min_words,
                max: self.max_words,
            });
        }
        Ok(actual)
    }
}
