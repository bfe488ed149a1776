// ============================================================
// Layer 3: Sentence Pair Domain Types
// ============================================================
// A parallel-corpus entry in two forms:
//   SentencePair - tokenised text, as produced by the external
//                  segmentation step
//   EncodedPair  - the same pair mapped through the source and
//                  target vocabularies
//
// Neither form carries <s>/</s> markers. The batcher adds them to
// the target side when building padded batches.

use serde::{Deserialize, Serialize};

use crate::domain::vocabulary::Vocabulary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePair {
    pub source: Vec<String>,
    pub target: Vec<String>,
}

impl SentencePair {
    pub fn new(source: Vec<String>, target: Vec<String>) -> Self {
        Self { source, target }
    }

    /// Build a pair from two whitespace-tokenised lines.
    ///
    /// Example:
    ///   SentencePair::from_text("Waar is het station ?", "Where is the station ?")
    pub fn from_text(source: &str, target: &str) -> Self {
        Self {
            source: source.split_whitespace().map(str::to_string).collect(),
            target: target.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.source.is_empty() || self.target.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPair {
    pub source: Vec<u32>,
    pub target: Vec<u32>,
}

impl EncodedPair {
    pub fn new(source: Vec<u32>, target: Vec<u32>) -> Self {
        Self { source, target }
    }

    pub fn encode(pair: &SentencePair, source_vocab: &Vocabulary, target_vocab: &Vocabulary) -> Self {
        Self {
            source: source_vocab.encode(&pair.source),
            target: target_vocab.encode(&pair.target),
        }
    }
}

/// Encode a whole corpus with fixed vocabularies.
pub fn encode_corpus(
    pairs:        &[SentencePair],
    source_vocab: &Vocabulary,
    target_vocab: &Vocabulary,
) -> Vec<EncodedPair> {
    pairs
        .iter()
        .map(|p| EncodedPair::encode(p, source_vocab, target_vocab))
        .collect()
}
