// ============================================================
// Layer 3: Vocabulary
// ============================================================
// A closed, bijective token <-> index mapping for one language.
//
// Index layout:
//   0  <pad>   padding
//   1  <unk>   anything not in the vocabulary
//   2  <s>     sequence start
//   3  </s>    sequence end
//   4… corpus tokens, most frequent first, ties by first appearance
//
// Built once per language from the full training corpus and never
// mutated afterwards. The ordered token list is the only thing that
// gets persisted; the reverse index is rebuilt on load.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{NmtError, Result};

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const BOS_ID: u32 = 2;
pub const EOS_ID: u32 = 3;

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const BOS_TOKEN: &str = "<s>";
pub const EOS_TOKEN: &str = "</s>";

/// Reserved symbols in index order.
pub const RESERVED_TOKENS: [&str; 4] = [PAD_TOKEN, UNK_TOKEN, BOS_TOKEN, EOS_TOKEN];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    tokens: Vec<String>,
    index:  HashMap<String, u32>,
}

impl Vocabulary {
    /// Rebuild a vocabulary from its ordered token list.
    /// The list must start with the four reserved symbols and contain no duplicates.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Self> {
        if tokens.len() < RESERVED_TOKENS.len()
            || tokens.iter().zip(RESERVED_TOKENS).any(|(t, r)| t != r)
        {
            return Err(NmtError::incompatible(
                "vocabulary does not start with the reserved symbols <pad> <unk> <s> </s>",
            ));
        }

        let mut index = HashMap::with_capacity(tokens.len());
        for (i, tok) in tokens.iter().enumerate() {
            if index.insert(tok.clone(), i as u32).is_some() {
                return Err(NmtError::incompatible(format!(
                    "duplicate vocabulary entry '{tok}'"
                )));
            }
        }

        Ok(Self { tokens, index })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Always false: the reserved symbols are present in every vocabulary.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    /// Index of `token`, or `<unk>` when it is out of vocabulary.
    pub fn id(&self, token: &str) -> u32 {
        self.index.get(token).copied().unwrap_or(UNK_ID)
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<u32> {
        tokens.iter().map(|t| self.id(t.as_ref())).collect()
    }

    /// Map indices back to tokens. Indices outside the vocabulary decode as `<unk>`.
    pub fn decode(&self, ids: &[u32]) -> Vec<String> {
        ids.iter()
            .map(|&id| self.token(id).unwrap_or(UNK_TOKEN).to_string())
            .collect()
    }
}

impl TryFrom<Vec<String>> for Vocabulary {
    type Error = NmtError;

    fn try_from(tokens: Vec<String>) -> Result<Self> {
        Self::from_tokens(tokens)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(v: Vocabulary) -> Self {
        v.tokens
    }
}

// ─── Builder ────────────────────────────────────────────────────────────────
/// Counts token frequencies over a corpus and produces a capped vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct VocabularyBuilder {
    /// Total size including the four reserved symbols.
    pub max_size:      usize,
    /// Tokens seen fewer times than this map to `<unk>`.
    pub min_frequency: usize,
}

impl VocabularyBuilder {
    pub fn new(max_size: usize) -> Self {
        Self { max_size, min_frequency: 1 }
    }

    pub fn with_min_frequency(mut self, min_frequency: usize) -> Self {
        self.min_frequency = min_frequency;
        self
    }

    /// Build a vocabulary from tokenised sentences of one language.
    /// Deterministic: equal frequencies keep first-seen order.
    pub fn build<S: AsRef<str>>(&self, sentences: &[Vec<S>]) -> Result<Vocabulary> {
        if sentences.is_empty() {
            return Err(NmtError::data("cannot build a vocabulary from an empty corpus"));
        }
        if self.max_size < RESERVED_TOKENS.len() {
            return Err(NmtError::config(format!(
                "vocabulary size {} leaves no room for the {} reserved symbols",
                self.max_size,
                RESERVED_TOKENS.len()
            )));
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();
        for sentence in sentences {
            for tok in sentence {
                let tok = tok.as_ref();
                if RESERVED_TOKENS.contains(&tok) {
                    continue;
                }
                let count = counts.entry(tok).or_insert_with(|| {
                    first_seen.push(tok);
                    0
                });
                *count += 1;
            }
        }

        // sort_by is stable, so ties stay in first-seen order
        let mut ranked: Vec<(&str, usize)> =
            first_seen.into_iter().map(|t| (t, counts[t])).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let min_frequency = self.min_frequency.max(1);
        let room = self.max_size - RESERVED_TOKENS.len();
        let distinct = ranked.len();
        ranked.retain(|(_, n)| *n >= min_frequency);
        let rare = distinct - ranked.len();
        let over_cap = ranked.len().saturating_sub(room);

        let tokens: Vec<String> = RESERVED_TOKENS
            .iter()
            .map(|t| t.to_string())
            .chain(ranked.into_iter().take(room).map(|(t, _)| t.to_string()))
            .collect();

        tracing::debug!(
            "Built vocabulary: {} entries ({} below min frequency, {} over cap)",
            tokens.len(),
            rare,
            over_cap
        );
        Vocabulary::from_tokens(tokens)
    }
}
