// ============================================================
// Layer 5: Inferencer
// ============================================================
// Wraps a loaded model and its vocabularies behind a token-level
// translate() call:
//
//   tokens ─► source vocab ids ─► search ─► target ids ─► tokens
//
// The returned tokens keep the <s>/</s> markers. Sources longer
// than the trained maximum are cut to it (with a warning); an
// empty source is a Data error.
//
// The model is only read, so a Translator can serve any number of
// translate() calls.

use burn::prelude::*;

use crate::data::preprocessor::Preprocessor;
use crate::domain::vocabulary::Vocabulary;
use crate::error::{NmtError, Result};
use crate::ml::model::Seq2Seq;
use crate::ml::search::{translate_ids, SearchConfig};

/// One translated sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Output tokens including the `<s>` and `</s>` markers.
    pub tokens:       Vec<String>,
    pub ids:          Vec<u32>,
    /// Cumulative log-probability.
    pub score:        f64,
    /// Per-token log-probabilities, present when the search asked for them.
    pub token_scores: Option<Vec<f32>>,
}

impl Translation {
    /// Output without the markers, joined by spaces.
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .filter(|t| !matches!(t.as_str(), "<s>" | "</s>"))
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct Translator<B: Backend> {
    model:          Seq2Seq<B>,
    source_vocab:   Vocabulary,
    target_vocab:   Vocabulary,
    max_source_len: usize,
    preprocessor:   Preprocessor,
    device:         B::Device,
}

impl<B: Backend> Translator<B> {
    pub fn new(
        model:          Seq2Seq<B>,
        source_vocab:   Vocabulary,
        target_vocab:   Vocabulary,
        max_source_len: usize,
        device:         B::Device,
    ) -> Self {
        Self {
            model,
            source_vocab,
            target_vocab,
            max_source_len,
            preprocessor: Preprocessor::new(),
            device,
        }
    }

    pub fn source_vocab(&self) -> &Vocabulary {
        &self.source_vocab
    }

    pub fn target_vocab(&self) -> &Vocabulary {
        &self.target_vocab
    }

    pub fn translate<S: AsRef<str>>(&self, tokens: &[S], search: &SearchConfig) -> Result<Translation> {
        if tokens.is_empty() {
            return Err(NmtError::data("cannot translate an empty sentence"));
        }
        let mut ids = self.source_vocab.encode(tokens);
        if ids.len() > self.max_source_len {
            tracing::warn!(
                "Source has {} tokens, truncating to {}",
                ids.len(),
                self.max_source_len
            );
            ids.truncate(self.max_source_len);
        }

        let hyp = translate_ids(&self.model, &ids, search, &self.device)?;
        tracing::debug!(score = hyp.score, steps = hyp.token_scores.len(), "translated");

        Ok(Translation {
            tokens:       self.target_vocab.decode(&hyp.tokens),
            score:        hyp.score,
            token_scores: search.with_scores.then_some(hyp.token_scores),
            ids:          hyp.tokens,
        })
    }

    /// Clean and whitespace-tokenise `text`, then translate it.
    pub fn translate_text(&self, text: &str, search: &SearchConfig) -> Result<Translation> {
        let tokens = self.preprocessor.tokenize(text);
        self.translate(&tokens, search)
    }
}
