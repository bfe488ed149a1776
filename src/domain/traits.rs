// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// Seams between the layers:
//   CorpusSource      - where parallel sentence pairs come from
//   SentenceTranslator - anything that turns one sentence into another
//   TranslationMetric - pluggable scoring of decoded validation output
//
// The model-side capability contracts (encoder / decoder) depend on
// Burn tensors, so they live in the ml layer, not here.

use crate::error::Result;

use crate::domain::sentence_pair::SentencePair;
use crate::domain::vocabulary::{BOS_ID, EOS_ID};

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// Any component that can supply an aligned parallel corpus.
///
/// Implementations:
///   - ParallelCorpusLoader → two aligned text files
///   - DefaultCorpus        → the built-in Dutch/English sample
pub trait CorpusSource {
    fn load_pairs(&self) -> Result<Vec<SentencePair>>;
}

// ─── SentenceTranslator ───────────────────────────────────────────────────────
/// Any component that translates one whitespace-tokenised sentence.
/// The returned tokens include the `<s>` and `</s>` markers.
pub trait SentenceTranslator {
    fn translate_tokens(&self, tokens: &[String]) -> Result<Vec<String>>;
}

// ─── TranslationMetric ────────────────────────────────────────────────────────
/// Scores decoded hypotheses against references, both as target-vocabulary ids.
/// Higher is better. A BLEU implementation plugs in here.
pub trait TranslationMetric {
    fn name(&self) -> &str;

    fn score(&self, hypotheses: &[Vec<u32>], references: &[Vec<u32>]) -> f64;
}

/// Fraction of hypotheses identical to their reference once markers are removed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactMatch;

impl TranslationMetric for ExactMatch {
    fn name(&self) -> &str {
        "exact_match"
    }

    fn score(&self, hypotheses: &[Vec<u32>], references: &[Vec<u32>]) -> f64 {
        if references.is_empty() {
            return 0.0;
        }
        let strip = |s: &[u32]| -> Vec<u32> {
            s.iter().copied().filter(|&t| t != BOS_ID && t != EOS_ID).collect()
        };
        let hits = hypotheses
            .iter()
            .zip(references)
            .filter(|(h, r)| strip(h) == strip(r))
            .count();
        hits as f64 / references.len() as f64
    }
}
