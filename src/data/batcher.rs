// ============================================================
// Layer 4: Token-Budget Batcher
// ============================================================
// Groups encoded sentence pairs into padded batches bounded by a
// token budget rather than a fixed sentence count:
//
//   batch_size × longest_pair_in_batch ≤ token_budget
//
// The "length" of a pair is max(source_len, target_len + 2),
// the +2 being the <s>/</s> markers added to the target side, so
// the budget holds for both padded tensors.
//
// Pairs are taken in corpus order and a batch is closed as soon
// as adding the next pair would break the budget. The same pair
// order therefore always yields the same batch boundaries, and
// every admissible pair lands in exactly one batch per pass.
//
// Over-length pairs (either side longer than its maximum):
//   Ignore   → dropped before batching (default)
//   Truncate → each side cut to its maximum
//
// Output tensors for one batch of N pairs:
//   source        [N, S]      Int   padded with <pad>
//   source_mask   [N, S]      Float 1 = real token, 0 = padding
//   target_input  [N, T-1]    Int   <s> w1 … wn         (teacher forcing)
//   target_output [N, T-1]    Int   w1 … wn </s>        (prediction targets)
//   target_mask   [N, T-1]    Float 1 = scored position

use std::borrow::Cow;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::splitter::shuffle_seeded;
use crate::domain::sentence_pair::EncodedPair;
use crate::domain::vocabulary::{BOS_ID, EOS_ID, PAD_ID};
use crate::error::{NmtError, Result};

/// Number of markers wrapped around every target sentence.
pub const TARGET_MARKERS: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaddingPolicy {
    /// Pad every sentence in a batch to the batch's longest sentence.
    #[default]
    AllowPadding,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TooLongPolicy {
    /// Drop pairs with a side over its maximum length.
    #[default]
    Ignore,
    /// Cut each side down to its maximum length.
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub token_budget:   usize,
    pub max_source_len: usize,
    pub max_target_len: usize,
    pub padding:        PaddingPolicy,
    pub too_long:       TooLongPolicy,
}

impl BatchConfig {
    pub fn new(token_budget: usize, max_source_len: usize, max_target_len: usize) -> Self {
        Self {
            token_budget,
            max_source_len,
            max_target_len,
            padding:  PaddingPolicy::AllowPadding,
            too_long: TooLongPolicy::Ignore,
        }
    }

    pub fn with_too_long(mut self, policy: TooLongPolicy) -> Self {
        self.too_long = policy;
        self
    }

    /// Cost of the longest pair that can survive length filtering.
    pub fn longest_admissible(&self) -> usize {
        pair_cost(self.max_source_len, self.max_target_len)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_source_len == 0 || self.max_target_len == 0 {
            return Err(NmtError::config("max source/target length must be > 0"));
        }
        if self.token_budget == 0 {
            return Err(NmtError::config("token budget must be > 0"));
        }
        if self.token_budget < self.longest_admissible() {
            return Err(NmtError::config(format!(
                "token budget {} cannot hold a single pair of length {}",
                self.token_budget,
                self.longest_admissible()
            )));
        }
        Ok(())
    }
}

/// Budget length of a pair: the longer of the two padded sides.
pub fn pair_cost(source_len: usize, target_len: usize) -> usize {
    source_len.max(target_len + TARGET_MARKERS)
}

// ─── PaddedBatch ──────────────────────────────────────────────────────────────
/// A batch of index sequences padded to a common length per side.
/// Target rows carry `<s>` and `</s>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedBatch {
    pub source:     Vec<Vec<u32>>,
    pub target:     Vec<Vec<u32>>,
    pub source_len: usize,
    pub target_len: usize,
}

impl PaddedBatch {
    pub fn from_pairs(pairs: &[&EncodedPair]) -> Self {
        let source_len = pairs.iter().map(|p| p.source.len()).max().unwrap_or(0);
        let target_len = pairs.iter().map(|p| p.target.len()).max().unwrap_or(0) + TARGET_MARKERS;

        let source = pairs
            .iter()
            .map(|p| {
                let mut row = p.source.clone();
                row.resize(source_len, PAD_ID);
                row
            })
            .collect();

        let target = pairs
            .iter()
            .map(|p| {
                let mut row = Vec::with_capacity(target_len);
                row.push(BOS_ID);
                row.extend_from_slice(&p.target);
                row.push(EOS_ID);
                row.resize(target_len, PAD_ID);
                row
            })
            .collect();

        Self { source, target, source_len, target_len }
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// `len × longest pair`, the quantity bounded by the token budget.
    pub fn cost(&self) -> usize {
        self.len() * self.source_len.max(self.target_len)
    }

    /// Number of scored target positions (everything after `<s>` that is not padding).
    pub fn target_tokens(&self) -> usize {
        self.target
            .iter()
            .map(|row| row[1..].iter().filter(|&&t| t != PAD_ID).count())
            .sum()
    }

    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> PairTensors<B> {
        let n = self.len();
        let s = self.source_len;
        let t = self.target_len - 1;

        let source_flat: Vec<i32> = self
            .source
            .iter()
            .flat_map(|row| row.iter().map(|&x| x as i32))
            .collect();
        let source_mask_flat: Vec<f32> = self
            .source
            .iter()
            .flat_map(|row| row.iter().map(|&x| if x == PAD_ID { 0.0 } else { 1.0 }))
            .collect();

        let input_flat: Vec<i32> = self
            .target
            .iter()
            .flat_map(|row| row[..t].iter().map(|&x| x as i32))
            .collect();
        let output_flat: Vec<i32> = self
            .target
            .iter()
            .flat_map(|row| row[1..].iter().map(|&x| x as i32))
            .collect();
        let target_mask_flat: Vec<f32> = self
            .target
            .iter()
            .flat_map(|row| row[1..].iter().map(|&x| if x == PAD_ID { 0.0 } else { 1.0 }))
            .collect();

        PairTensors {
            source: Tensor::<B, 1, Int>::from_ints(source_flat.as_slice(), device)
                .reshape([n, s]),
            source_mask: Tensor::<B, 1>::from_floats(source_mask_flat.as_slice(), device)
                .reshape([n, s]),
            target_input: Tensor::<B, 1, Int>::from_ints(input_flat.as_slice(), device)
                .reshape([n, t]),
            target_output: Tensor::<B, 1, Int>::from_ints(output_flat.as_slice(), device)
                .reshape([n, t]),
            target_mask: Tensor::<B, 1>::from_floats(target_mask_flat.as_slice(), device)
                .reshape([n, t]),
        }
    }
}

/// Tensor view of a PaddedBatch, ready for a teacher-forced forward pass.
#[derive(Debug, Clone)]
pub struct PairTensors<B: Backend> {
    pub source:        Tensor<B, 2, Int>,
    pub source_mask:   Tensor<B, 2>,
    pub target_input:  Tensor<B, 2, Int>,
    pub target_output: Tensor<B, 2, Int>,
    pub target_mask:   Tensor<B, 2>,
}

// ─── TokenBudgetBatcher ───────────────────────────────────────────────────────
/// Length-filtered view over a corpus that hands out budget-bounded batches.
///
/// `iter()` is lazy and can be called any number of times; each call
/// walks the current pair order from the start.
pub struct TokenBudgetBatcher<'a> {
    config:  BatchConfig,
    pairs:   Vec<Cow<'a, EncodedPair>>,
    dropped: usize,
}

impl<'a> TokenBudgetBatcher<'a> {
    pub fn new(config: BatchConfig, corpus: &'a [EncodedPair]) -> Result<Self> {
        config.validate()?;

        let mut pairs   = Vec::with_capacity(corpus.len());
        let mut dropped = 0usize;
        for pair in corpus {
            if pair.source.is_empty() || pair.target.is_empty() {
                dropped += 1;
                continue;
            }
            let too_long = pair.source.len() > config.max_source_len
                || pair.target.len() > config.max_target_len;
            match (too_long, config.too_long) {
                (false, _) => pairs.push(Cow::Borrowed(pair)),
                (true, TooLongPolicy::Ignore) => dropped += 1,
                (true, TooLongPolicy::Truncate) => {
                    let mut cut = pair.clone();
                    cut.source.truncate(config.max_source_len);
                    cut.target.truncate(config.max_target_len);
                    pairs.push(Cow::Owned(cut));
                }
            }
        }

        if dropped > 0 {
            tracing::warn!(
                "Dropped {} of {} pairs (empty or over max length {}/{})",
                dropped,
                corpus.len(),
                config.max_source_len,
                config.max_target_len
            );
        }

        Ok(Self { config, pairs, dropped })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Pairs that survived length filtering.
    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Reorder the admissible pairs deterministically from `seed`.
    pub fn shuffle(&mut self, seed: u64) {
        shuffle_seeded(&mut self.pairs, seed);
    }

    pub fn iter(&self) -> Batches<'_, 'a> {
        Batches { batcher: self, pos: 0 }
    }
}

/// Lazy iterator over the batches of a TokenBudgetBatcher.
pub struct Batches<'b, 'a> {
    batcher: &'b TokenBudgetBatcher<'a>,
    pos:     usize,
}

impl Iterator for Batches<'_, '_> {
    type Item = PaddedBatch;

    fn next(&mut self) -> Option<PaddedBatch> {
        let pairs  = &self.batcher.pairs;
        let budget = self.batcher.config.token_budget;
        if self.pos >= pairs.len() {
            return None;
        }

        let start   = self.pos;
        let mut max = 0usize;
        while self.pos < pairs.len() {
            let p    = &pairs[self.pos];
            let cost = pair_cost(p.source.len(), p.target.len());
            let next_max = max.max(cost);
            let count    = self.pos - start + 1;
            // validate() guarantees a lone pair always fits
            if count > 1 && count * next_max > budget {
                break;
            }
            max = next_max;
            self.pos += 1;
        }

        let members: Vec<&EncodedPair> = pairs[start..self.pos].iter().map(|c| c.as_ref()).collect();
        Some(PaddedBatch::from_pairs(&members))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn pair(src: usize, tgt: usize) -> EncodedPair {
        EncodedPair::new((0..src as u32).map(|i| 4 + i).collect(), (0..tgt as u32).map(|i| 4 + i).collect())
    }

    fn corpus() -> Vec<EncodedPair> {
        (0..40).map(|i| pair(1 + (i * 7) % 11, 1 + (i * 5) % 9)).collect()
    }

    #[test]
    fn test_budget_invariant_holds_for_every_batch() {
        let data = corpus();
        for budget in [13, 20, 32, 64, 100] {
            let batcher = TokenBudgetBatcher::new(BatchConfig::new(budget, 11, 9), &data).unwrap();
            for batch in batcher.iter() {
                assert!(batch.cost() <= budget, "cost {} > budget {}", batch.cost(), budget);
            }
        }
    }

    #[test]
    fn test_every_pair_in_exactly_one_batch() {
        let data    = corpus();
        let batcher = TokenBudgetBatcher::new(BatchConfig::new(40, 11, 9), &data).unwrap();
        let total: usize = batcher.iter().map(|b| b.len()).sum();
        assert_eq!(total, data.len());
    }

    #[test]
    fn test_iteration_is_restartable_and_deterministic() {
        let data    = corpus();
        let batcher = TokenBudgetBatcher::new(BatchConfig::new(40, 11, 9), &data).unwrap();
        let first: Vec<PaddedBatch>  = batcher.iter().collect();
        let second: Vec<PaddedBatch> = batcher.iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ignore_policy_drops_over_length_pairs() {
        let data    = vec![pair(3, 3), pair(12, 3), pair(3, 10), pair(2, 2)];
        let batcher = TokenBudgetBatcher::new(BatchConfig::new(100, 11, 9), &data).unwrap();
        assert_eq!(batcher.num_pairs(), 2);
        assert_eq!(batcher.dropped(), 2);
    }

    #[test]
    fn test_truncate_policy_cuts_over_length_pairs() {
        let data   = vec![pair(12, 10)];
        let config = BatchConfig::new(100, 11, 9).with_too_long(TooLongPolicy::Truncate);
        let batch  = TokenBudgetBatcher::new(config, &data).unwrap().iter().next().unwrap();
        assert_eq!(batch.source_len, 11);
        assert_eq!(batch.target_len, 9 + TARGET_MARKERS);
    }

    #[test]
    fn test_all_pairs_dropped_leaves_empty_batcher() {
        let data    = vec![pair(20, 3)];
        let batcher = TokenBudgetBatcher::new(BatchConfig::new(100, 11, 9), &data).unwrap();
        assert!(batcher.is_empty());
        assert_eq!(batcher.iter().count(), 0);
    }

    #[test]
    fn test_budget_too_small_is_config_error() {
        let data = corpus();
        let err  = TokenBudgetBatcher::new(BatchConfig::new(10, 11, 9), &data).err().unwrap();
        assert!(matches!(err, NmtError::Config(_)));
        assert!(BatchConfig::new(100, 0, 9).validate().is_err());
    }

    #[test]
    fn test_padding_and_markers() {
        let a     = EncodedPair::new(vec![5, 6, 7], vec![8]);
        let b     = EncodedPair::new(vec![9], vec![10, 11]);
        let batch = PaddedBatch::from_pairs(&[&a, &b]);
        assert_eq!(batch.source, vec![vec![5, 6, 7], vec![9, PAD_ID, PAD_ID]]);
        assert_eq!(
            batch.target,
            vec![vec![BOS_ID, 8, EOS_ID, PAD_ID], vec![BOS_ID, 10, 11, EOS_ID]]
        );
        assert_eq!(batch.target_tokens(), 5);
    }

    #[test]
    fn test_tensor_shapes_and_masks() {
        let a      = EncodedPair::new(vec![5, 6, 7], vec![8]);
        let b      = EncodedPair::new(vec![9], vec![10, 11]);
        let device = Default::default();
        let t      = PaddedBatch::from_pairs(&[&a, &b]).to_tensors::<TestBackend>(&device);

        assert_eq!(t.source.dims(), [2, 3]);
        assert_eq!(t.target_input.dims(), [2, 3]);
        assert_eq!(t.target_output.dims(), [2, 3]);

        let src_mask: Vec<f32> = t.source_mask.into_data().to_vec::<f32>().unwrap();
        assert_eq!(src_mask, vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
        let tgt_mask: Vec<f32> = t.target_mask.into_data().to_vec::<f32>().unwrap();
        assert_eq!(tgt_mask, vec![1.0, 1.0, 0.0, 1.0, 1.0, 1.0]);
    }
}
