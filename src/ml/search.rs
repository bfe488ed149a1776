// ============================================================
// Layer 5: Decoder Search (greedy and beam)
// ============================================================
// Encode the source once, then repeatedly call the decoder starting
// from <s>, feeding back the token the search picked:
//
//   greedy : keep the single best next token
//   beam   : keep the `beam_width` best hypotheses by cumulative
//            log-probability, live and finished ones competing
//            in the same ranking
//
// Each hypothesis owns its full token list (no backpointers).
// Candidates get a serial number in generation order; equal
// scores are resolved in favour of the lower serial, so the
// earliest generated hypothesis wins.
//
// Stopping: every kept hypothesis has emitted </s>. Once a
// hypothesis holds max_target_len tokens the only token left to
// emit is </s>, so the search takes at most max_target_len + 1
// steps and the body never exceeds max_target_len. Returned tokens
// start with <s> and end with </s>. <pad> and <s> are never emitted.

use burn::{prelude::*, tensor::activation::log_softmax};
use serde::{Deserialize, Serialize};

use crate::domain::vocabulary::{BOS_ID, EOS_ID, PAD_ID};
use crate::error::{NmtError, Result};
use crate::ml::lstm::LstmState;
use crate::ml::traits::{DecoderState, EncoderMemory, TranslationModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// 1 = greedy.
    pub beam_width:     usize,
    /// Longest output, not counting <s> and </s>.
    pub max_target_len: usize,
    /// Return per-token log-probabilities with the translation.
    pub with_scores:    bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { beam_width: 1, max_target_len: 50, with_scores: false }
    }
}

impl SearchConfig {
    pub fn greedy(max_target_len: usize) -> Self {
        Self { beam_width: 1, max_target_len, with_scores: false }
    }

    pub fn beam(beam_width: usize, max_target_len: usize) -> Self {
        Self { beam_width, max_target_len, with_scores: false }
    }

    pub fn scored(mut self) -> Self {
        self.with_scores = true;
        self
    }

    /// Upper bound on decoder steps for one sentence.
    pub fn max_steps(&self) -> usize {
        self.max_target_len + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.beam_width == 0 {
            return Err(NmtError::config("beam width must be >= 1"));
        }
        if self.max_target_len == 0 {
            return Err(NmtError::config("max target length must be > 0"));
        }
        Ok(())
    }
}

/// A (partial) output sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    /// `<s>` followed by every emitted token.
    pub tokens:       Vec<u32>,
    /// Sum of `token_scores`.
    pub score:        f64,
    /// Log-probability of each emitted token.
    pub token_scores: Vec<f32>,
    pub finished:     bool,
}

impl Hypothesis {
    fn start() -> Self {
        Self {
            tokens:       vec![BOS_ID],
            score:        0.0,
            token_scores: Vec::new(),
            finished:     false,
        }
    }

    fn extend(&self, token: u32, log_prob: f32) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(token);
        let mut token_scores = self.token_scores.clone();
        token_scores.push(log_prob);
        Self {
            tokens,
            score: self.score + log_prob as f64,
            token_scores,
            finished: token == EOS_ID,
        }
    }

    fn last(&self) -> u32 {
        self.tokens.last().copied().unwrap_or(BOS_ID)
    }

    /// Tokens without the `<s>`/`</s>` markers.
    pub fn body(&self) -> &[u32] {
        let end = if self.finished { self.tokens.len() - 1 } else { self.tokens.len() };
        &self.tokens[1..end]
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    hyp:    Hypothesis,
    serial: usize,
    /// Row of the decoder state this candidate continues from; None once finished.
    row:    Option<usize>,
}

/// Translate one encoded source sentence.
pub fn translate_ids<B: Backend, M: TranslationModel<B>>(
    model:  &M,
    source: &[u32],
    config: &SearchConfig,
    device: &B::Device,
) -> Result<Hypothesis> {
    config.validate()?;
    if source.is_empty() {
        return Err(NmtError::data("cannot translate an empty sentence"));
    }

    let memory = encode_source(model, source, device);
    if config.beam_width == 1 {
        greedy_search(model, &memory, config)
    } else {
        beam_search(model, &memory, config)
    }
}

/// Encode a single unpadded sentence as a batch of one.
pub fn encode_source<B: Backend, M: TranslationModel<B>>(
    model:  &M,
    source: &[u32],
    device: &B::Device,
) -> EncoderMemory<B> {
    let ids: Vec<i32> = source.iter().map(|&t| t as i32).collect();
    let tokens = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), device).reshape([1, source.len()]);
    let mask   = Tensor::<B, 2>::ones([1, source.len()], device);
    model.encode(tokens, mask)
}

pub fn greedy_search<B: Backend, M: TranslationModel<B>>(
    model:  &M,
    memory: &EncoderMemory<B>,
    config: &SearchConfig,
) -> Result<Hypothesis> {
    let mut hyp   = Hypothesis::start();
    let mut state = model.start_state(memory);

    for step in 0..config.max_steps() {
        let at_bound = step == config.max_target_len;
        let (rows, next) = advance(model, &[hyp.last()], state, memory, at_bound)?;
        state = next;

        let best = rows.first().and_then(|row| ranked_tokens(row, 1).first().copied());
        let Some((token, log_prob)) = best else {
            break;
        };
        hyp = hyp.extend(token, log_prob);
        if hyp.finished {
            break;
        }
    }
    Ok(hyp)
}

pub fn beam_search<B: Backend, M: TranslationModel<B>>(
    model:  &M,
    memory: &EncoderMemory<B>,
    config: &SearchConfig,
) -> Result<Hypothesis> {
    let width  = config.beam_width;
    let device = memory.mask.device();

    let mut serial = 0usize;
    let mut kept   = vec![Candidate { hyp: Hypothesis::start(), serial, row: None }];
    let mut state  = model.start_state(memory);

    for step in 0..config.max_steps() {
        let live: Vec<&Candidate> = kept.iter().filter(|c| !c.hyp.finished).collect();
        if live.is_empty() {
            break;
        }

        let previous: Vec<u32> = live.iter().map(|c| c.hyp.last()).collect();
        let tiled = tile_memory(memory, live.len());
        let at_bound = step == config.max_target_len;
        let (rows, next_state) = advance(model, &previous, state, &tiled, at_bound)?;

        let mut pool: Vec<Candidate> = kept
            .iter()
            .filter(|c| c.hyp.finished)
            .map(|c| Candidate { row: None, ..c.clone() })
            .collect();
        for (row, (parent, log_probs)) in live.iter().zip(&rows).enumerate() {
            for (token, log_prob) in ranked_tokens(log_probs, width) {
                serial += 1;
                pool.push(Candidate {
                    hyp: parent.hyp.extend(token, log_prob),
                    serial,
                    row: Some(row),
                });
            }
        }
        if pool.is_empty() {
            break;
        }

        rank_candidates(&mut pool);
        pool.truncate(width);

        let rows: Vec<i32> = pool
            .iter()
            .filter(|c| !c.hyp.finished)
            .filter_map(|c| c.row)
            .map(|r| r as i32)
            .collect();
        tracing::debug!(step, live = rows.len(), "beam step");

        state = if rows.is_empty() {
            next_state
        } else {
            select_rows(next_state, &rows, &device)
        };
        kept = pool;
    }

    kept.into_iter()
        .next()
        .map(|c| c.hyp)
        .ok_or_else(|| NmtError::data("beam search produced no hypothesis"))
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// One decoder step for every row; returns host-side log-probabilities
/// with <pad> and <s> ruled out. With `eos_only` every token but </s>
/// is ruled out.
fn advance<B: Backend, M: TranslationModel<B>>(
    model:    &M,
    previous: &[u32],
    state:    DecoderState<B>,
    memory:   &EncoderMemory<B>,
    eos_only: bool,
) -> Result<(Vec<Vec<f32>>, DecoderState<B>)> {
    let device = memory.mask.device();
    let ids: Vec<i32> = previous.iter().map(|&t| t as i32).collect();
    let previous = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &device);

    let step  = model.decode_step(previous, state, memory);
    let vocab = model.target_vocab_size();
    let flat  = read_floats(log_softmax(step.logits, 1))?;

    let rows = flat
        .chunks(vocab)
        .map(|row| {
            let mut row = row.to_vec();
            if eos_only {
                for (id, lp) in row.iter_mut().enumerate() {
                    if id != EOS_ID as usize {
                        *lp = f32::NEG_INFINITY;
                    }
                }
            }
            row[PAD_ID as usize] = f32::NEG_INFINITY;
            row[BOS_ID as usize] = f32::NEG_INFINITY;
            row
        })
        .collect();
    Ok((rows, step.state))
}

/// The `k` best tokens of one row, best first; equal scores keep index order.
fn ranked_tokens(log_probs: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut ranked: Vec<(u32, f32)> = log_probs
        .iter()
        .enumerate()
        .filter(|(_, lp)| lp.is_finite())
        .map(|(i, &lp)| (i as u32, lp))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k);
    ranked
}

/// Best score first; equal scores go to the earlier serial.
fn rank_candidates(pool: &mut [Candidate]) {
    pool.sort_by(|a, b| {
        b.hyp
            .score
            .total_cmp(&a.hyp.score)
            .then(a.serial.cmp(&b.serial))
    });
}

fn tile_memory<B: Backend>(memory: &EncoderMemory<B>, k: usize) -> EncoderMemory<B> {
    if k == 1 {
        return memory.clone();
    }
    EncoderMemory {
        states: Tensor::cat(vec![memory.states.clone(); k], 0),
        keys:   Tensor::cat(vec![memory.keys.clone(); k], 0),
        mask:   Tensor::cat(vec![memory.mask.clone(); k], 0),
    }
}

fn select_rows<B: Backend>(state: DecoderState<B>, rows: &[i32], device: &B::Device) -> DecoderState<B> {
    let index = Tensor::<B, 1, Int>::from_ints(rows, device);
    DecoderState {
        layers: state
            .layers
            .into_iter()
            .map(|layer| LstmState {
                hidden: layer.hidden.select(0, index.clone()),
                cell:   layer.cell.select(0, index.clone()),
            })
            .collect(),
        feed: state.feed.select(0, index),
    }
}

/// Copy a tensor back to the host as f32 values.
pub fn read_floats<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| NmtError::Tensor(format!("{e:?}")))
}
