// ============================================================
// Layer 5: Training Loop
// ============================================================
// train() runs `max_epochs` passes over the token-budget batches:
//
//   for each batch:
//     encode ─► teacher-forced decode ─► masked cross-entropy
//     loss.backward() ─► GradientsParams ─► optimizer.step(lr(n))
//
// The model is owned by the Trainer for the duration of the call
// and handed back when it returns. Progress leaves the loop only
// through the caller's callback: every `report_every` updates (and
// at the end of each epoch) it receives the running average loss
// since the previous event. A non-finite loss is reported as is.
//
// Validation runs after each epoch on the inner backend
// (model.valid(), no autodiff graph): token-weighted loss, plus any
// TranslationMetric over greedy decodes.
//
// Determinism: seeded initial weights + fixed corpus order + fixed
// batch plan ⇒ identical loss at every update.

use burn::{
    backend::Autodiff,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
};

use crate::data::batcher::{BatchConfig, TokenBudgetBatcher};
use crate::domain::sentence_pair::EncodedPair;
use crate::domain::traits::TranslationMetric;
use crate::error::{NmtError, Result};
use crate::ml::schedule::LearningRateSchedule;
use crate::ml::search::{translate_ids, SearchConfig};
use crate::ml::traits::TranslationModel;

/// Delivered to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub epoch:    usize,
    /// Updates applied so far, across all epochs.
    pub updates:  usize,
    /// Mean batch loss since the previous event.
    pub avg_loss: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub epoch:  usize,
    /// Position of the corpus in the `validation` argument.
    pub corpus: usize,
    /// Cross-entropy per scored target token.
    pub loss:   f64,
    /// `(metric name, score)` in the order the metrics were given.
    pub scores: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSummary {
    pub epochs:       usize,
    pub updates:      usize,
    pub first_loss:   Option<f64>,
    /// Mean batch loss of each epoch.
    pub epoch_losses: Vec<f64>,
    pub validation:   Vec<ValidationReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainerOptions {
    pub report_every: usize,
    /// Reorder the pairs before each epoch; None keeps corpus order.
    pub shuffle_seed: Option<u64>,
}

impl Default for TrainerOptions {
    fn default() -> Self {
        Self { report_every: 10, shuffle_seed: None }
    }
}

pub struct Trainer<B: Backend> {
    batch_config: BatchConfig,
    options:      TrainerOptions,
    device:       B::Device,
}

impl<B: Backend> Trainer<B> {
    pub fn new(batch_config: BatchConfig, options: TrainerOptions, device: B::Device) -> Result<Self> {
        batch_config.validate()?;
        if options.report_every == 0 {
            return Err(NmtError::config("report interval must be > 0"));
        }
        Ok(Self { batch_config, options, device })
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch_config
    }

    /// Train `model` and hand it back with a summary of the run.
    #[allow(clippy::too_many_arguments)]
    pub fn train<M, O>(
        &self,
        mut model:   M,
        max_epochs:  usize,
        corpus:      &[EncodedPair],
        validation:  &[Vec<EncodedPair>],
        schedule:    &LearningRateSchedule,
        optimizer:   &mut O,
        metrics:     &[&dyn TranslationMetric],
        on_progress: &mut dyn FnMut(&ProgressEvent),
    ) -> Result<(M, TrainingSummary)>
    where
        M: TranslationModel<Autodiff<B>> + AutodiffModule<Autodiff<B>>,
        M::InnerModule: TranslationModel<B>,
        O: Optimizer<M, Autodiff<B>>,
    {
        if max_epochs == 0 {
            return Err(NmtError::config("max epochs must be > 0"));
        }
        if corpus.is_empty() {
            return Err(NmtError::data("training corpus is empty"));
        }
        let mut batcher = TokenBudgetBatcher::new(self.batch_config, corpus)?;
        if batcher.is_empty() {
            return Err(NmtError::data(format!(
                "no usable sentence pairs: all {} exceed the length limits {}/{}",
                corpus.len(),
                self.batch_config.max_source_len,
                self.batch_config.max_target_len
            )));
        }
        tracing::info!(
            "Training on {} pairs ({} dropped) for {} epochs, {} parameters",
            batcher.num_pairs(),
            batcher.dropped(),
            max_epochs,
            model.num_params()
        );

        let mut summary      = TrainingSummary::default();
        let mut pending_sum  = 0.0f64;
        let mut pending      = 0usize;

        for epoch in 1..=max_epochs {
            if let Some(seed) = self.options.shuffle_seed {
                batcher.shuffle(seed.wrapping_add(epoch as u64));
            }

            let mut epoch_sum     = 0.0f64;
            let mut epoch_batches = 0usize;

            for batch in batcher.iter() {
                let tensors = batch.to_tensors::<Autodiff<B>>(&self.device);
                let loss    = model.forward_loss(&tensors);
                let loss_value: f64 = loss.clone().into_scalar().elem::<f64>();

                summary.updates += 1;
                let lr    = schedule.rate(summary.updates);
                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model     = optimizer.step(lr, model, grads);

                tracing::debug!(epoch, update = summary.updates, loss = loss_value, lr, "update");
                summary.first_loss.get_or_insert(loss_value);
                epoch_sum     += loss_value;
                epoch_batches += 1;
                pending_sum   += loss_value;
                pending       += 1;

                if pending == self.options.report_every {
                    on_progress(&ProgressEvent {
                        epoch,
                        updates:  summary.updates,
                        avg_loss: pending_sum / pending as f64,
                    });
                    pending_sum = 0.0;
                    pending     = 0;
                }
            }

            if pending > 0 {
                on_progress(&ProgressEvent {
                    epoch,
                    updates:  summary.updates,
                    avg_loss: pending_sum / pending as f64,
                });
                pending_sum = 0.0;
                pending     = 0;
            }

            summary.epochs = epoch;
            summary.epoch_losses.push(epoch_sum / epoch_batches.max(1) as f64);

            if !validation.is_empty() {
                let valid_model = model.valid();
                for (index, pairs) in validation.iter().enumerate() {
                    let report = self.validate(&valid_model, epoch, index, pairs, metrics)?;
                    tracing::info!(
                        "Epoch {:>3}/{} | valid[{}] loss={:.4} {:?}",
                        epoch, max_epochs, index, report.loss, report.scores
                    );
                    summary.validation.push(report);
                }
            }
        }

        tracing::info!("Training complete after {} updates", summary.updates);
        Ok((model, summary))
    }

    fn validate<V: TranslationModel<B>>(
        &self,
        model:   &V,
        epoch:   usize,
        corpus:  usize,
        pairs:   &[EncodedPair],
        metrics: &[&dyn TranslationMetric],
    ) -> Result<ValidationReport> {
        let batcher = TokenBudgetBatcher::new(self.batch_config, pairs)?;

        let mut weighted = 0.0f64;
        let mut tokens   = 0usize;
        for batch in batcher.iter() {
            let scored = batch.target_tokens();
            let loss: f64 = model
                .forward_loss(&batch.to_tensors::<B>(&self.device))
                .into_scalar()
                .elem::<f64>();
            weighted += loss * scored as f64;
            tokens   += scored;
        }
        let loss = if tokens > 0 { weighted / tokens as f64 } else { f64::NAN };

        let mut scores = Vec::with_capacity(metrics.len());
        if !metrics.is_empty() {
            let search = SearchConfig::greedy(self.batch_config.max_target_len);
            let mut hypotheses = Vec::new();
            let mut references = Vec::new();
            for pair in pairs.iter().filter(|p| !p.source.is_empty()) {
                let end    = pair.source.len().min(self.batch_config.max_source_len);
                let output = translate_ids(model, &pair.source[..end], &search, &self.device)?;
                hypotheses.push(output.tokens);
                references.push(pair.target.clone());
            }
            for metric in metrics {
                scores.push((metric.name().to_string(), metric.score(&hypotheses, &references)));
            }
        }

        Ok(ValidationReport { epoch, corpus, loss, scores })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::DefaultCorpus;
    use crate::domain::sentence_pair::encode_corpus;
    use crate::domain::traits::{CorpusSource, ExactMatch};
    use crate::domain::vocabulary::{Vocabulary, VocabularyBuilder, EOS_ID};
    use crate::ml::model::{Seq2Seq, Seq2SeqConfig};
    use burn::backend::NdArray;
    use burn::optim::AdamConfig;

    type TestBackend = NdArray;
    type TrainBackend = Autodiff<NdArray>;

    struct Fixture {
        source_vocab: Vocabulary,
        target_vocab: Vocabulary,
        pairs:        Vec<EncodedPair>,
    }

    fn fixture() -> Fixture {
        let raw = DefaultCorpus.load_pairs().unwrap();
        let sources: Vec<Vec<String>> = raw.iter().map(|p| p.source.clone()).collect();
        let targets: Vec<Vec<String>> = raw.iter().map(|p| p.target.clone()).collect();
        let source_vocab = VocabularyBuilder::new(100).build(&sources).unwrap();
        let target_vocab = VocabularyBuilder::new(100).build(&targets).unwrap();
        let pairs = encode_corpus(&raw, &source_vocab, &target_vocab);
        Fixture { source_vocab, target_vocab, pairs }
    }

    fn model_config(f: &Fixture, hidden: usize) -> Seq2SeqConfig {
        Seq2SeqConfig::new(f.source_vocab.len(), f.target_vocab.len(), hidden).with_seed(17)
    }

    fn trainer(budget: usize) -> Trainer<TestBackend> {
        let options = TrainerOptions { report_every: 1, shuffle_seed: None };
        Trainer::new(BatchConfig::new(budget, 10, 10), options, Default::default()).unwrap()
    }

    fn run(
        f:      &Fixture,
        hidden: usize,
        epochs: usize,
        budget: usize,
        lr:     f64,
    ) -> (Seq2Seq<TrainBackend>, TrainingSummary, Vec<ProgressEvent>) {
        let model: Seq2Seq<TrainBackend> = model_config(f, hidden).init(&Default::default());
        let mut optim  = AdamConfig::new().init();
        let mut events = Vec::new();
        let (model, summary) = trainer(budget)
            .train(
                model,
                epochs,
                &f.pairs,
                &[],
                &LearningRateSchedule::constant(lr).unwrap(),
                &mut optim,
                &[],
                &mut |e: &ProgressEvent| events.push(*e),
            )
            .unwrap();
        (model, summary, events)
    }

    #[test]
    fn test_identical_runs_have_identical_first_loss() {
        let f = fixture();
        let (_, a, _) = run(&f, 8, 1, 24, 0.01);
        let (_, b, _) = run(&f, 8, 1, 24, 0.01);
        assert!(a.first_loss.is_some());
        assert_eq!(a.first_loss, b.first_loss);
        assert_eq!(a.epoch_losses, b.epoch_losses);
    }

    #[test]
    fn test_progress_events_follow_updates() {
        let f = fixture();
        let (_, summary, events) = run(&f, 8, 2, 24, 0.01);
        assert_eq!(events.len(), summary.updates);
        assert_eq!(events[0].updates, 1);
        assert_eq!(events.last().unwrap().epoch, 2);
        assert_eq!(events.last().unwrap().updates, summary.updates);
        assert!(events.iter().all(|e| e.avg_loss.is_finite()));
    }

    #[test]
    fn test_loss_decreases() {
        let f = fixture();
        let (_, summary, _) = run(&f, 16, 30, 200, 0.01);
        let first = summary.epoch_losses[0];
        let last  = *summary.epoch_losses.last().unwrap();
        assert!(last < first, "loss did not fall: {first} -> {last}");
    }

    #[test]
    fn test_rejects_empty_and_unusable_corpora() {
        let f = fixture();
        let t = trainer(24);
        let schedule = LearningRateSchedule::constant(0.01).unwrap();
        let mut optim = AdamConfig::new().init();
        let mut sink  = |_: &ProgressEvent| {};

        let model: Seq2Seq<TrainBackend> = model_config(&f, 4).init(&Default::default());
        let err = t
            .train(model, 1, &[], &[], &schedule, &mut optim, &[], &mut sink)
            .unwrap_err();
        assert!(matches!(err, NmtError::Data(_)));

        let too_long = vec![EncodedPair::new(vec![4; 20], vec![4; 20])];
        let model: Seq2Seq<TrainBackend> = model_config(&f, 4).init(&Default::default());
        let err = t
            .train(model, 1, &too_long, &[], &schedule, &mut optim, &[], &mut sink)
            .unwrap_err();
        assert!(matches!(err, NmtError::Data(_)));

        let model: Seq2Seq<TrainBackend> = model_config(&f, 4).init(&Default::default());
        let err = t
            .train(model, 0, &f.pairs, &[], &schedule, &mut optim, &[], &mut sink)
            .unwrap_err();
        assert!(matches!(err, NmtError::Config(_)));
    }

    #[test]
    fn test_validation_reports_each_epoch() {
        let f = fixture();
        let model: Seq2Seq<TrainBackend> = model_config(&f, 8).init(&Default::default());
        let mut optim = AdamConfig::new().init();
        let valid = vec![f.pairs[..3].to_vec()];

        let (_, summary) = trainer(200)
            .train(
                model,
                2,
                &f.pairs,
                &valid,
                &LearningRateSchedule::constant(0.01).unwrap(),
                &mut optim,
                &[&ExactMatch],
                &mut |_: &ProgressEvent| {},
            )
            .unwrap();

        assert_eq!(summary.validation.len(), 2);
        let report = &summary.validation[1];
        assert_eq!(report.epoch, 2);
        assert!(report.loss.is_finite() && report.loss > 0.0);
        assert_eq!(report.scores[0].0, "exact_match");
        assert!((0.0..=1.0).contains(&report.scores[0].1));
    }

    #[test]
    fn test_learns_default_corpus() {
        let f = fixture();
        let (model, _, _) = run(&f, 32, 300, 200, 0.01);

        let source: Vec<u32> = f.source_vocab.encode(&["Waar", "is", "het", "station", "?"]);
        let output = translate_ids(
            &model.valid(),
            &source,
            &SearchConfig::beam(3, 10),
            &Default::default(),
        )
        .unwrap();

        let words = f.target_vocab.decode(&output.tokens);
        assert!(words.iter().any(|w| w == "station"), "got {words:?}");
        assert_eq!(output.tokens.last(), Some(&EOS_ID));
    }
}
