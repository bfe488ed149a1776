// ============================================================
// Layer 2: TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration     (fail before any work)
//   Step 2: Load sentence pairs            (Layer 4 - data)
//   Step 3: Split train/validation         (Layer 4 - data)
//   Step 4: Build both vocabularies        (Layer 3 - domain)
//   Step 5: Encode the corpora             (Layer 3 - domain)
//   Step 6: Build model + Adam optimiser   (Layer 5 - ml)
//   Step 7: Run the training loop          (Layer 5 - ml)
//   Step 8: Save the model artifact        (Layer 6 - infra)
//   Step 9: Log a few sample translations  (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use std::path::Path;

use anyhow::{bail, Context, Result};
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::AdamConfig,
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::{BatchConfig, PaddingPolicy, TooLongPolicy},
    loader::{DefaultCorpus, ParallelCorpusLoader},
    splitter::split_train_val,
};
use crate::domain::{
    sentence_pair::{encode_corpus, SentencePair},
    traits::{CorpusSource, ExactMatch, TranslationMetric},
    vocabulary::{VocabularyBuilder, RESERVED_TOKENS},
};
use crate::error::NmtError;
use crate::infra::{
    metrics::MetricsLogger,
    model_store::{ArtifactManifest, ModelStore},
};
use crate::ml::{
    inferencer::Translator,
    model::{Seq2Seq, Seq2SeqConfig},
    schedule::LearningRateSchedule,
    search::SearchConfig,
    trainer::{ProgressEvent, Trainer, TrainerOptions, TrainingSummary},
};

/// Sample translations logged after training.
const SAMPLE_TRANSLATIONS: usize = 3;

// ─── Training Configuration ──────────────────────────────────────────────────
// All options for a training run. Serialisable so a run can be
// described by a JSON file instead of command line flags; any field
// missing from the file takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Source-language file; None together with `target_file` uses the built-in corpus.
    pub source_file:        Option<String>,
    pub target_file:        Option<String>,
    pub model_dir:          String,

    pub encoder_layers:     usize,
    pub decoder_layers:     usize,
    /// Hidden size of every LSTM, also the embedding size.
    pub hidden_size:        usize,
    pub epochs:             usize,

    pub token_budget:       usize,
    pub max_source_len:     usize,
    pub max_target_len:     usize,
    pub padding:            PaddingPolicy,
    pub too_long:           TooLongPolicy,

    pub learning_rate:      f64,
    pub warmup_steps:       usize,
    pub decay_factor:       f64,
    pub decay_interval:     usize,
    /// Global gradient-norm limit; None disables clipping.
    pub grad_clip:          Option<f32>,

    pub beam_width:         usize,

    pub seed:               u64,
    pub init_scale:         f64,
    pub report_every:       usize,
    /// Share of the corpus held out for validation, in [0, 1).
    pub valid_fraction:     f64,
    pub shuffle_each_epoch: bool,

    /// Vocabulary caps, reserved symbols included.
    pub src_vocab_size:     usize,
    pub tgt_vocab_size:     usize,
    pub min_frequency:      usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            source_file:        None,
            target_file:        None,
            model_dir:          "model".to_string(),
            encoder_layers:     1,
            decoder_layers:     1,
            hidden_size:        64,
            epochs:             100,
            token_budget:       256,
            max_source_len:     50,
            max_target_len:     50,
            padding:            PaddingPolicy::AllowPadding,
            too_long:           TooLongPolicy::Ignore,
            learning_rate:      0.005,
            warmup_steps:       0,
            decay_factor:       1.0,
            decay_interval:     1000,
            grad_clip:          Some(5.0),
            beam_width:         3,
            seed:               42,
            init_scale:         0.1,
            report_every:       10,
            valid_fraction:     0.0,
            shuffle_each_epoch: false,
            src_vocab_size:     30_000,
            tgt_vocab_size:     30_000,
            min_frequency:      1,
        }
    }
}

impl TrainConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid config '{}'", path.display()))
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            token_budget:   self.token_budget,
            max_source_len: self.max_source_len,
            max_target_len: self.max_target_len,
            padding:        self.padding,
            too_long:       self.too_long,
        }
    }

    pub fn schedule(&self) -> crate::error::Result<LearningRateSchedule> {
        LearningRateSchedule::new(
            self.learning_rate,
            self.warmup_steps,
            self.decay_factor,
            self.decay_interval,
        )
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig::beam(self.beam_width, self.max_target_len)
    }

    /// Architecture for vocabularies of the given sizes.
    pub fn model_config(&self, source_vocab_size: usize, target_vocab_size: usize) -> Seq2SeqConfig {
        Seq2SeqConfig::new(source_vocab_size, target_vocab_size, self.hidden_size)
            .with_encoder_layers(self.encoder_layers)
            .with_decoder_layers(self.decoder_layers)
            .with_init_scale(self.init_scale)
            .with_seed(self.seed)
    }

    /// Reject invalid or contradictory options before any data is read.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.epochs == 0 {
            return Err(NmtError::config("epochs must be > 0"));
        }
        if self.report_every == 0 {
            return Err(NmtError::config("report_every must be > 0"));
        }
        if !(0.0..1.0).contains(&self.valid_fraction) {
            return Err(NmtError::config("valid_fraction must be in [0, 1)"));
        }
        if let Some(clip) = self.grad_clip {
            if !(clip.is_finite() && clip > 0.0) {
                return Err(NmtError::config("grad_clip must be a positive number"));
            }
        }
        let reserved = RESERVED_TOKENS.len();
        if self.src_vocab_size <= reserved || self.tgt_vocab_size <= reserved {
            return Err(NmtError::config(format!(
                "vocabulary sizes must exceed the {reserved} reserved symbols"
            )));
        }
        if self.source_file.is_some() != self.target_file.is_some() {
            return Err(NmtError::config(
                "source_file and target_file must be given together",
            ));
        }

        self.batch_config().validate()?;
        self.schedule()?;
        self.search_config().validate()?;
        // vocabulary sizes are not known yet; the caps stand in for them
        self.model_config(self.src_vocab_size, self.tgt_vocab_size).validate()?;
        Ok(())
    }
}

/// What a finished training run produced.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub summary: TrainingSummary,
    /// `(source, translation)` for the first few training sentences.
    pub samples: Vec<(String, String)>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Train on the default WGPU device.
    pub fn execute(&self) -> Result<TrainOutcome> {
        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        self.execute_on::<Wgpu>(device)
    }

    /// Execute the full training pipeline end to end on backend `B`.
    pub fn execute_on<B: Backend>(&self, device: B::Device) -> Result<TrainOutcome> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Load sentence pairs ───────────────────────────────────────
        let pairs = self.load_pairs()?;
        if pairs.is_empty() {
            return Err(NmtError::data("the corpus has no usable sentence pairs").into());
        }

        // ── Step 3: Train / validation split ──────────────────────────────────
        let (train_pairs, valid_pairs) = if cfg.valid_fraction > 0.0 {
            split_train_val(pairs, 1.0 - cfg.valid_fraction, cfg.seed)
        } else {
            (pairs, Vec::new())
        };
        if train_pairs.is_empty() {
            bail!("valid_fraction {} leaves no training pairs", cfg.valid_fraction);
        }
        tracing::info!(
            "Split: {} train, {} validation",
            train_pairs.len(),
            valid_pairs.len()
        );

        // ── Step 4: Vocabularies, built from the training side only ───────────
        let sources: Vec<Vec<String>> = train_pairs.iter().map(|p| p.source.clone()).collect();
        let targets: Vec<Vec<String>> = train_pairs.iter().map(|p| p.target.clone()).collect();
        let source_vocab = VocabularyBuilder::new(cfg.src_vocab_size)
            .with_min_frequency(cfg.min_frequency)
            .build(&sources)?;
        let target_vocab = VocabularyBuilder::new(cfg.tgt_vocab_size)
            .with_min_frequency(cfg.min_frequency)
            .build(&targets)?;
        tracing::info!(
            "Vocabularies: {} source, {} target entries",
            source_vocab.len(),
            target_vocab.len()
        );

        // ── Step 5: Encode ────────────────────────────────────────────────────
        let train_set = encode_corpus(&train_pairs, &source_vocab, &target_vocab);
        let valid_set = encode_corpus(&valid_pairs, &source_vocab, &target_vocab);
        let validation = if valid_set.is_empty() { Vec::new() } else { vec![valid_set] };

        // ── Step 6: Model + Adam optimiser ────────────────────────────────────
        // m = β1*m + (1-β1)*g        (mean)
        // v = β2*v + (1-β2)*g²       (variance)
        // θ = θ - lr * m / (√v + ε)  (update)
        let model_cfg = cfg.model_config(source_vocab.len(), target_vocab.len());
        let model: Seq2Seq<Autodiff<B>> = model_cfg.init(&device);
        let mut optim = AdamConfig::new()
            .with_epsilon(1e-8)
            .with_grad_clipping(cfg.grad_clip.map(GradientClippingConfig::Norm))
            .init();

        // ── Step 7: Training loop (Layer 5) ───────────────────────────────────
        let metrics_log = MetricsLogger::new(&cfg.model_dir)?;
        let mut on_progress = |event: &ProgressEvent| {
            tracing::info!(
                "Epoch {:>3} | update {:>6} | avg_loss={:.4}",
                event.epoch, event.updates, event.avg_loss
            );
            if let Err(e) = metrics_log.log(event) {
                tracing::warn!("Cannot append to '{}': {e}", metrics_log.csv_path().display());
            }
        };

        let options = TrainerOptions {
            report_every: cfg.report_every,
            shuffle_seed: cfg.shuffle_each_epoch.then_some(cfg.seed),
        };
        let trainer = Trainer::<B>::new(cfg.batch_config(), options, device.clone())?;
        let exact_match = ExactMatch;
        let metrics: [&dyn TranslationMetric; 1] = [&exact_match];
        let (model, summary) = trainer.train(
            model,
            cfg.epochs,
            &train_set,
            &validation,
            &cfg.schedule()?,
            &mut optim,
            &metrics,
            &mut on_progress,
        )?;

        // ── Step 8: Save the artifact ─────────────────────────────────────────
        let model    = model.valid();
        let manifest = ArtifactManifest::new(
            model_cfg,
            source_vocab.clone(),
            target_vocab.clone(),
            cfg.max_source_len,
            cfg.max_target_len,
        );
        ModelStore::new(&cfg.model_dir)
            .save(&model, &manifest)
            .with_context(|| format!("Cannot save model to '{}'", cfg.model_dir))?;

        // ── Step 9: Sample translations ───────────────────────────────────────
        let translator = Translator::new(model, source_vocab, target_vocab, cfg.max_source_len, device);
        let search     = cfg.search_config();
        let mut samples = Vec::new();
        for pair in train_pairs.iter().take(SAMPLE_TRANSLATIONS) {
            let output = translator.translate(&pair.source, &search)?;
            let source = pair.source.join(" ");
            tracing::info!("  {}  =>  {}", source, output.tokens.join(" "));
            samples.push((source, output.text()));
        }

        Ok(TrainOutcome { summary, samples })
    }

    fn load_pairs(&self) -> Result<Vec<SentencePair>> {
        let pairs = match (&self.config.source_file, &self.config.target_file) {
            (Some(src), Some(tgt)) => ParallelCorpusLoader::new(src, tgt).load_pairs(),
            _ => {
                tracing::info!("No corpus files given, using the built-in Dutch/English sample");
                DefaultCorpus.load_pairs()
            }
        };
        Ok(pairs?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use tempdir::TempDir;

    fn small_config(dir: &Path) -> TrainConfig {
        TrainConfig {
            model_dir:    dir.to_string_lossy().into_owned(),
            hidden_size:  8,
            epochs:       2,
            token_budget: 64,
            max_source_len: 10,
            max_target_len: 10,
            beam_width:   2,
            report_every: 1,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_invalid_options() {
        let bad = [
            TrainConfig { epochs: 0, ..TrainConfig::default() },
            TrainConfig { max_source_len: 0, ..TrainConfig::default() },
            TrainConfig { token_budget: 10, ..TrainConfig::default() },
            TrainConfig { learning_rate: -1.0, ..TrainConfig::default() },
            TrainConfig { decay_factor: 0.0, ..TrainConfig::default() },
            TrainConfig { beam_width: 0, ..TrainConfig::default() },
            TrainConfig { hidden_size: 0, ..TrainConfig::default() },
            TrainConfig { encoder_layers: 0, ..TrainConfig::default() },
            TrainConfig { valid_fraction: 1.0, ..TrainConfig::default() },
            TrainConfig { source_file: Some("a.nl".into()), ..TrainConfig::default() },
        ];
        for cfg in bad {
            assert!(
                matches!(cfg.validate(), Err(NmtError::Config(_))),
                "accepted {cfg:?}"
            );
        }
    }

    #[test]
    fn test_default_corpus_source_vocabulary() {
        let cfg   = TrainConfig::default();
        let pairs = DefaultCorpus.load_pairs().unwrap();
        let sources: Vec<Vec<String>> = pairs.iter().map(|p| p.source.clone()).collect();
        let vocab = VocabularyBuilder::new(cfg.src_vocab_size)
            .with_min_frequency(cfg.min_frequency)
            .build(&sources)
            .unwrap();

        for (id, reserved) in RESERVED_TOKENS.iter().enumerate() {
            assert_eq!(vocab.token(id as u32), Some(*reserved));
        }
        for tok in ["Hallo", ",", "hoe", "gaat", "het", "?"] {
            assert!(vocab.contains(tok), "missing {tok}");
        }
        for tok in sources.iter().flatten() {
            assert!(vocab.id(tok) >= 4, "{tok} got a reserved id");
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir  = TempDir::new("train_config").unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "hidden_size": 32, "too_long": "Truncate" }"#).unwrap();

        let cfg = TrainConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.hidden_size, 32);
        assert_eq!(cfg.too_long, TooLongPolicy::Truncate);
        assert_eq!(cfg.epochs, TrainConfig::default().epochs);
    }

    #[test]
    fn test_execute_writes_artifact_and_metrics() {
        let dir = TempDir::new("train_run").unwrap();
        let cfg = small_config(dir.path());

        let outcome = TrainUseCase::new(cfg)
            .execute_on::<NdArray>(Default::default())
            .unwrap();

        assert_eq!(outcome.summary.epochs, 2);
        assert_eq!(outcome.samples.len(), SAMPLE_TRANSLATIONS);
        assert!(ModelStore::new(dir.path()).exists());

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1 + outcome.summary.updates);
    }
}
