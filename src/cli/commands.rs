// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `translate`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::TrainConfig;
use crate::application::translate_use_case::TranslateOptions;
use crate::data::batcher::TooLongPolicy;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a translation model on a parallel corpus
    Train(TrainArgs),

    /// Translate a sentence with a trained model
    Translate(TranslateArgs),
}

/// What to do with sentences longer than the maximum length
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum TooLongArg {
    /// Leave the pair out of training
    Ignore,
    /// Cut each side to its maximum
    Truncate,
}

impl From<TooLongArg> for TooLongPolicy {
    fn from(a: TooLongArg) -> Self {
        match a {
            TooLongArg::Ignore   => TooLongPolicy::Ignore,
            TooLongArg::Truncate => TooLongPolicy::Truncate,
        }
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON file with a full TrainConfig; when given, the flags below are ignored
    #[arg(long)]
    pub config: Option<String>,

    /// Source-language file, one tokenised sentence per line
    #[arg(long, requires = "target_file")]
    pub source_file: Option<String>,

    /// Target-language file, aligned line by line with --source-file
    #[arg(long, requires = "source_file")]
    pub target_file: Option<String>,

    /// Directory for the model artifact and metrics.csv
    #[arg(long, default_value = "model")]
    pub model_dir: String,

    /// Stacked BiLSTM layers in the encoder
    #[arg(long, default_value_t = 1)]
    pub encoder_layers: usize,

    /// Stacked LSTM layers in the decoder
    #[arg(long, default_value_t = 1)]
    pub decoder_layers: usize,

    /// Hidden size of every LSTM, also used as the embedding size
    #[arg(long, default_value_t = 64)]
    pub hidden_size: usize,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    /// Upper bound on sentences × longest sentence per batch
    #[arg(long, default_value_t = 256)]
    pub token_budget: usize,

    #[arg(long, default_value_t = 50)]
    pub max_source_len: usize,

    #[arg(long, default_value_t = 50)]
    pub max_target_len: usize,

    #[arg(long, value_enum, default_value_t = TooLongArg::Ignore)]
    pub too_long: TooLongArg,

    /// Starting learning rate
    #[arg(long, default_value_t = 0.005)]
    pub lr: f64,

    /// Updates of linear warm-up before the starting rate is reached
    #[arg(long, default_value_t = 0)]
    pub warmup_steps: usize,

    /// Multiply the rate by this every --decay-interval updates
    #[arg(long, default_value_t = 1.0)]
    pub decay_factor: f64,

    #[arg(long, default_value_t = 1000)]
    pub decay_interval: usize,

    /// Clip gradients to this global norm (0 disables clipping)
    #[arg(long, default_value_t = 5.0)]
    pub grad_clip: f32,

    /// Beam width for the sample translations after training (1 = greedy)
    #[arg(long, default_value_t = 3)]
    pub beam_width: usize,

    /// Seed for weight initialisation, the validation split and shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Report the average loss every N updates
    #[arg(long, default_value_t = 10)]
    pub report_every: usize,

    /// Share of pairs held out for validation
    #[arg(long, default_value_t = 0.0)]
    pub valid_fraction: f64,

    /// Reorder the training pairs before every epoch
    #[arg(long)]
    pub shuffle: bool,

    /// Source vocabulary cap, reserved symbols included
    #[arg(long, default_value_t = 30_000)]
    pub src_vocab_size: usize,

    /// Target vocabulary cap, reserved symbols included
    #[arg(long, default_value_t = 30_000)]
    pub tgt_vocab_size: usize,

    /// Tokens seen fewer times than this become <unk>
    #[arg(long, default_value_t = 1)]
    pub min_frequency: usize,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2:
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            source_file:        a.source_file,
            target_file:        a.target_file,
            model_dir:          a.model_dir,
            encoder_layers:     a.encoder_layers,
            decoder_layers:     a.decoder_layers,
            hidden_size:        a.hidden_size,
            epochs:             a.epochs,
            token_budget:       a.token_budget,
            max_source_len:     a.max_source_len,
            max_target_len:     a.max_target_len,
            too_long:           a.too_long.into(),
            learning_rate:      a.lr,
            warmup_steps:       a.warmup_steps,
            decay_factor:       a.decay_factor,
            decay_interval:     a.decay_interval,
            grad_clip:          (a.grad_clip > 0.0).then_some(a.grad_clip),
            beam_width:         a.beam_width,
            seed:               a.seed,
            report_every:       a.report_every,
            valid_fraction:     a.valid_fraction,
            shuffle_each_epoch: a.shuffle,
            src_vocab_size:     a.src_vocab_size,
            tgt_vocab_size:     a.tgt_vocab_size,
            min_frequency:      a.min_frequency,
            ..TrainConfig::default()
        }
    }
}

/// All arguments for the `translate` command
#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// The sentence to translate, tokens separated by spaces
    #[arg(long)]
    pub sentence: String,

    /// Directory the model was trained into
    #[arg(long, default_value = "model")]
    pub model_dir: String,

    /// Number of hypotheses kept during search (1 = greedy)
    #[arg(long, default_value_t = 3)]
    pub beam_width: usize,

    /// Longest output; defaults to the trained maximum
    #[arg(long)]
    pub max_target_len: Option<usize>,

    /// Also print the log-probability of every output token
    #[arg(long)]
    pub scores: bool,
}

impl From<&TranslateArgs> for TranslateOptions {
    fn from(a: &TranslateArgs) -> Self {
        TranslateOptions {
            beam_width:     a.beam_width,
            max_target_len: a.max_target_len,
            with_scores:    a.scores,
        }
    }
}
