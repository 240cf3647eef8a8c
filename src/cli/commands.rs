// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// Three subcommands: `train`, `generate` and `predict`.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::train_use_case::{CorpusFormat, TrainConfig};
use crate::data::loader::IntentSchema;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a model on a text corpus or an intents file
    Train(TrainArgs),

    /// Generate text from a language-model checkpoint
    Generate(GenerateArgs),

    /// Predict the intent of one or more inputs
    Predict(PredictArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FormatArg {
    /// Plain text → character-level language model
    Text,
    /// Intents JSON → classifier
    Intents,
}

impl From<FormatArg> for CorpusFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Text => CorpusFormat::Text,
            FormatArg::Intents => CorpusFormat::Intents,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Corpus file to train on
    #[arg(long)]
    pub corpus: PathBuf,

    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    pub format: FormatArg,

    /// Top-level key of the intents list
    #[arg(long, default_value = "intents")]
    pub group_key: String,

    /// Per-intent key holding the label
    #[arg(long, default_value = "tag")]
    pub tag_key: String,

    /// Per-intent key holding the example patterns
    #[arg(long, default_value = "patterns")]
    pub patterns_key: String,

    /// Fraction of the corpus used for training; the rest is validation
    #[arg(long, default_value_t = 0.9)]
    pub split: f64,

    /// Number of optimizer steps
    #[arg(long, default_value_t = 5000)]
    pub steps: usize,

    /// Estimate train/validation loss every N steps
    #[arg(long, default_value_t = 500)]
    pub eval_interval: usize,

    /// Batches averaged per loss estimate
    #[arg(long, default_value_t = 200)]
    pub eval_iters: usize,

    /// Save an intermediate checkpoint every N steps
    #[arg(long)]
    pub checkpoint_interval: Option<usize>,

    /// Base path for intermediate checkpoints (default: --output)
    #[arg(long)]
    pub checkpoint_path: Option<PathBuf>,

    /// Where the final checkpoint is written
    #[arg(long, default_value = "checkpoints/model.ckpt")]
    pub output: PathBuf,

    /// Embedding width; must be divisible by --n-head
    #[arg(long, default_value_t = 64)]
    pub n_embd: usize,

    #[arg(long, default_value_t = 4)]
    pub n_head: usize,

    #[arg(long, default_value_t = 4)]
    pub n_layer: usize,

    /// Longest context the model attends over
    #[arg(long, default_value_t = 32)]
    pub block_size: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Seed for batch sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Append loss estimates to <dir>/metrics.csv
    #[arg(long)]
    pub metrics_dir: Option<PathBuf>,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            corpus:              a.corpus,
            format:              a.format.into(),
            schema:              IntentSchema {
                group_key:    a.group_key,
                tag_key:      a.tag_key,
                patterns_key: a.patterns_key,
            },
            split:               a.split,
            steps:               a.steps,
            eval_interval:       a.eval_interval,
            eval_iters:          a.eval_iters,
            checkpoint_interval: a.checkpoint_interval,
            checkpoint_path:     a.checkpoint_path,
            output:              a.output,
            n_embd:              a.n_embd,
            n_head:              a.n_head,
            n_layer:             a.n_layer,
            block_size:          a.block_size,
            dropout:             a.dropout,
            batch_size:          a.batch_size,
            lr:                  a.lr,
            seed:                a.seed,
            metrics_dir:         a.metrics_dir,
        }
    }
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[arg(long)]
    pub checkpoint: PathBuf,

    /// Text to continue; may be empty
    #[arg(long, default_value = "")]
    pub prompt: String,

    /// Number of characters to generate
    #[arg(long, default_value_t = 200)]
    pub length: usize,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Pause between printed characters, in milliseconds
    #[arg(long, default_value_t = 1)]
    pub delay_ms: u64,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[arg(long)]
    pub checkpoint: PathBuf,

    /// Inputs to classify
    #[arg(required = true)]
    pub text: Vec<String>,
}
