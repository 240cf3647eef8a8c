// ============================================================
// Layer 2: TrainUseCase
// ============================================================
// Runs the full training pipeline in order:
//
//   Step 1: Load the corpus            (Layer 4 - data)
//   Step 2: Build vocabulary + split   (Layer 4 - data)
//   Step 3: Build the model            (Layer 5 - ml)
//   Step 4: Save the run config        (Layer 6 - infra)
//   Step 5: Run the training loop      (Layer 5 - ml)
//   Step 6: Save the final checkpoint  (Layer 6 - infra)
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::data::dataset::Dataset;
use crate::data::loader::{IntentFileSource, IntentSchema, TextFileSource};
use crate::domain::traits::CorpusSource;
use crate::infra::{cancel::CancelToken, metrics::MetricsLogger};
use crate::ml::backend::{default_device, TrainBackend};
use crate::ml::model::GptConfig;
use crate::ml::trainer::{TrainEvent, TrainOptions, TrainReport, Trainer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusFormat {
    /// Plain text, trained as a character-level language model
    Text,
    /// Labeled pattern groups, trained as a classifier
    Intents,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything one training run needs. Saved as JSON next to the
// final checkpoint so a run can be reproduced later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub corpus:              PathBuf,
    pub format:              CorpusFormat,
    pub schema:              IntentSchema,
    pub split:               f64,
    pub steps:               usize,
    pub eval_interval:       usize,
    pub eval_iters:          usize,
    pub checkpoint_interval: Option<usize>,
    /// Base name for periodic checkpoints; defaults to `output`
    pub checkpoint_path:     Option<PathBuf>,
    pub output:              PathBuf,
    pub n_embd:              usize,
    pub n_head:              usize,
    pub n_layer:             usize,
    pub block_size:          usize,
    pub dropout:             f64,
    pub batch_size:          usize,
    pub lr:                  f64,
    pub seed:                Option<u64>,
    pub metrics_dir:         Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            corpus:              PathBuf::from("data/input.txt"),
            format:              CorpusFormat::Text,
            schema:              IntentSchema::default(),
            split:               0.9,
            steps:               5000,
            eval_interval:       500,
            eval_iters:          200,
            checkpoint_interval: None,
            checkpoint_path:     None,
            output:              PathBuf::from("checkpoints/model.ckpt"),
            n_embd:              64,
            n_head:              4,
            n_layer:             4,
            block_size:          32,
            dropout:             0.1,
            batch_size:          16,
            lr:                  1e-3,
            seed:                None,
            metrics_dir:         None,
        }
    }
}

impl TrainConfig {
    /// Model architecture for a preprocessed dataset.
    pub fn model_config(&self, dataset: &Dataset) -> GptConfig {
        GptConfig::new(dataset.vocabulary().len(), dataset.output_size())
            .with_n_embd(self.n_embd)
            .with_n_head(self.n_head)
            .with_n_layer(self.n_layer)
            .with_block_size(self.block_size)
            .with_dropout(self.dropout)
    }

    pub fn train_options(&self) -> TrainOptions {
        let options = TrainOptions::new(self.steps)
            .with_eval_interval(self.eval_interval)
            .with_eval_iters(self.eval_iters)
            .with_learning_rate(self.lr);
        match self.checkpoint_interval {
            Some(interval) => {
                let base = self.checkpoint_path.clone().unwrap_or_else(|| self.output.clone());
                options.with_checkpoints(base, interval)
            }
            None => options,
        }
    }

    /// Where the run config is written: `model.ckpt` → `model.train.json`.
    pub fn config_path(&self) -> PathBuf {
        self.output.with_extension("train.json")
    }

    fn source(&self) -> Box<dyn CorpusSource> {
        match self.format {
            CorpusFormat::Text => Box::new(TextFileSource::new(&self.corpus)),
            CorpusFormat::Intents => Box::new(IntentFileSource::new(&self.corpus, self.schema.clone())),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Train end to end and save the result to `config.output`.
    /// A cancelled run still saves whatever the last completed step produced.
    pub fn execute(&self, cancel: &CancelToken) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Load the corpus ──────────────────────────────────────────
        let corpus = cfg.source().load()?;

        // ── Step 2: Vocabulary, encoding, split ──────────────────────────────
        let dataset = Dataset::preprocess(&corpus, cfg.split)
            .with_context(|| format!("Cannot preprocess '{}'", cfg.corpus.display()))?;

        // ── Step 3: Model ────────────────────────────────────────────────────
        let model_cfg = cfg.model_config(&dataset);
        let mut trainer = Trainer::<TrainBackend>::new(
            &model_cfg,
            dataset,
            cfg.batch_size,
            cfg.seed,
            default_device(),
        )?;

        // ── Step 4: Save the run config ──────────────────────────────────────
        if let Some(parent) = cfg.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create output dir '{}'", parent.display()))?;
        }
        let config_path = cfg.config_path();
        fs::write(&config_path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write run config '{}'", config_path.display()))?;
        tracing::debug!("Run config saved to '{}'", config_path.display());

        // ── Step 5: Train ────────────────────────────────────────────────────
        let metrics = cfg.metrics_dir.as_ref().map(MetricsLogger::new).transpose()?;
        let report = trainer.train(&cfg.train_options(), cancel, |event| {
            if let (TrainEvent::Evaluated(estimate), Some(logger)) = (event, &metrics) {
                if let Err(e) = logger.log(estimate) {
                    tracing::warn!("Could not record metrics: {e:#}");
                }
            }
        })?;

        // ── Step 6: Final checkpoint ─────────────────────────────────────────
        trainer
            .save(&cfg.output)
            .with_context(|| format!("Cannot save model to '{}'", cfg.output.display()))?;

        Ok(report)
    }
}
