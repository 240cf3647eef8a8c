// ============================================================
// Layer 5: Training Loop
// ============================================================
// A fixed number of optimizer steps over randomly sampled
// batches:
//
//   for step in 0..n_steps:
//       stop if cancelled
//       if eval step: estimate train/validation loss (no update)
//       sample batch → forward → cross-entropy → backward → AdamW
//       if checkpoint step: save `<stem>_<step+1><ext>`
//
// A periodic save that fails is logged and reported as an event;
// the run keeps going.
//
// Evaluation runs on `model.valid()`, the same weights on the
// inner backend: no gradient tape and dropout switched off, so
// estimating the loss can never change a parameter.
//
// The trainer owns the model; the caller gets it back through
// the accessors (or as a Generator/Classifier) once train()
// returns. Progress is reported through an event callback so
// the CLI can print it and tests can cancel at an exact step.
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use burn::{
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::Serialize;

use crate::data::batcher::BatchSampler;
use crate::data::dataset::{Dataset, Split};
use crate::domain::error::{GptError, GptResult};
use crate::infra::cancel::CancelToken;
use crate::infra::checkpoint::{save_checkpoint, step_path, CheckpointMeta};
use crate::ml::backend::compute_target;
use crate::ml::classifier::Classifier;
use crate::ml::generator::Generator;
use crate::ml::model::{Gpt, GptConfig, Task};

// ─── TrainOptions ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainOptions {
    pub n_steps:             usize,
    /// Estimate losses every this many steps (and always at the last step)
    pub eval_interval:       usize,
    /// Batches averaged per loss estimate
    pub eval_iters:          usize,
    pub learning_rate:       f64,
    /// Save a checkpoint every this many steps, if set together with a path
    pub checkpoint_interval: Option<usize>,
    pub checkpoint_path:     Option<PathBuf>,
}

impl TrainOptions {
    pub fn new(n_steps: usize) -> Self {
        Self {
            n_steps,
            eval_interval:       500,
            eval_iters:          200,
            learning_rate:       1e-3,
            checkpoint_interval: None,
            checkpoint_path:     None,
        }
    }

    pub fn with_eval_interval(mut self, eval_interval: usize) -> Self {
        self.eval_interval = eval_interval;
        self
    }

    pub fn with_eval_iters(mut self, eval_iters: usize) -> Self {
        self.eval_iters = eval_iters;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Periodic checkpoints derived from `path`: `run.ckpt` → `run_<step>.ckpt`.
    pub fn with_checkpoints(mut self, path: impl Into<PathBuf>, interval: usize) -> Self {
        self.checkpoint_path = Some(path.into());
        self.checkpoint_interval = Some(interval);
        self
    }

    fn validate(&self) -> GptResult<()> {
        if self.eval_interval == 0 {
            return Err(GptError::InvalidConfig("eval_interval must be positive".into()));
        }
        if self.eval_iters == 0 {
            return Err(GptError::InvalidConfig("eval_iters must be positive".into()));
        }
        if self.checkpoint_interval == Some(0) {
            return Err(GptError::InvalidConfig("checkpoint_interval must be positive".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(GptError::InvalidConfig(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// `step` is 0-based.
    fn is_eval_step(&self, step: usize) -> bool {
        (step + 1) % self.eval_interval == 0 || step + 1 == self.n_steps
    }

    fn checkpoint_for(&self, step: usize) -> Option<PathBuf> {
        let interval = self.checkpoint_interval?;
        let base = self.checkpoint_path.as_deref()?;
        ((step + 1) % interval == 0).then(|| step_path(base, step + 1))
    }
}

// ─── Reports ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LossEstimate {
    /// Optimizer steps applied before this estimate was taken, plus one
    pub step:       usize,
    pub train:      f64,
    /// `None` when the validation partition is too small to sample
    pub validation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrainEvent {
    Step { step: usize, loss: f64 },
    Evaluated(LossEstimate),
    CheckpointSaved { step: usize, path: PathBuf },
    /// A periodic save failed; training carries on.
    CheckpointFailed { step: usize, path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct TrainReport {
    pub steps_completed: usize,
    pub cancelled:       bool,
    pub elapsed:         Duration,
    pub estimates:       Vec<LossEstimate>,
    pub checkpoints:     Vec<PathBuf>,
}

impl TrainReport {
    pub fn last_estimate(&self) -> Option<&LossEstimate> {
        self.estimates.last()
    }
}

// ─── Trainer ──────────────────────────────────────────────────────────────────
pub struct Trainer<B: AutodiffBackend> {
    model:      Gpt<B>,
    config:     GptConfig,
    dataset:    Dataset,
    sampler:    BatchSampler,
    device:     B::Device,
    steps_done: usize,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Build a fresh model for `dataset`. `seed` fixes batch sampling.
    pub fn new(
        config:     &GptConfig,
        dataset:    Dataset,
        batch_size: usize,
        seed:       Option<u64>,
        device:     B::Device,
    ) -> GptResult<Self> {
        if config.vocab_size != dataset.vocabulary().len() {
            return Err(GptError::ConfigMismatch(format!(
                "config vocab_size {} but dataset vocabulary has {} tokens",
                config.vocab_size,
                dataset.vocabulary().len()
            )));
        }
        if config.output_size != dataset.output_size() {
            return Err(GptError::ConfigMismatch(format!(
                "config output_size {} but dataset needs {}",
                config.output_size,
                dataset.output_size()
            )));
        }
        if batch_size == 0 {
            return Err(GptError::InvalidConfig("batch_size must be positive".into()));
        }
        if !dataset.can_sample(Split::Train, config.block_size) {
            return Err(GptError::PartitionTooShort {
                split:      Split::Train.name(),
                len:        dataset.partition_len(Split::Train),
                block_size: config.block_size,
            });
        }

        let model   = config.init::<B>(&device)?;
        let sampler = BatchSampler::new(batch_size, config.block_size, seed);
        Ok(Self { model, config: config.clone(), dataset, sampler, device, steps_done: 0 })
    }

    pub fn model(&self) -> &Gpt<B> {
        &self.model
    }

    /// Optimizer steps applied over every train() call so far.
    pub fn steps_done(&self) -> usize {
        self.steps_done
    }

    /// Run `options.n_steps` steps, or fewer if `cancel` trips.
    ///
    /// Cancellation is only observed between steps, and every
    /// completed step is written back before anything else can fail,
    /// so the model always holds the result of the last completed
    /// step, even when this returns an error.
    pub fn train<F>(
        &mut self,
        options:      &TrainOptions,
        cancel:       &CancelToken,
        mut on_event: F,
    ) -> GptResult<TrainReport>
    where
        F: FnMut(&TrainEvent),
    {
        options.validate()?;
        tracing::info!(
            "Training for {} steps (lr={}, eval every {} steps)",
            options.n_steps,
            options.learning_rate,
            options.eval_interval,
        );

        let start      = Instant::now();
        let mut report = TrainReport::default();
        let mut optim  = AdamWConfig::new().init::<B, Gpt<B>>();

        for step in 0..options.n_steps {
            if cancel.is_cancelled() {
                tracing::warn!("Training cancelled after {} steps", step);
                report.cancelled = true;
                break;
            }

            if options.is_eval_step(step) {
                let estimate = self.estimate_at(step + 1, options.eval_iters)?;
                match estimate.validation {
                    Some(val) => tracing::info!(
                        "step {:>5}/{}: train loss {:.4}, val loss {:.4}",
                        estimate.step, options.n_steps, estimate.train, val,
                    ),
                    None => tracing::info!(
                        "step {:>5}/{}: train loss {:.4}, val loss n/a",
                        estimate.step, options.n_steps, estimate.train,
                    ),
                }
                on_event(&TrainEvent::Evaluated(estimate));
                report.estimates.push(estimate);
            }

            let batch = self
                .dataset
                .sample(&mut self.sampler, Split::Train)?
                .to_tensors::<B>(&self.device);
            let loss = self.model.forward_loss(&batch)?;
            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

            // Backward pass + AdamW update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = optim.step(options.learning_rate, self.model.clone(), grads);

            self.steps_done += 1;
            report.steps_completed += 1;
            on_event(&TrainEvent::Step { step: step + 1, loss: loss_val });

            if let Some(path) = options.checkpoint_for(step) {
                match save_checkpoint(&path, &self.model, &self.meta()) {
                    Ok(()) => {
                        tracing::info!("Checkpoint saved for step {}: '{}'", step + 1, path.display());
                        on_event(&TrainEvent::CheckpointSaved { step: step + 1, path: path.clone() });
                        report.checkpoints.push(path);
                    }
                    Err(e) => {
                        tracing::warn!("Checkpoint for step {} not saved to '{}': {e}", step + 1, path.display());
                        on_event(&TrainEvent::CheckpointFailed {
                            step:   step + 1,
                            path,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        report.elapsed = start.elapsed();
        tracing::info!(
            "Training finished: {} steps in {:.1}s",
            report.steps_completed,
            report.elapsed.as_secs_f64(),
        );
        Ok(report)
    }

    /// Average loss over `eval_iters` sampled batches per partition,
    /// computed without touching the parameters.
    pub fn estimate_loss(&mut self, eval_iters: usize) -> GptResult<LossEstimate> {
        if eval_iters == 0 {
            return Err(GptError::InvalidConfig("eval_iters must be positive".into()));
        }
        self.estimate_at(self.steps_done, eval_iters)
    }

    fn estimate_at(&mut self, step: usize, eval_iters: usize) -> GptResult<LossEstimate> {
        // model.valid() → Gpt<B::InnerBackend>: no autodiff, dropout off
        let model_valid = self.model.valid();

        let train = mean_loss(
            &model_valid,
            &self.dataset,
            &mut self.sampler,
            Split::Train,
            eval_iters,
            &self.device,
        )?;
        let validation = if self.dataset.can_sample(Split::Validation, self.config.block_size) {
            Some(mean_loss(
                &model_valid,
                &self.dataset,
                &mut self.sampler,
                Split::Validation,
                eval_iters,
                &self.device,
            )?)
        } else {
            None
        };

        Ok(LossEstimate { step, train, validation })
    }

    /// What a checkpoint of the current model records alongside the weights.
    pub fn meta(&self) -> CheckpointMeta {
        CheckpointMeta {
            config:         self.config.clone(),
            vocabulary:     self.dataset.vocabulary().clone(),
            labels:         self.dataset.labels().cloned(),
            compute_target: compute_target().to_string(),
            step:           Some(self.steps_done),
        }
    }

    pub fn save(&self, path: &Path) -> GptResult<()> {
        save_checkpoint(path, &self.model, &self.meta())?;
        tracing::info!("Model saved to '{}'", path.display());
        Ok(())
    }

    /// The trained model as a text generator (language-model datasets only).
    pub fn generator(&self, seed: Option<u64>) -> GptResult<Generator<Gpt<B::InnerBackend>>> {
        if self.model.task() != Task::LanguageModel {
            return Err(GptError::WrongTask("generation needs a language-model dataset"));
        }
        Ok(Generator::new(self.model.valid(), self.dataset.vocabulary().clone(), seed))
    }

    /// The trained model as a classifier (labeled datasets only).
    pub fn classifier(&self) -> GptResult<Classifier<B::InnerBackend>> {
        let labels = self
            .dataset
            .labels()
            .ok_or(GptError::WrongTask("prediction needs a labeled dataset"))?;
        Classifier::new(self.model.valid(), self.dataset.vocabulary().clone(), labels.clone())
    }
}

fn mean_loss<B: Backend>(
    model:      &Gpt<B>,
    dataset:    &Dataset,
    sampler:    &mut BatchSampler,
    split:      Split,
    eval_iters: usize,
    device:     &B::Device,
) -> GptResult<f64> {
    let mut sum = 0.0f64;
    for _ in 0..eval_iters {
        let batch = dataset.sample(sampler, split)?.to_tensors::<B>(device);
        sum += model.forward_loss(&batch)?.into_scalar().elem::<f64>();
    }
    Ok(sum / eval_iters as f64)
}
