// ============================================================
// Layer 4: Batch Sampler
// ============================================================
// Draws one training (or evaluation) batch at a time.
//
// Sampling and tensor creation are two separate steps:
//
//   BatchSampler  → RawBatch       plain ids, no Burn types,
//                                  so the bounds are easy to test
//   RawBatch      → TokenBatch<B>  tensors on any backend, so the
//                                  same batch feeds the autodiff
//                                  model and the inner eval model
//
// Language modeling: batch_size random offsets i in
// [0, L - block_size); input = data[i..i+B], target =
// data[i+1..i+B+1]. Targets are flattened to [batch * block].
//
// Classification: batch_size random examples, each cut to its
// first block_size tokens and left-padded, so position
// block_size-1 holds the last kept character (the last character
// of the pattern unless it was cut). Targets are [batch] label ids.
//
// No caching and no epoch bookkeeping: every call is an
// independent draw that only advances the RNG.

use burn::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::dataset::{Example, Split};
use crate::domain::error::{GptError, GptResult};

// ─── RawBatch ─────────────────────────────────────────────────────────────────
/// A sampled batch as plain ids, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch {
    /// `batch_size * seq_len` input ids
    pub inputs:     Vec<u32>,
    /// `batch_size * seq_len` (language modeling) or `batch_size` (classification)
    pub targets:    Vec<u32>,
    pub batch_size: usize,
    pub seq_len:    usize,
}

impl RawBatch {
    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> TokenBatch<B> {
        // Burn Int tensors are built from i32 slices
        let inputs: Vec<i32>  = self.inputs.iter().map(|&x| x as i32).collect();
        let targets: Vec<i32> = self.targets.iter().map(|&x| x as i32).collect();

        let inputs = Tensor::<B, 1, Int>::from_ints(inputs.as_slice(), device)
            .reshape([self.batch_size, self.seq_len]);
        let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), device);

        TokenBatch { inputs, targets }
    }
}

// ─── TokenBatch ───────────────────────────────────────────────────────────────
/// A batch ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct TokenBatch<B: Backend> {
    /// Token ids, shape [batch_size, seq_len]
    pub inputs: Tensor<B, 2, Int>,
    /// Flattened targets, one per logits row the model produces
    pub targets: Tensor<B, 1, Int>,
}

// ─── BatchSampler ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct BatchSampler {
    rng:        StdRng,
    batch_size: usize,
    block_size: usize,
}

impl BatchSampler {
    /// A sampler with a fixed seed, or one seeded from OS entropy.
    pub fn new(batch_size: usize, block_size: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng, batch_size, block_size }
    }

    /// Random windows with shifted-by-one targets.
    pub fn sample_windows(&mut self, data: &[u32], split: Split) -> GptResult<RawBatch> {
        let offsets = self.window_offsets(data.len(), split)?;
        let b = self.block_size;

        let mut inputs  = Vec::with_capacity(self.batch_size * b);
        let mut targets = Vec::with_capacity(self.batch_size * b);
        for i in offsets {
            inputs.extend_from_slice(&data[i..i + b]);
            targets.extend_from_slice(&data[i + 1..i + b + 1]);
        }

        Ok(RawBatch {
            inputs,
            targets,
            batch_size: self.batch_size,
            seq_len:    b,
        })
    }

    /// Offsets drawn independently and uniformly from [0, len - block_size).
    pub fn window_offsets(&mut self, len: usize, split: Split) -> GptResult<Vec<usize>> {
        if len <= self.block_size {
            return Err(GptError::PartitionTooShort {
                split:      split.name(),
                len,
                block_size: self.block_size,
            });
        }
        let upper = len - self.block_size;
        Ok((0..self.batch_size).map(|_| self.rng.gen_range(0..upper)).collect())
    }

    /// Random whole examples, padded to exactly block_size.
    pub fn sample_examples(&mut self, examples: &[Example], pad_id: u32, split: Split) -> GptResult<RawBatch> {
        if examples.is_empty() {
            return Err(GptError::PartitionTooShort {
                split:      split.name(),
                len:        0,
                block_size: self.block_size,
            });
        }

        let mut inputs  = Vec::with_capacity(self.batch_size * self.block_size);
        let mut targets = Vec::with_capacity(self.batch_size);
        for _ in 0..self.batch_size {
            let ex = &examples[self.rng.gen_range(0..examples.len())];
            inputs.extend(pad_to_block(&ex.tokens, self.block_size, pad_id));
            targets.push(ex.label);
        }

        Ok(RawBatch {
            inputs,
            targets,
            batch_size: self.batch_size,
            seq_len:    self.block_size,
        })
    }
}

/// Keep the first `block_size` tokens, then left-pad to exactly `block_size`.
pub fn pad_to_block(tokens: &[u32], block_size: usize, pad_id: u32) -> Vec<u32> {
    let kept = &tokens[..tokens.len().min(block_size)];
    let mut out = vec![pad_id; block_size - kept.len()];
    out.extend_from_slice(kept);
    out
}
