// ============================================================
// Layer 2: GenerateUseCase
// ============================================================
// Load a language-model checkpoint once, then generate text
// from any number of prompts.

use anyhow::{Context, Result};
use std::path::Path;

use crate::infra::checkpoint::load_checkpoint;
use crate::ml::backend::{default_device, ComputeBackend};
use crate::ml::generator::Generator;
use crate::ml::model::Gpt;

pub struct GenerateUseCase {
    generator: Generator<Gpt<ComputeBackend>>,
}

impl GenerateUseCase {
    /// `seed` fixes the sampling sequence for reproducible output.
    pub fn new(checkpoint: &Path, seed: Option<u64>) -> Result<Self> {
        let generator = load_checkpoint::<ComputeBackend>(checkpoint, &default_device())
            .and_then(|ckpt| ckpt.into_generator(seed))
            .with_context(|| format!("Cannot load generator from '{}'", checkpoint.display()))?;
        Ok(Self { generator })
    }

    pub fn generate(&mut self, prompt: &str, length: usize) -> Result<String> {
        self.generator
            .generate(prompt, length)
            .with_context(|| format!("Generation failed for prompt {prompt:?}"))
    }
}
