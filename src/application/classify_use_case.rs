// ============================================================
// Layer 2: ClassifyUseCase
// ============================================================
// Load a classification checkpoint once, then predict the
// intent of any number of inputs.

use anyhow::{Context, Result};
use std::path::Path;

use crate::infra::checkpoint::load_checkpoint;
use crate::ml::backend::{default_device, ComputeBackend};
use crate::ml::classifier::{Classifier, Prediction};

pub struct ClassifyUseCase {
    classifier: Classifier<ComputeBackend>,
}

impl ClassifyUseCase {
    pub fn new(checkpoint: &Path) -> Result<Self> {
        let classifier = load_checkpoint::<ComputeBackend>(checkpoint, &default_device())
            .and_then(|ckpt| ckpt.into_classifier())
            .with_context(|| format!("Cannot load classifier from '{}'", checkpoint.display()))?;
        tracing::info!("Labels: {}", classifier.labels().labels().join(", "));
        Ok(Self { classifier })
    }

    pub fn predict(&self, text: &str) -> Result<Prediction> {
        self.classifier
            .predict(text)
            .with_context(|| format!("Cannot classify {text:?}"))
    }
}
