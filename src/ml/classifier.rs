// ============================================================
// Layer 5: Classifier
// ============================================================
// One forward pass per input:
//
//   text → normalize → encode → left-pad/truncate to block_size
//        → class logits (final position) → softmax → argmax → label
//
// Normalisation and padding match the training batches exactly
// (see data::batcher::pad_to_block), otherwise the final
// position would hold something the model never saw.

use burn::prelude::*;

use crate::data::batcher::pad_to_block;
use crate::domain::error::{GptError, GptResult};
use crate::domain::vocab::{normalize_pattern, LabelSet, Vocabulary};
use crate::ml::model::{tensor_to_vec, Gpt, Task};
use crate::ml::sampling::{argmax, softmax};

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label:      String,
    /// Softmax probability of `label`
    pub confidence: f32,
    /// Softmax probability of every label, in label-id order
    pub scores:     Vec<f32>,
}

pub struct Classifier<B: Backend> {
    model:  Gpt<B>,
    vocab:  Vocabulary,
    labels: LabelSet,
    pad_id: u32,
}

impl<B: Backend> Classifier<B> {
    pub fn new(model: Gpt<B>, vocab: Vocabulary, labels: LabelSet) -> GptResult<Self> {
        if model.task() != Task::Classification {
            return Err(GptError::WrongTask("classifier needs a classification head"));
        }
        if model.config().output_size != labels.len() {
            return Err(GptError::ConfigMismatch(format!(
                "model has {} classes, label set has {}",
                model.config().output_size,
                labels.len()
            )));
        }
        let pad_id = vocab.pad_id().ok_or_else(|| {
            GptError::InvalidConfig("classification vocabulary has no padding token".into())
        })?;
        Ok(Self { model, vocab, labels, pad_id })
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn predict(&self, text: &str) -> GptResult<Prediction> {
        let tokens = self.vocab.encode(&normalize_pattern(text))?;
        let block  = self.model.block_size();
        let padded: Vec<i32> = pad_to_block(&tokens, block, self.pad_id)
            .into_iter()
            .map(|x| x as i32)
            .collect();

        let input = Tensor::<B, 1, Int>::from_ints(padded.as_slice(), &self.model.device())
            .reshape([1, block]);
        let logits = tensor_to_vec(self.model.forward_class(input)?)?;

        let scores = softmax(&logits);
        let best   = argmax(&scores).ok_or(GptError::EmptyInput)?;
        let label  = self.labels.label_of(best as u32)?.to_string();

        tracing::debug!("Predicted '{}' ({:.3}) for {:?}", label, scores[best], text);
        Ok(Prediction { label, confidence: scores[best], scores })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;

    use crate::data::dataset::Dataset;
    use crate::domain::corpus::{Corpus, LabeledPattern};
    use crate::infra::cancel::CancelToken;
    use crate::ml::model::GptConfig;
    use crate::ml::trainer::{TrainOptions, Trainer};

    type TestBackend = burn::backend::NdArray;

    fn intents() -> Vec<LabeledPattern> {
        vec![
            LabeledPattern::new("turn this computer off", "shutdown"),
            LabeledPattern::new("shut down my pc", "shutdown"),
            LabeledPattern::new("power off the machine", "shutdown"),
            LabeledPattern::new("start chrome", "open_app"),
            LabeledPattern::new("open chrome please", "open_app"),
            LabeledPattern::new("launch the browser", "open_app"),
        ]
    }

    #[test]
    fn test_rejects_language_model() {
        let model = GptConfig::new(5, 1)
            .with_n_embd(8)
            .with_n_head(2)
            .with_n_layer(1)
            .with_block_size(4)
            .init::<TestBackend>(&Default::default())
            .unwrap();
        let vocab  = Vocabulary::for_patterns(["ab"]);
        let labels = LabelSet::from_labels(["x", "y"]);
        assert!(matches!(
            Classifier::new(model, vocab, labels),
            Err(GptError::WrongTask(_))
        ));
    }

    #[test]
    fn test_prediction_is_a_distribution_over_labels() {
        let patterns = intents();
        let vocab    = Vocabulary::for_patterns(patterns.iter().map(|p| p.pattern.as_str()));
        let labels   = LabelSet::from_labels(patterns.iter().map(|p| p.label.as_str()));
        let model = GptConfig::new(vocab.len(), labels.len())
            .with_n_embd(16)
            .with_n_head(2)
            .with_n_layer(1)
            .with_block_size(24)
            .init::<TestBackend>(&Default::default())
            .unwrap();

        let clf = Classifier::new(model, vocab, labels).unwrap();
        let p   = clf.predict("Start Chrome").unwrap();
        assert_eq!(p.scores.len(), 2);
        assert!((p.scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(p.label == "open_app" || p.label == "shutdown");
        assert_eq!(p.confidence, p.scores.iter().copied().fold(f32::MIN, f32::max));
    }

    #[test]
    fn test_trained_classifier_separates_intents() {
        let device  = Default::default();
        let dataset = Dataset::preprocess(&Corpus::Labeled(intents()), 1.0).unwrap();
        let config  = GptConfig::new(dataset.vocabulary().len(), dataset.output_size())
            .with_n_embd(32)
            .with_n_head(4)
            .with_n_layer(1)
            .with_block_size(24)
            .with_dropout(0.0);

        let mut trainer =
            Trainer::<Autodiff<TestBackend>>::new(&config, dataset, 6, Some(17), device).unwrap();
        let options = TrainOptions::new(300)
            .with_eval_interval(100)
            .with_eval_iters(2)
            .with_learning_rate(3e-3);
        let report = trainer
            .train(&options, &CancelToken::new(), |_| {})
            .unwrap();
        assert_eq!(report.steps_completed, 300);

        let clf = trainer.classifier().unwrap();
        let shutdown = clf.predict("shut down my pc").unwrap();
        assert_eq!(shutdown.label, "shutdown");
        let shutdown_id = clf.labels().id_of("shutdown").unwrap() as usize;
        for (i, s) in shutdown.scores.iter().enumerate() {
            if i != shutdown_id {
                assert!(shutdown.confidence > *s);
            }
        }
        assert_eq!(clf.predict("start chrome").unwrap().label, "open_app");
    }
}
