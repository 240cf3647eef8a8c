// ============================================================
// Layer 4: Datasets
// ============================================================
// A corpus encoded into integer ids and split into train and
// validation partitions. Two shapes:
//
//   TextDataset     one flat id stream; batches are random
//                   block_size windows with shifted targets
//   LabeledDataset  one (pattern ids, label id) per example;
//                   batches are random whole examples
//
// Both are immutable once built. Sampling goes through a
// BatchSampler, which owns the only mutable state (its RNG).

use crate::data::batcher::{BatchSampler, RawBatch};
use crate::data::splitter::split_at_fraction;
use crate::domain::corpus::{Corpus, LabeledPattern};
use crate::domain::error::{GptError, GptResult};
use crate::domain::vocab::{normalize_pattern, LabelSet, Vocabulary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Validation,
}

impl Split {
    pub fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
        }
    }
}

// ─── TextDataset ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TextDataset {
    vocab: Vocabulary,
    train: Vec<u32>,
    val:   Vec<u32>,
}

impl TextDataset {
    pub fn from_text(text: &str, split_fraction: f64) -> GptResult<Self> {
        let vocab = Vocabulary::from_text(text);
        let ids   = vocab.encode(text)?;
        let (train, val) = split_at_fraction(ids, split_fraction)?;
        Ok(Self { vocab, train, val })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn partition(&self, split: Split) -> &[u32] {
        match split {
            Split::Train => &self.train,
            Split::Validation => &self.val,
        }
    }
}

// ─── LabeledDataset ───────────────────────────────────────────────────────────
/// One encoded classification example (unpadded).
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub tokens: Vec<u32>,
    pub label:  u32,
}

#[derive(Debug, Clone)]
pub struct LabeledDataset {
    vocab:  Vocabulary,
    labels: LabelSet,
    train:  Vec<Example>,
    val:    Vec<Example>,
}

impl LabeledDataset {
    pub fn from_patterns(patterns: &[LabeledPattern], split_fraction: f64) -> GptResult<Self> {
        let normalized: Vec<String> = patterns
            .iter()
            .map(|p| normalize_pattern(&p.pattern))
            .collect();

        let vocab  = Vocabulary::for_patterns(normalized.iter().map(String::as_str));
        let labels = LabelSet::from_labels(patterns.iter().map(|p| p.label.as_str()));
        // One label would give a 1-wide head, which means language modeling.
        if labels.len() < 2 {
            return Err(GptError::TooFewLabels { found: labels.len() });
        }

        let examples = normalized
            .iter()
            .zip(patterns)
            .map(|(text, p)| {
                let label = labels
                    .id_of(&p.label)
                    .ok_or_else(|| GptError::InvalidConfig(format!("label {:?} missing", p.label)))?;
                Ok(Example { tokens: vocab.encode(text)?, label })
            })
            .collect::<GptResult<Vec<_>>>()?;

        let (train, val) = split_at_fraction(examples, split_fraction)?;
        Ok(Self { vocab, labels, train, val })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn partition(&self, split: Split) -> &[Example] {
        match split {
            Split::Train => &self.train,
            Split::Validation => &self.val,
        }
    }
}

// ─── Dataset ──────────────────────────────────────────────────────────────────
/// A preprocessed corpus in either mode. This is what the trainer consumes.
#[derive(Debug, Clone)]
pub enum Dataset {
    Text(TextDataset),
    Labeled(LabeledDataset),
}

impl Dataset {
    /// Build the vocabulary, encode the corpus and split it.
    pub fn preprocess(corpus: &Corpus, split_fraction: f64) -> GptResult<Self> {
        let dataset = match corpus {
            Corpus::Text(text) => Dataset::Text(TextDataset::from_text(text, split_fraction)?),
            Corpus::Labeled(patterns) => {
                Dataset::Labeled(LabeledDataset::from_patterns(patterns, split_fraction)?)
            }
        };

        tracing::info!(
            "Preprocessed corpus: vocab={} train={} validation={}",
            dataset.vocabulary().len(),
            dataset.partition_len(Split::Train),
            dataset.partition_len(Split::Validation),
        );
        Ok(dataset)
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        match self {
            Dataset::Text(d) => d.vocabulary(),
            Dataset::Labeled(d) => d.vocabulary(),
        }
    }

    pub fn labels(&self) -> Option<&LabelSet> {
        match self {
            Dataset::Text(_) => None,
            Dataset::Labeled(d) => Some(d.labels()),
        }
    }

    /// Head width the model needs: 1 selects next-token logits,
    /// N selects N-way classification.
    pub fn output_size(&self) -> usize {
        match self {
            Dataset::Text(_) => 1,
            Dataset::Labeled(d) => d.labels().len(),
        }
    }

    /// Tokens (text) or examples (labeled) in a partition.
    pub fn partition_len(&self, split: Split) -> usize {
        match self {
            Dataset::Text(d) => d.partition(split).len(),
            Dataset::Labeled(d) => d.partition(split).len(),
        }
    }

    /// Whether `sample` can draw a batch from this partition.
    pub fn can_sample(&self, split: Split, block_size: usize) -> bool {
        match self {
            Dataset::Text(d) => d.partition(split).len() > block_size,
            Dataset::Labeled(d) => !d.partition(split).is_empty(),
        }
    }

    pub fn sample(&self, sampler: &mut BatchSampler, split: Split) -> GptResult<RawBatch> {
        match self {
            Dataset::Text(d) => sampler.sample_windows(d.partition(split), split),
            Dataset::Labeled(d) => {
                let pad = d.vocabulary().pad_id().ok_or_else(|| {
                    GptError::InvalidConfig("classification vocabulary has no padding token".into())
                })?;
                sampler.sample_examples(d.partition(split), pad, split)
            }
        }
    }
}
