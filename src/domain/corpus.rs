// ============================================================
// Layer 3: Corpus Domain Types
// ============================================================
// What a corpus loader hands to preprocessing: either one raw
// text stream (language modeling) or a list of patterns, each
// tagged with the label of the intent group it came from
// (classification).

use serde::{Deserialize, Serialize};

/// One classification example before encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledPattern {
    pub pattern: String,
    pub label:   String,
}

impl LabeledPattern {
    pub fn new(pattern: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            label:   label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Corpus {
    Text(String),
    Labeled(Vec<LabeledPattern>),
}
