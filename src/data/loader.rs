// ============================================================
// Layer 4: Corpus Loaders
// ============================================================
// Two corpus formats:
//
//   TextFileSource    a plain UTF-8 file, used verbatim as one
//                     character stream for language modeling
//
//   IntentFileSource  a JSON file of labeled pattern groups:
//
//     { "intents": [
//         { "tag": "shutdown", "patterns": ["turn this computer off", ...] },
//         { "tag": "open_app", "patterns": ["start chrome", ...] }
//     ] }
//
//   The three key names are configurable (IntentSchema), since
//   intent files in the wild disagree on them.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fs, path::PathBuf};

use crate::domain::corpus::{Corpus, LabeledPattern};
use crate::domain::traits::CorpusSource;

// ─── TextFileSource ───────────────────────────────────────────────────────────
pub struct TextFileSource {
    path: PathBuf,
}

impl TextFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CorpusSource for TextFileSource {
    fn load(&self) -> Result<Corpus> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read corpus '{}'", self.path.display()))?;
        tracing::info!(
            "Loaded {} characters from '{}'",
            text.chars().count(),
            self.path.display()
        );
        Ok(Corpus::Text(text))
    }
}

// ─── IntentFileSource ─────────────────────────────────────────────────────────
/// Key names inside an intents JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSchema {
    /// Top-level key holding the list of groups
    pub group_key:    String,
    /// Per-group key holding the label
    pub tag_key:      String,
    /// Per-group key holding the list of pattern strings
    pub patterns_key: String,
}

impl Default for IntentSchema {
    fn default() -> Self {
        Self {
            group_key:    "intents".to_string(),
            tag_key:      "tag".to_string(),
            patterns_key: "patterns".to_string(),
        }
    }
}

pub struct IntentFileSource {
    path:   PathBuf,
    schema: IntentSchema,
}

impl IntentFileSource {
    pub fn new(path: impl Into<PathBuf>, schema: IntentSchema) -> Self {
        Self { path: path.into(), schema }
    }
}

impl CorpusSource for IntentFileSource {
    fn load(&self) -> Result<Corpus> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read intents file '{}'", self.path.display()))?;
        let json: Value = serde_json::from_str(&raw)
            .with_context(|| format!("'{}' is not valid JSON", self.path.display()))?;

        let patterns = parse_intents(&json, &self.schema)
            .with_context(|| format!("Malformed intents file '{}'", self.path.display()))?;

        tracing::info!(
            "Loaded {} patterns from '{}'",
            patterns.len(),
            self.path.display()
        );
        Ok(Corpus::Labeled(patterns))
    }
}

/// Flatten the pattern groups into (pattern, label) pairs, in file order.
fn parse_intents(json: &Value, schema: &IntentSchema) -> Result<Vec<LabeledPattern>> {
    let Some(groups) = json.get(&schema.group_key).and_then(Value::as_array) else {
        bail!("missing array '{}'", schema.group_key);
    };

    let mut out = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        let Some(tag) = group.get(&schema.tag_key).and_then(Value::as_str) else {
            bail!("group {i} has no string '{}'", schema.tag_key);
        };
        let Some(patterns) = group.get(&schema.patterns_key).and_then(Value::as_array) else {
            bail!("group {i} ('{tag}') has no array '{}'", schema.patterns_key);
        };
        for p in patterns {
            let Some(p) = p.as_str() else {
                bail!("group {i} ('{tag}') has a non-string pattern");
            };
            out.push(LabeledPattern::new(p, tag));
        }
    }
    Ok(out)
}
