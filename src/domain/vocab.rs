// ============================================================
// Layer 3: Vocabulary and Label Set
// ============================================================
// Bidirectional maps between atomic tokens and dense ids.
//
// Tokens are single characters in both modes:
//   - text generation:  the sorted unique characters of the corpus
//   - classification:   a padding character, the printable ASCII
//                       alphabet, and any other character found in
//                       the (lower-cased) training patterns
//
// Ids are always the contiguous range [0, len). There is no
// unknown-token fallback: encoding a character that was never
// seen is an error.
//
// Both types serialise as their ordered token list, so the
// persisted form is exactly the id order, and they are
// re-validated on load.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::error::{GptError, GptResult};

/// Left-padding character for classification inputs. Sorts first, so it gets id 0.
pub const PAD: char = '\0';

/// Lower-case and trim a classification pattern.
/// Applied on the training path and on the prediction path alike.
pub fn normalize_pattern(text: &str) -> String {
    text.trim().to_lowercase()
}

// ─── Vocabulary ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<char>", into = "Vec<char>")]
pub struct Vocabulary {
    itos: Vec<char>,
    stoi: HashMap<char, u32>,
}

impl Vocabulary {
    /// Sorted unique characters of `text`.
    pub fn from_text(text: &str) -> Self {
        let chars: BTreeSet<char> = text.chars().collect();
        Self::from_sorted(chars)
    }

    /// Vocabulary for classification patterns. Patterns are expected
    /// to be normalised already (see [`normalize_pattern`]).
    pub fn for_patterns<'a, I>(patterns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut chars: BTreeSet<char> = (' '..='~').collect();
        chars.insert(PAD);
        for pattern in patterns {
            chars.extend(pattern.chars());
        }
        Self::from_sorted(chars)
    }

    fn from_sorted(chars: BTreeSet<char>) -> Self {
        let itos: Vec<char> = chars.into_iter().collect();
        let stoi = itos
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u32))
            .collect();
        Self { itos, stoi }
    }

    pub fn len(&self) -> usize {
        self.itos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itos.is_empty()
    }

    pub fn id_of(&self, token: char) -> GptResult<u32> {
        self.stoi
            .get(&token)
            .copied()
            .ok_or(GptError::UnknownToken(token))
    }

    pub fn token_of(&self, id: u32) -> GptResult<char> {
        self.itos
            .get(id as usize)
            .copied()
            .ok_or(GptError::UnknownId(id))
    }

    /// Id of the padding character, if this vocabulary has one.
    pub fn pad_id(&self) -> Option<u32> {
        self.stoi.get(&PAD).copied()
    }

    pub fn encode(&self, text: &str) -> GptResult<Vec<u32>> {
        text.chars().map(|c| self.id_of(c)).collect()
    }

    pub fn decode(&self, ids: &[u32]) -> GptResult<String> {
        ids.iter().map(|&id| self.token_of(id)).collect()
    }
}

impl TryFrom<Vec<char>> for Vocabulary {
    type Error = GptError;

    fn try_from(itos: Vec<char>) -> Result<Self, Self::Error> {
        let mut stoi = HashMap::with_capacity(itos.len());
        for (i, &c) in itos.iter().enumerate() {
            if stoi.insert(c, i as u32).is_some() {
                return Err(GptError::DuplicateToken(c.to_string()));
            }
        }
        Ok(Self { itos, stoi })
    }
}

impl From<Vocabulary> for Vec<char> {
    fn from(v: Vocabulary) -> Self {
        v.itos
    }
}

// ─── LabelSet ─────────────────────────────────────────────────────────────────
/// Class labels for classification, sorted so ids are reproducible across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSet {
    labels: Vec<String>,
    index:  HashMap<String, u32>,
}

impl LabelSet {
    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let sorted: BTreeSet<&str> = labels.into_iter().collect();
        let labels: Vec<String> = sorted.into_iter().map(str::to_string).collect();
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i as u32))
            .collect();
        Self { labels, index }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn id_of(&self, label: &str) -> Option<u32> {
        self.index.get(label).copied()
    }

    pub fn label_of(&self, id: u32) -> GptResult<&str> {
        self.labels
            .get(id as usize)
            .map(String::as_str)
            .ok_or(GptError::UnknownLabel(id))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl TryFrom<Vec<String>> for LabelSet {
    type Error = GptError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        let mut index = HashMap::with_capacity(labels.len());
        for (i, l) in labels.iter().enumerate() {
            if index.insert(l.clone(), i as u32).is_some() {
                return Err(GptError::DuplicateToken(l.clone()));
            }
        }
        Ok(Self { labels, index })
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(l: LabelSet) -> Self {
        l.labels
    }
}
