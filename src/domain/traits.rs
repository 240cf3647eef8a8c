// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// The seams between layers. Loaders and models live in other
// layers and implement these, so the code that drives them
// (preprocessing, the generation loop) can be exercised with
// simple stand-ins in tests.

use anyhow::Result;

use crate::domain::corpus::Corpus;
use crate::domain::error::GptResult;

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// Anything that can produce a raw corpus.
///
/// Implementations:
///   - TextFileSource   → a plain UTF-8 text file
///   - IntentFileSource → an intents JSON file of labeled pattern groups
pub trait CorpusSource {
    fn load(&self) -> Result<Corpus>;
}

// ─── NextTokenModel ───────────────────────────────────────────────────────────
/// A language model as the generation loop sees it: a context
/// window in, one row of next-token logits out.
///
/// Implementations:
///   - Gpt<B> with a language-modeling head
pub trait NextTokenModel {
    /// Longest context the model accepts.
    fn block_size(&self) -> usize;

    /// Logits for the token following `context`.
    /// `context` is non-empty and at most `block_size()` long.
    fn next_token_logits(&self, context: &[u32]) -> GptResult<Vec<f32>>;
}
