// ============================================================
// Layer 5: Autoregressive Generator
// ============================================================
// Produces text one token at a time:
//
//   ids = encode(prompt)
//   repeat `length` times:
//       window = last min(len, block_size) ids
//       logits = model(window) at the final position
//       id     = categorical sample of softmax(logits)
//       ids.push(id)
//   return decode(generated ids)          (prompt excluded)
//
// Each step depends on the token drawn by the step before it,
// so this is a plain bounded loop. The sliding window is its own
// function so the truncation rule can be tested directly.
//
// An empty prompt is seeded with token id 0 so the first step
// has something to attend to; that seed is never returned.

use rand::{rngs::StdRng, SeedableRng};

use crate::domain::error::GptResult;
use crate::domain::traits::NextTokenModel;
use crate::domain::vocab::Vocabulary;
use crate::ml::sampling::{sample_categorical, softmax};

/// The last `min(tokens.len(), block_size)` tokens.
pub fn context_window(tokens: &[u32], block_size: usize) -> &[u32] {
    &tokens[tokens.len().saturating_sub(block_size)..]
}

pub struct Generator<M: NextTokenModel> {
    model: M,
    vocab: Vocabulary,
    rng:   StdRng,
}

impl<M: NextTokenModel> Generator<M> {
    /// `seed` fixes the sampling sequence; `None` draws from OS entropy.
    pub fn new(model: M, vocab: Vocabulary, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { model, vocab, rng }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Generate exactly `length` tokens after `prompt` and return them as text.
    pub fn generate(&mut self, prompt: &str, length: usize) -> GptResult<String> {
        let generated = self.generate_ids(prompt, length)?;
        self.vocab.decode(&generated)
    }

    /// Like [`Generator::generate`], returning the new token ids.
    pub fn generate_ids(&mut self, prompt: &str, length: usize) -> GptResult<Vec<u32>> {
        let mut tokens = self.vocab.encode(prompt)?;
        if tokens.is_empty() {
            tokens.push(0);
        }
        let prompt_len = tokens.len();
        let block_size = self.model.block_size();

        for _ in 0..length {
            let window = context_window(&tokens, block_size);
            let logits = self.model.next_token_logits(window)?;
            let probs  = softmax(&logits);
            let next   = sample_categorical(&probs, &mut self.rng)?;
            tokens.push(next as u32);
        }

        tracing::debug!("Generated {} tokens", tokens.len() - prompt_len);
        Ok(tokens.split_off(prompt_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use burn::module::Param;
    use burn::prelude::*;

    use crate::ml::model::GptConfig;

    type TestBackend = burn::backend::NdArray;

    /// Always puts (effectively) all probability on token 0, and
    /// remembers every context it was shown.
    struct AlwaysFirst {
        vocab_size: usize,
        block_size: usize,
        seen:       RefCell<Vec<Vec<u32>>>,
    }

    impl NextTokenModel for AlwaysFirst {
        fn block_size(&self) -> usize {
            self.block_size
        }

        fn next_token_logits(&self, context: &[u32]) -> GptResult<Vec<f32>> {
            self.seen.borrow_mut().push(context.to_vec());
            let mut logits = vec![-100.0; self.vocab_size];
            logits[0] = 100.0;
            Ok(logits)
        }
    }

    fn always_first(block_size: usize) -> AlwaysFirst {
        AlwaysFirst { vocab_size: 2, block_size, seen: RefCell::new(Vec::new()) }
    }

    #[test]
    fn test_context_window_keeps_the_tail() {
        let t = [1, 2, 3, 4, 5];
        assert_eq!(context_window(&t, 3), &[3, 4, 5]);
        assert_eq!(context_window(&t, 5), &t);
        assert_eq!(context_window(&t, 9), &t);
    }

    #[test]
    fn test_degenerate_model_generates_aaaaa() {
        let vocab = Vocabulary::from_text("ab");
        let mut gen = Generator::new(always_first(8), vocab, Some(0));
        assert_eq!(gen.generate("a", 5).unwrap(), "aaaaa");
    }

    #[test]
    fn test_window_slides_and_never_exceeds_block_size() {
        let vocab = Vocabulary::from_text("ab");
        let mut gen = Generator::new(always_first(3), vocab, Some(0));
        let out = gen.generate("bb", 4).unwrap();
        assert_eq!(out.chars().count(), 4);

        let seen = gen.model().seen.borrow();
        // bb=[1,1], then one token appended per step
        assert_eq!(seen[0], vec![1, 1]);
        assert_eq!(seen[1], vec![1, 1, 0]);
        assert_eq!(seen[2], vec![1, 0, 0]);
        assert_eq!(seen[3], vec![0, 0, 0]);
        assert!(seen.iter().all(|c| c.len() <= 3));
    }

    #[test]
    fn test_empty_prompt_is_seeded_but_not_returned() {
        let vocab = Vocabulary::from_text("ab");
        let mut gen = Generator::new(always_first(4), vocab, Some(0));
        assert_eq!(gen.generate("", 3).unwrap(), "aaa");
        assert_eq!(gen.model().seen.borrow()[0], vec![0]);
    }

    #[test]
    fn test_zero_length_returns_empty() {
        let vocab = Vocabulary::from_text("ab");
        let mut gen = Generator::new(always_first(4), vocab, Some(0));
        assert_eq!(gen.generate("ab", 0).unwrap(), "");
    }

    #[test]
    fn test_unknown_prompt_token_is_an_error() {
        let vocab = Vocabulary::from_text("ab");
        let mut gen = Generator::new(always_first(4), vocab, Some(0));
        assert!(gen.generate("abc", 1).is_err());
    }

    #[test]
    fn test_real_model_with_pinned_head_generates_aaaaa() {
        // Zero the head weights and bias it hard toward id 0 ('a'),
        // so the real Gpt forward pass degenerates to "always a".
        let device = Default::default();
        let mut model = GptConfig::new(2, 1)
            .with_n_embd(8)
            .with_n_head(2)
            .with_n_layer(1)
            .with_block_size(4)
            .with_dropout(0.0)
            .init::<TestBackend>(&device)
            .unwrap();
        model.head.weight = Param::from_tensor(Tensor::zeros([8, 2], &device));
        model.head.bias = Some(Param::from_tensor(Tensor::from_floats([100.0, -100.0], &device)));

        let mut gen = Generator::new(model, Vocabulary::from_text("ab"), Some(5));
        assert_eq!(gen.generate("a", 5).unwrap(), "aaaaa");
    }

    #[test]
    fn test_same_seed_same_text() {
        let device = Default::default();
        let model = GptConfig::new(3, 1)
            .with_n_embd(8)
            .with_n_head(2)
            .with_n_layer(1)
            .with_block_size(4)
            .with_dropout(0.0)
            .init::<TestBackend>(&device)
            .unwrap();
        let vocab = Vocabulary::from_text("abc");

        let mut a = Generator::new(model.clone(), vocab.clone(), Some(99));
        let mut b = Generator::new(model, vocab, Some(99));
        assert_eq!(a.generate("ab", 20).unwrap(), b.generate("ab", 20).unwrap());
    }
}
