// ============================================================
// Layer 5: Decoder-only Transformer
// ============================================================
// A GPT-style stack shared by both tasks:
//
//   token embedding + learned position embedding
//       │
//       ▼
//   n_layer × Block:
//       x = x + attention(norm1(x))      causal, multi-head
//       x = x + feed_forward(norm2(x))   4× expand, GELU, project
//       │
//       ▼
//   final LayerNorm
//       │
//       ├─ language modeling: Linear → vocab_size logits at every position
//       └─ classification:    last position → Linear → output_size logits
//
// Dropout sits after the attention output projection and after
// the feed-forward projection. Burn's Dropout is a no-op on a
// backend without autodiff, so `model.valid()` and any model
// loaded for inference run deterministically.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Radford et al. (2019) GPT-2
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::{
        activation::{gelu, softmax},
        TensorData,
    },
};

use crate::data::batcher::TokenBatch;
use crate::domain::error::{GptError, GptResult};
use crate::domain::traits::NextTokenModel;

/// Score written into masked (future) attention slots. Far enough
/// below any real score that softmax gives those slots exactly 0.
const MASKED_SCORE: f32 = -1.0e9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    LanguageModel,
    Classification,
}

// ─── GptConfig ────────────────────────────────────────────────────────────────
// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct GptConfig {
    pub vocab_size:  usize,
    /// 1 = next-token logits over the vocabulary; N >= 2 = N-way classification
    pub output_size: usize,
    #[config(default = 64)]
    pub n_embd:      usize,
    #[config(default = 4)]
    pub n_head:      usize,
    #[config(default = 4)]
    pub n_layer:     usize,
    #[config(default = 32)]
    pub block_size:  usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl GptConfig {
    pub fn task(&self) -> Task {
        if self.output_size <= 1 {
            Task::LanguageModel
        } else {
            Task::Classification
        }
    }

    /// Number of logits the head produces per row.
    pub fn head_width(&self) -> usize {
        match self.task() {
            Task::LanguageModel => self.vocab_size,
            Task::Classification => self.output_size,
        }
    }

    pub fn validate(&self) -> GptResult<()> {
        let sizes = [
            ("vocab_size",  self.vocab_size),
            ("output_size", self.output_size),
            ("n_embd",      self.n_embd),
            ("n_head",      self.n_head),
            ("n_layer",     self.n_layer),
            ("block_size",  self.block_size),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(GptError::InvalidConfig(format!("{name} must be positive")));
        }
        if self.n_embd % self.n_head != 0 {
            return Err(GptError::InvalidConfig(format!(
                "n_embd ({}) must be divisible by n_head ({})",
                self.n_embd, self.n_head
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(GptError::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }

    /// True when a parameter set trained under `self` fits a model built from `other`.
    /// Dropout does not change any tensor shape, so it is ignored.
    pub fn same_architecture(&self, other: &GptConfig) -> bool {
        self.vocab_size == other.vocab_size
            && self.head_width() == other.head_width()
            && self.task() == other.task()
            && self.n_embd == other.n_embd
            && self.n_head == other.n_head
            && self.n_layer == other.n_layer
            && self.block_size == other.block_size
    }

    /// Validate, then allocate a freshly initialised model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> GptResult<Gpt<B>> {
        self.validate()?;

        let blocks = (0..self.n_layer).map(|_| self.build_block(device)).collect();
        let model = Gpt {
            token_embedding:    EmbeddingConfig::new(self.vocab_size, self.n_embd).init(device),
            position_embedding: EmbeddingConfig::new(self.block_size, self.n_embd).init(device),
            blocks,
            final_norm:         LayerNormConfig::new(self.n_embd).init(device),
            head:               LinearConfig::new(self.n_embd, self.head_width()).init(device),
            n_embd:             self.n_embd,
            n_head:             self.n_head,
            block_size:         self.block_size,
            vocab_size:         self.vocab_size,
            output_size:        self.output_size,
        };

        tracing::info!(
            "Model ready: {} layers, n_embd={}, {:.3}M parameters",
            self.n_layer,
            self.n_embd,
            model.num_params() as f64 / 1e6,
        );
        Ok(model)
    }

    fn build_block<B: Backend>(&self, device: &B::Device) -> Block<B> {
        let hidden = 4 * self.n_embd;
        Block {
            norm1: LayerNormConfig::new(self.n_embd).init(device),
            attention: CausalSelfAttention {
                query:   LinearConfig::new(self.n_embd, self.n_embd).init(device),
                key:     LinearConfig::new(self.n_embd, self.n_embd).init(device),
                value:   LinearConfig::new(self.n_embd, self.n_embd).init(device),
                proj:    LinearConfig::new(self.n_embd, self.n_embd).init(device),
                dropout: DropoutConfig::new(self.dropout).init(),
                n_head:  self.n_head,
            },
            norm2: LayerNormConfig::new(self.n_embd).init(device),
            feed_forward: FeedForward {
                expand:  LinearConfig::new(self.n_embd, hidden).init(device),
                project: LinearConfig::new(hidden, self.n_embd).init(device),
                dropout: DropoutConfig::new(self.dropout).init(),
            },
        }
    }
}

/// `true` wherever the key position is strictly after the query
/// position, shape [seq_len, seq_len] indexed [query, key].
pub fn causal_mask<B: Backend>(seq_len: usize, device: &B::Device) -> Tensor<B, 2, Bool> {
    let future: Vec<bool> = (0..seq_len)
        .flat_map(|q| (0..seq_len).map(move |k| k > q))
        .collect();
    Tensor::<B, 2, Bool>::from_data(TensorData::new(future, [seq_len, seq_len]), device)
}

// ─── CausalSelfAttention ──────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct CausalSelfAttention<B: Backend> {
    query:   Linear<B>,
    key:     Linear<B>,
    value:   Linear<B>,
    proj:    Linear<B>,
    dropout: Dropout,
    n_head:  usize,
}

impl<B: Backend> CausalSelfAttention<B> {
    /// x: [batch, seq, n_embd] → [batch, seq, n_embd]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, seq, n_embd] = x.dims();
        let head_dim = n_embd / self.n_head;

        let q = self.split_heads(self.query.forward(x.clone()));
        let k = self.split_heads(self.key.forward(x.clone()));
        let v = self.split_heads(self.value.forward(x));

        // [batch, head, seq, seq]
        let scores = q
            .matmul(k.swap_dims(2, 3))
            .div_scalar((head_dim as f64).sqrt());

        let mask = causal_mask::<B>(seq, &scores.device())
            .unsqueeze::<4>()
            .expand([batch, self.n_head, seq, seq]);
        let weights = softmax(scores.mask_fill(mask, MASKED_SCORE), 3);

        let out = weights
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, seq, n_embd]);

        self.dropout.forward(self.proj.forward(out))
    }

    /// [batch, seq, n_embd] → [batch, head, seq, head_dim]
    fn split_heads(&self, t: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch, seq, n_embd] = t.dims();
        t.reshape([batch, seq, self.n_head, n_embd / self.n_head])
            .swap_dims(1, 2)
    }
}

// ─── FeedForward ──────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    expand:  Linear<B>,
    project: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let h = gelu(self.expand.forward(x));
        self.dropout.forward(self.project.forward(h))
    }
}

// ─── Block ────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Block<B: Backend> {
    norm1:        LayerNorm<B>,
    attention:    CausalSelfAttention<B>,
    norm2:        LayerNorm<B>,
    feed_forward: FeedForward<B>,
}

impl<B: Backend> Block<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = x.clone() + self.attention.forward(self.norm1.forward(x));
        x.clone() + self.feed_forward.forward(self.norm2.forward(x))
    }
}

// ─── Gpt ──────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Gpt<B: Backend> {
    token_embedding:    Embedding<B>,
    position_embedding: Embedding<B>,
    blocks:             Vec<Block<B>>,
    final_norm:         LayerNorm<B>,
    pub(crate) head:    Linear<B>,
    n_embd:             usize,
    n_head:             usize,
    block_size:         usize,
    vocab_size:         usize,
    output_size:        usize,
}

impl<B: Backend> Gpt<B> {
    /// The architecture this model was built with.
    pub fn config(&self) -> GptConfig {
        let dropout = self
            .blocks
            .first()
            .map(|b| b.attention.dropout.prob)
            .unwrap_or(0.0);
        GptConfig::new(self.vocab_size, self.output_size)
            .with_n_embd(self.n_embd)
            .with_n_head(self.n_head)
            .with_n_layer(self.blocks.len())
            .with_block_size(self.block_size)
            .with_dropout(dropout)
    }

    pub fn task(&self) -> Task {
        if self.output_size <= 1 {
            Task::LanguageModel
        } else {
            Task::Classification
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn device(&self) -> B::Device {
        self.head.weight.val().device()
    }

    /// Shared trunk: embeddings, blocks, final norm.
    /// input_ids: [batch, seq] with 1 <= seq <= block_size → [batch, seq, n_embd]
    fn trunk(&self, input_ids: Tensor<B, 2, Int>) -> GptResult<Tensor<B, 3>> {
        let [batch, seq] = input_ids.dims();
        if batch == 0 || seq == 0 {
            return Err(GptError::EmptyInput);
        }
        if seq > self.block_size {
            return Err(GptError::SequenceTooLong { len: seq, block_size: self.block_size });
        }

        let tok_emb = self.token_embedding.forward(input_ids);

        let positions = Tensor::<B, 1, Int>::arange(0..seq as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch, seq]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = tok_emb + pos_emb;
        for block in &self.blocks {
            x = block.forward(x);
        }
        Ok(self.final_norm.forward(x))
    }

    /// Next-token logits at every position: [batch, seq] → [batch, seq, vocab_size]
    pub fn forward_sequence(&self, input_ids: Tensor<B, 2, Int>) -> GptResult<Tensor<B, 3>> {
        if self.task() != Task::LanguageModel {
            return Err(GptError::WrongTask("sequence logits need a language-modeling head"));
        }
        Ok(self.head.forward(self.trunk(input_ids)?))
    }

    /// Class logits from the final position: [batch, seq] → [batch, output_size]
    pub fn forward_class(&self, input_ids: Tensor<B, 2, Int>) -> GptResult<Tensor<B, 2>> {
        if self.task() != Task::Classification {
            return Err(GptError::WrongTask("class logits need a classification head"));
        }
        let hidden = self.trunk(input_ids)?;
        let [batch, seq, n_embd] = hidden.dims();
        let last = hidden
            .slice([0..batch, seq - 1..seq, 0..n_embd])
            .reshape([batch, n_embd]);
        Ok(self.head.forward(last))
    }

    /// Logits as 2-D rows lined up with a batch's flattened targets:
    /// [batch * seq, vocab_size] or [batch, output_size].
    pub fn flat_logits(&self, input_ids: Tensor<B, 2, Int>) -> GptResult<Tensor<B, 2>> {
        match self.task() {
            Task::LanguageModel => {
                let logits = self.forward_sequence(input_ids)?;
                let [batch, seq, vocab] = logits.dims();
                Ok(logits.reshape([batch * seq, vocab]))
            }
            Task::Classification => self.forward_class(input_ids),
        }
    }

    /// Mean cross-entropy over every position (language modeling)
    /// or every example (classification).
    pub fn forward_loss(&self, batch: &TokenBatch<B>) -> GptResult<Tensor<B, 1>> {
        let logits = self.flat_logits(batch.inputs.clone())?;
        let [rows, _] = logits.dims();
        let [targets] = batch.targets.dims();
        if rows != targets {
            return Err(GptError::InvalidConfig(format!(
                "batch has {targets} targets for {rows} logit rows"
            )));
        }

        let ce = CrossEntropyLossConfig::new().init(&logits.device());
        Ok(ce.forward(logits, batch.targets.clone()))
    }
}

impl<B: Backend> NextTokenModel for Gpt<B> {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn next_token_logits(&self, context: &[u32]) -> GptResult<Vec<f32>> {
        let ids: Vec<i32> = context.iter().map(|&x| x as i32).collect();
        let input = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &self.device())
            .reshape([1, ids.len()]);

        let logits = self.forward_sequence(input)?;
        let [_, seq, vocab] = logits.dims();
        let last = logits
            .slice([0..1, seq - 1..seq, 0..vocab])
            .reshape([vocab]);
        tensor_to_vec(last)
    }
}

/// Copy a float tensor back to the host.
pub fn tensor_to_vec<B: Backend, const D: usize>(t: Tensor<B, D>) -> GptResult<Vec<f32>> {
    t.into_data()
        .to_vec::<f32>()
        .map_err(|e| GptError::Tensor(format!("{e:?}")))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn lm_config() -> GptConfig {
        GptConfig::new(11, 1)
            .with_n_embd(16)
            .with_n_head(4)
            .with_n_layer(2)
            .with_block_size(8)
            .with_dropout(0.0)
    }

    fn ids(rows: &[&[u32]]) -> Tensor<TestBackend, 2, Int> {
        let seq = rows[0].len();
        let flat: Vec<i32> = rows.iter().flat_map(|r| r.iter().map(|&x| x as i32)).collect();
        Tensor::<TestBackend, 1, Int>::from_ints(flat.as_slice(), &Default::default())
            .reshape([rows.len(), seq])
    }

    #[test]
    fn test_config_rejects_indivisible_heads() {
        let cfg = lm_config().with_n_embd(10);
        assert!(matches!(cfg.validate(), Err(GptError::InvalidConfig(_))));
        assert!(cfg.init::<TestBackend>(&Default::default()).is_err());
    }

    #[test]
    fn test_config_rejects_bad_dropout_and_zero_sizes() {
        assert!(lm_config().with_dropout(1.0).validate().is_err());
        assert!(lm_config().with_n_layer(0).validate().is_err());
        assert!(lm_config().validate().is_ok());
    }

    #[test]
    fn test_lm_logits_shape_and_softmax() {
        let model = lm_config().init::<TestBackend>(&Default::default()).unwrap();
        let logits = model
            .forward_sequence(ids(&[&[1, 2, 3, 4, 5], &[5, 4, 3, 2, 1]]))
            .unwrap();
        assert_eq!(logits.dims(), [2, 5, 11]);

        let sums = tensor_to_vec(softmax(logits, 2).sum_dim(2)).unwrap();
        assert_eq!(sums.len(), 10);
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5, "row sums to {s}");
        }
    }

    #[test]
    fn test_class_logits_shape() {
        let cfg = GptConfig::new(11, 3)
            .with_n_embd(16)
            .with_n_head(2)
            .with_n_layer(1)
            .with_block_size(6)
            .with_dropout(0.0);
        let model = cfg.init::<TestBackend>(&Default::default()).unwrap();
        let logits = model
            .forward_class(ids(&[&[0, 0, 3, 4, 5, 6], &[1, 2, 3, 4, 5, 6]]))
            .unwrap();
        assert_eq!(logits.dims(), [2, 3]);
        assert!(matches!(
            model.forward_sequence(ids(&[&[1, 2]])),
            Err(GptError::WrongTask(_))
        ));
    }

    #[test]
    fn test_future_tokens_do_not_leak() {
        let model = lm_config().init::<TestBackend>(&Default::default()).unwrap();
        let a = tensor_to_vec(model.forward_sequence(ids(&[&[1, 2, 3, 4, 5, 6]])).unwrap()).unwrap();
        // change position 4 only
        let b = tensor_to_vec(model.forward_sequence(ids(&[&[1, 2, 3, 4, 9, 6]])).unwrap()).unwrap();

        let vocab = 11;
        for pos in 0..4 {
            for v in 0..vocab {
                let i = pos * vocab + v;
                assert!((a[i] - b[i]).abs() < 1e-5, "position {pos} changed");
            }
        }
        // ...while position 4 itself does see the change
        let changed = (4 * vocab..5 * vocab).any(|i| (a[i] - b[i]).abs() > 1e-6);
        assert!(changed);
    }

    #[test]
    fn test_causal_mask_layout() {
        let mask = causal_mask::<TestBackend>(3, &Default::default())
            .into_data()
            .to_vec::<bool>()
            .unwrap();
        assert_eq!(
            mask,
            vec![false, true, true, false, false, true, false, false, false]
        );
    }

    #[test]
    fn test_sequence_longer_than_block_is_rejected() {
        let model = lm_config().init::<TestBackend>(&Default::default()).unwrap();
        let too_long: Vec<u32> = (0..9).collect();
        assert!(matches!(
            model.forward_sequence(ids(&[&too_long])),
            Err(GptError::SequenceTooLong { len: 9, block_size: 8 })
        ));
    }

    #[test]
    fn test_config_is_recovered_from_model() {
        let cfg   = lm_config();
        let model = cfg.init::<TestBackend>(&Default::default()).unwrap();
        assert!(model.config().same_architecture(&cfg));
        assert!(!model.config().same_architecture(&cfg.clone().with_n_layer(3)));
    }

    #[test]
    fn test_initial_loss_is_near_uniform() {
        let model = lm_config().init::<TestBackend>(&Default::default()).unwrap();
        let batch = TokenBatch {
            inputs:  ids(&[&[1, 2, 3, 4]]),
            targets: Tensor::<TestBackend, 1, Int>::from_ints([2, 3, 4, 5].as_slice(), &Default::default()),
        };
        let loss = model.forward_loss(&batch).unwrap().into_scalar().elem::<f64>();
        assert!(loss.is_finite());
        // ln(11) ≈ 2.4; a fresh model should be in the same ballpark
        assert!(loss > 1.0 && loss < 5.0, "loss {loss}");
    }
}
