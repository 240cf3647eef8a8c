// ============================================================
// Layer 6: Checkpoint Store
// ============================================================
// One file holds everything inference needs: the parameters,
// the vocabulary, the labels (classification only), the
// architecture config and the compute target it was saved on.
//
// File layout (little-endian):
//   [0..8]    magic        b"TGPTCKPT"
//   [8..12]   meta_len     u32
//   [..]      meta         JSON CheckpointMeta
//   [..+8]    weights_len  u64
//   [..]      weights      Burn NamedMpk record bytes, full precision
//
// The file is written to a temporary sibling and renamed into
// place, so a reader never sees half a checkpoint. Loading is
// all-or-nothing: the model is rebuilt from the embedded config
// and only returned once the weights are in.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::domain::error::{GptError, GptResult};
use crate::domain::vocab::{LabelSet, Vocabulary};
use crate::ml::classifier::Classifier;
use crate::ml::generator::Generator;
use crate::ml::model::{Gpt, GptConfig, Task};

const MAGIC: &[u8; 8] = b"TGPTCKPT";

type WeightsRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

/// Everything in a checkpoint except the weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub config:         GptConfig,
    pub vocabulary:     Vocabulary,
    pub labels:         Option<LabelSet>,
    /// Informational: the device class the model was trained on
    pub compute_target: String,
    /// Optimizer steps applied when this was saved
    pub step:           Option<usize>,
}

/// A fully loaded checkpoint.
pub struct Checkpoint<B: Backend> {
    pub model: Gpt<B>,
    pub meta:  CheckpointMeta,
}

impl<B: Backend> Checkpoint<B> {
    pub fn into_generator(self, seed: Option<u64>) -> GptResult<Generator<Gpt<B>>> {
        if self.model.task() != Task::LanguageModel {
            return Err(GptError::WrongTask("generation needs a language-model checkpoint"));
        }
        Ok(Generator::new(self.model, self.meta.vocabulary, seed))
    }

    pub fn into_classifier(self) -> GptResult<Classifier<B>> {
        let labels = self
            .meta
            .labels
            .ok_or(GptError::WrongTask("prediction needs a classification checkpoint"))?;
        Classifier::new(self.model, self.meta.vocabulary, labels)
    }
}

/// `dir/name.ext` → `dir/name_<step>.ext`
pub fn step_path(base: &Path, step: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "checkpoint".to_string());
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{step}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{step}"),
    };
    base.with_file_name(name)
}

/// Write model + meta atomically to `path`.
pub fn save_checkpoint<B: Backend>(path: &Path, model: &Gpt<B>, meta: &CheckpointMeta) -> GptResult<()> {
    if !model.config().same_architecture(&meta.config) {
        return Err(GptError::ConfigMismatch(
            "model does not match the config being saved with it".into(),
        ));
    }
    if let Some(reason) = meta_inconsistency(meta) {
        return Err(GptError::ConfigMismatch(reason));
    }

    let weights = <WeightsRecorder as Recorder<B>>::record(
        &WeightsRecorder::default(),
        model.clone().into_record(),
        (),
    )
    .map_err(|e| GptError::Tensor(format!("cannot serialise weights: {e:?}")))?;
    let meta_json = serde_json::to_vec(meta)?;

    let mut buf = Vec::with_capacity(8 + 4 + meta_json.len() + 8 + weights.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&(meta_json.len() as u32).to_le_bytes());
    buf.extend_from_slice(&meta_json);
    buf.extend_from_slice(&(weights.len() as u64).to_le_bytes());
    buf.extend_from_slice(&weights);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &buf)?;
    fs::rename(&tmp, path)?;

    tracing::debug!("Saved checkpoint '{}' ({} bytes)", path.display(), buf.len());
    Ok(())
}

/// Rebuild the model from the embedded config and load its weights.
pub fn load_checkpoint<B: Backend>(path: &Path, device: &B::Device) -> GptResult<Checkpoint<B>> {
    let (meta, weights) = read_artifact(path)?;
    let model = meta.config.init::<B>(device)?;
    let model = load_weights(path, model, weights, device)?;

    tracing::info!(
        "Loaded checkpoint '{}' (vocab={}, saved on {})",
        path.display(),
        meta.vocabulary.len(),
        meta.compute_target,
    );
    Ok(Checkpoint { model, meta })
}

/// Load the weights stored at `path` into a caller-built model.
/// Fails with `ConfigMismatch` if the model's architecture differs
/// from the one the checkpoint was trained with.
pub fn load_into<B: Backend>(path: &Path, model: Gpt<B>, device: &B::Device) -> GptResult<Gpt<B>> {
    let (meta, weights) = read_artifact(path)?;
    let have = model.config();
    if !have.same_architecture(&meta.config) {
        return Err(GptError::ConfigMismatch(format!(
            "checkpoint '{}' was trained with {}, model was built with {}",
            path.display(),
            meta.config,
            have,
        )));
    }
    load_weights(path, model, weights, device)
}

fn load_weights<B: Backend>(
    path:    &Path,
    model:   Gpt<B>,
    weights: Vec<u8>,
    device:  &B::Device,
) -> GptResult<Gpt<B>> {
    let expected = model.num_params();
    let record = <WeightsRecorder as Recorder<B>>::load(&WeightsRecorder::default(), weights, device)
        .map_err(|e| corrupt(path, format!("cannot decode weights: {e:?}")))?;
    let model = model.load_record(record);

    // A record for a different architecture still decodes; catch it here
    // instead of letting a shape error surface deep in a forward pass.
    if model.num_params() != expected {
        return Err(corrupt(
            path,
            format!("weights hold {} parameters, config expects {}", model.num_params(), expected),
        ));
    }
    Ok(model)
}

fn read_artifact(path: &Path) -> GptResult<(CheckpointMeta, Vec<u8>)> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(GptError::CheckpointMissing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut rest = bytes.as_slice();
    let magic = take(&mut rest, 8).ok_or_else(|| corrupt(path, "truncated header"))?;
    if magic != MAGIC {
        return Err(corrupt(path, "not a tinygpt checkpoint"));
    }

    let meta_len = take(&mut rest, 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
        .ok_or_else(|| corrupt(path, "truncated header"))?;
    let meta_json = take(&mut rest, meta_len).ok_or_else(|| corrupt(path, "truncated metadata"))?;
    let meta: CheckpointMeta = serde_json::from_slice(meta_json)
        .map_err(|e| corrupt(path, format!("bad metadata: {e}")))?;

    let weights_len = take(&mut rest, 8)
        .map(|b| u64::from_le_bytes(b.try_into().unwrap_or([0; 8])) as usize)
        .ok_or_else(|| corrupt(path, "truncated weights header"))?;
    if rest.len() != weights_len {
        return Err(corrupt(
            path,
            format!("expected {weights_len} weight bytes, found {}", rest.len()),
        ));
    }

    meta.config.validate()?;
    if let Some(reason) = meta_inconsistency(&meta) {
        return Err(corrupt(path, reason));
    }
    Ok((meta, rest.to_vec()))
}

/// The vocabulary and labels must fit the config they ship with.
fn meta_inconsistency(meta: &CheckpointMeta) -> Option<String> {
    let config = &meta.config;
    if meta.vocabulary.len() != config.vocab_size {
        return Some(format!(
            "vocabulary has {} tokens, config expects {}",
            meta.vocabulary.len(),
            config.vocab_size
        ));
    }
    match (config.task(), &meta.labels) {
        (Task::Classification, Some(labels)) if labels.len() != config.output_size => Some(format!(
            "label set has {} labels, config expects {}",
            labels.len(),
            config.output_size
        )),
        (Task::Classification, None) => Some("classification config without labels".into()),
        (Task::LanguageModel, Some(_)) => Some("language-model config with labels".into()),
        _ => None,
    }
}

/// Split `n` bytes off the front of `buf`.
fn take<'a>(buf: &mut &'a [u8], n: usize) -> Option<&'a [u8]> {
    if buf.len() < n {
        return None;
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Some(head)
}

fn corrupt(path: &Path, reason: impl Into<String>) -> GptError {
    GptError::CheckpointCorrupt {
        path:   path.to_path_buf(),
        reason: reason.into(),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::tensor_to_vec;
    use tempfile::tempdir;

    type TestBackend = burn::backend::NdArray;

    fn lm() -> (Gpt<TestBackend>, CheckpointMeta) {
        let vocab  = Vocabulary::from_text("abcdef");
        let config = GptConfig::new(vocab.len(), 1)
            .with_n_embd(8)
            .with_n_head(2)
            .with_n_layer(2)
            .with_block_size(6)
            .with_dropout(0.0);
        let model = config.init::<TestBackend>(&Default::default()).unwrap();
        let meta  = CheckpointMeta {
            config,
            vocabulary:     vocab,
            labels:         None,
            compute_target: "cpu".into(),
            step:           Some(12),
        };
        (model, meta)
    }

    fn logits(model: &Gpt<TestBackend>) -> Vec<f32> {
        let input = Tensor::<TestBackend, 1, Int>::from_ints([0, 3, 1, 5].as_slice(), &Default::default())
            .reshape([1, 4]);
        tensor_to_vec(model.forward_sequence(input).unwrap()).unwrap()
    }

    #[test]
    fn test_step_path() {
        assert_eq!(step_path(Path::new("models/run.ckpt"), 500), PathBuf::from("models/run_500.ckpt"));
        assert_eq!(step_path(Path::new("run"), 3), PathBuf::from("run_3"));
    }

    #[test]
    fn test_save_then_load_is_bit_identical() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("nested/model.ckpt");
        let (model, meta) = lm();
        save_checkpoint(&path, &model, &meta).unwrap();

        let loaded = load_checkpoint::<TestBackend>(&path, &Default::default()).unwrap();
        assert_eq!(logits(&model), logits(&loaded.model));
        assert_eq!(loaded.meta.vocabulary, meta.vocabulary);
        assert_eq!(loaded.meta.step, Some(12));
        assert!(loaded.meta.config.same_architecture(&meta.config));

        // and the same seed generates the same text from both
        let mut a = Generator::new(model, meta.vocabulary.clone(), Some(4));
        let mut b = loaded.into_generator(Some(4)).unwrap();
        assert_eq!(a.generate("ab", 16).unwrap(), b.generate("ab", 16).unwrap());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_checkpoint::<TestBackend>(&dir.path().join("nope.ckpt"), &Default::default());
        assert!(matches!(err, Err(GptError::CheckpointMissing(_))));
    }

    #[test]
    fn test_corrupt_files() {
        let dir = tempdir().unwrap();
        let (model, meta) = lm();
        let good = dir.path().join("good.ckpt");
        save_checkpoint(&good, &model, &meta).unwrap();
        let bytes = fs::read(&good).unwrap();

        // wrong magic
        let bad = dir.path().join("magic.ckpt");
        fs::write(&bad, b"NOTACKPT....").unwrap();
        assert!(matches!(
            load_checkpoint::<TestBackend>(&bad, &Default::default()),
            Err(GptError::CheckpointCorrupt { .. })
        ));

        // truncated weights
        let bad = dir.path().join("short.ckpt");
        fs::write(&bad, &bytes[..bytes.len() - 10]).unwrap();
        assert!(matches!(
            load_checkpoint::<TestBackend>(&bad, &Default::default()),
            Err(GptError::CheckpointCorrupt { .. })
        ));
    }

    #[test]
    fn test_metadata_must_agree_with_config() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("model.ckpt");
        let (model, meta) = lm();

        let short_vocab = CheckpointMeta { vocabulary: Vocabulary::from_text("ab"), ..meta.clone() };
        assert!(matches!(
            save_checkpoint(&path, &model, &short_vocab),
            Err(GptError::ConfigMismatch(_))
        ));

        // rewrite the metadata of a good file behind the store's back
        save_checkpoint(&path, &model, &meta).unwrap();
        let bytes    = fs::read(&path).unwrap();
        let meta_len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let weights  = &bytes[12 + meta_len..];
        let json     = serde_json::to_vec(&short_vocab).unwrap();

        let mut forged = Vec::new();
        forged.extend_from_slice(MAGIC);
        forged.extend_from_slice(&(json.len() as u32).to_le_bytes());
        forged.extend_from_slice(&json);
        forged.extend_from_slice(weights);
        fs::write(&path, forged).unwrap();

        assert!(matches!(
            load_checkpoint::<TestBackend>(&path, &Default::default()),
            Err(GptError::CheckpointCorrupt { .. })
        ));
    }

    #[test]
    fn test_mismatched_config_fails_loudly() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("model.ckpt");
        let (model, meta) = lm();
        save_checkpoint(&path, &model, &meta).unwrap();

        let other = meta
            .config
            .clone()
            .with_n_layer(3)
            .init::<TestBackend>(&Default::default())
            .unwrap();
        assert!(matches!(
            load_into(&path, other, &Default::default()),
            Err(GptError::ConfigMismatch(_))
        ));

        // a model of the right shape accepts the weights
        let same = meta.config.init::<TestBackend>(&Default::default()).unwrap();
        let same = load_into(&path, same, &Default::default()).unwrap();
        assert_eq!(logits(&same), logits(&model));
    }

    #[test]
    fn test_language_model_checkpoint_cannot_classify() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("model.ckpt");
        let (model, meta) = lm();
        save_checkpoint(&path, &model, &meta).unwrap();
        let loaded = load_checkpoint::<TestBackend>(&path, &Default::default()).unwrap();
        assert!(matches!(loaded.into_classifier(), Err(GptError::WrongTask(_))));
    }
}
