// ============================================================
// Layer 5: ML / Model Layer (Burn)
// ============================================================
// Everything that touches tensors:
//
//   model.rs      decoder-only transformer, both heads
//   trainer.rs    step loop, loss estimation, checkpoints
//   generator.rs  autoregressive sampling
//   classifier.rs one-shot intent prediction
//   sampling.rs   host-side softmax / argmax / categorical draw
//   backend.rs    build-time choice of CPU or GPU backend
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

pub mod backend;

pub mod model;

pub mod sampling;

pub mod trainer;

pub mod generator;

pub mod classifier;
