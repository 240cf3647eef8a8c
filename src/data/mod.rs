// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything from a corpus file to tensor batches:
//
//   corpus file
//       │
//       ▼
//   loader        → Corpus (raw text, or labeled patterns)
//       │
//       ▼
//   dataset       → vocabulary + encoded ids, split by splitter
//       │
//       ▼
//   batcher       → random RawBatch → TokenBatch<B>
//
// Reference: Burn Book §4 (Datasets and Batching)

/// Plain-text and intents-JSON corpus loaders
pub mod loader;

/// Encoded datasets with train/validation partitions
pub mod dataset;

/// Random batch sampling and tensor conversion
pub mod batcher;

/// Prefix/suffix train/validation split
pub mod splitter;
