// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Concerns shared by the trainer, the use cases and the CLI:
//
//   checkpoint.rs  single-file model artifacts (weights +
//                  vocabulary + labels + config), atomic writes
//
//   cancel.rs      stop flag checked between training steps,
//                  wired to Ctrl-C by the CLI
//
//   metrics.rs     loss estimates appended to a CSV file
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Cooperative cancellation
pub mod cancel;

/// Training metrics CSV logger
pub mod metrics;
