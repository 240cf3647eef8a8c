// ============================================================
// Layer 2: Application / Use Cases
// ============================================================
// Workflow coordination only: no tensor code, no printing.
// Each use case wires the data, ml and infra layers together
// for one command.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Corpus → trained checkpoint
pub mod train_use_case;

// Checkpoint → generated text
pub mod generate_use_case;

// Checkpoint → predicted label
pub mod classify_use_case;
