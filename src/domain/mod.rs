// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain Rust types and traits shared by every other layer:
// error kinds, the vocabulary, corpus shapes, and the seams
// (traits) that loaders and models implement.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only plain structs, enums and traits

// Declared error kinds for every violated contract
pub mod error;

// Token <-> id and label <-> id mappings
pub mod vocab;

// Raw corpus shapes handed over by loaders
pub mod corpus;

// Core abstractions (traits) that other layers implement
pub mod traits;
