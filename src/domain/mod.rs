// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Pure Rust structs and traits that define the core concepts
// of the translation system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// Token <-> index mapping with reserved symbols
pub mod vocabulary;

// Parallel sentence pairs, raw and encoded
pub mod sentence_pair;

// Core abstractions (traits) that other layers implement
pub mod traits;
