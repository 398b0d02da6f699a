// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// This is the heart of the application - pure Rust structs
// and enums that define the core concepts of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - NO tensor math
//   - Only plain Rust structs and enums
//
// Why keep this layer pure?
//   - Easy to unit test (no tensor backend needed)
//   - Easy to understand (no framework noise)
//   - The lifecycle rules are visible without ML details
//
// Think of this layer as the "dictionary" of the system:
// it defines what things ARE, not how they work.
//
// Reference: Rust Book §5 (Structs), §6 (Enums)

// The not-ready / invalid-configuration error taxonomy
pub mod error;

// The closed set of training algorithms and its selector parsing
pub mod algorithm;

// The staircase learning rate schedule
pub mod schedule;

// Layer kinds, activations, mask policy, model presets
pub mod network;
