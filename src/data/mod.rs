// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// This layer handles everything from the raw MNIST idx files
// all the way to tensor batches.
//
// The pipeline flows in this order:
//
//   idx-ubyte files
//       |
//       v
//   loader            -> reads files, scales pixels to [0, 1]
//       |
//       v
//   DigitDataset      -> implements Burn's Dataset trait
//       |
//       v
//   DigitBatcher      -> stacks samples, one-hot encodes labels
//       |
//       v
//   DataLoader        -> feeds shuffled batches to training
//
// Each module is responsible for exactly one step.
// This makes each step independently testable and replaceable.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Reads the MNIST idx-ubyte files from disk
pub mod loader;

/// Implements Burn's Dataset trait for digit samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
