// ============================================================
// prunenet — small digit classifiers with pruning masks
// ============================================================
// The crate is organised in layers, outermost first:
//
//   cli          — argument parsing and dispatch      (Layer 1)
//   application  — train/eval workflow orchestration  (Layer 2)
//   domain       — engine-free vocabulary and errors  (Layer 3)
//   data         — idx files to tensor batches        (Layer 4)
//   ml           — everything Burn: layers, networks,
//                  optimizers, the training loop      (Layer 5)
//   infra        — checkpoints and metrics logging    (Layer 6)

#![recursion_limit = "256"]

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod infra;
pub mod ml;
