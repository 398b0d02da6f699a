// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// No other layer imports from burn directly — only this one
// and the data pipeline that feeds it.
//
// Why isolate Burn code here?
//   - If Burn's API changes, we only update this layer
//   - The domain layer stays testable without a tensor backend
//   - The network architecture is clearly separated from
//     data loading and application logic
//
// What's in this layer:
//
//   init.rs        — Parameter initialization
//                    Truncated normal weights, constant biases
//
//   layer.rs       — The two layer families
//                    Dense and convolutional layers, each with
//                    optional pruning masks multiplied into the
//                    weight/bias before use
//
//   network.rs     — Network assembly
//                    The builder that stacks layers in order,
//                    validates mask shapes, assigns activations,
//                    and the two ready-made presets
//
//   regularizer.rs — L1/L2 weight penalty configuration
//
//   optimizer.rs   — The five training algorithms
//                    Four from Burn plus a local AdaDelta, all
//                    behind one attachable optimizer with the
//                    staircase learning rate schedule
//
//   model.rs       — The DigitClassifier lifecycle
//                    Loss, accuracy, initialization snapshots,
//                    the train step, and inspection accessors
//
//   trainer.rs     — The epoch loop
//                    Dataloaders, per-epoch evaluation, metrics
//                    logging, and checkpoint saving
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Weight and bias initialization
pub mod init;

/// Dense and convolutional layers with pruning masks
pub mod layer;

/// Network assembly, builder, and presets
pub mod network;

/// L1/L2 weight penalties
pub mod regularizer;

/// Training algorithm selection and schedules
pub mod optimizer;

/// The model lifecycle: loss, accuracy, train steps
pub mod model;

/// Full training loop with evaluation and checkpointing
pub mod trainer;
