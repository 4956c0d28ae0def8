// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn training code lives here:
//
//   model.rs     — transformer encoder + classification head
//   trainer.rs   — epoch loop, evaluation pass, model saving
//   metrics.rs   — accuracy / binary precision, recall, F1
//   schedule.rs  — linear warmup + linear decay learning rate
//   params.rs    — trainable-parameter report
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Devlin et al. (2019) BERT

/// Sequence-classification network
pub mod model;

/// Training loop with per-epoch evaluation and checkpoints
pub mod trainer;

/// Metrics callback for evaluation passes
pub mod metrics;

/// Learning-rate schedule
pub mod schedule;

/// Trainable vs. total parameter counts
pub mod params;
