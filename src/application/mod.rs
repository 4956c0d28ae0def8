// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for one training run.
// No tensor math, no file formats, only the order of steps.

// The fine-tuning workflow
pub mod train_use_case;
