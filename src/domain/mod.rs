// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe a training run:
//   - the resolved hyperparameter set
//   - one labeled example as stored on disk
//   - the error kinds a run can fail with
//   - the ExampleSource abstraction
//
// No Burn types and no file I/O live here.

pub mod error;

pub mod example;

pub mod hyperparameters;

pub mod traits;
