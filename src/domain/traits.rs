// ============================================================
// Layer 3 — Core Traits
// ============================================================

use crate::domain::error::DatasetLoadError;
use crate::domain::example::LabeledExample;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Any component that can load a labeled-example collection.
///
/// Implementations:
///   - JsonlDirSource → a directory of `*.jsonl` files
pub trait ExampleSource {
    /// Load every record of the collection, in storage order.
    fn load_all(&self) -> Result<Vec<LabeledExample>, DatasetLoadError>;
}
