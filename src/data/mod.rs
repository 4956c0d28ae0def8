// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From a channel directory on disk to tensor batches:
//
//   *.jsonl collection
//       │
//       ▼
//   DiskDataset            → read-only records (loader.rs)
//       │
//       ▼
//   ClassificationDataset  → tokenized, truncated, validated;
//       │                    implements Burn's Dataset trait
//       ▼
//   ClassificationBatcher  → padded tensor batches
//       │
//       ▼
//   DataLoader             → feeds the Trainer
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads a serialized example collection from a directory
pub mod loader;

/// Implements Burn's Dataset trait for classification samples
pub mod dataset;

/// Implements Burn's Batcher trait to create padded tensor batches
pub mod batcher;
