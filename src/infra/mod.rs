// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem or the network:
//
//   model_hub.rs  — resolves a model identifier (local dir or
//                   Hugging Face Hub) into network + tokenizer
//   tensor_store.rs — reads safetensors files into f32 buffers
//   hf_weights.rs — copies BERT-family checkpoint tensors into
//                   the classification network
//   checkpoint.rs — saves model directories and per-epoch
//                   checkpoints with Burn's CompactRecorder
//   metrics.rs    — epoch metrics CSV in the logging directory
//   results.rs    — eval_results.txt in the output directory

/// Model and tokenizer acquisition
pub mod model_hub;

/// Safetensors reader
pub mod tensor_store;

/// Hugging Face checkpoint import
pub mod hf_weights;

/// Model directories and per-epoch checkpoints
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Final evaluation results file
pub mod results;
