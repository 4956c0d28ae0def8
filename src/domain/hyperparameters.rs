// ============================================================
// Layer 3 — Hyperparameter Set
// ============================================================
// The fully resolved configuration of one training run.
// Built once by the CLI layer and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub epochs:           usize,
    pub train_batch_size: usize,
    pub eval_batch_size:  usize,
    pub warmup_steps:     usize,
    pub model_name:       String,
    pub learning_rate:    f64,

    pub output_data_dir:  PathBuf,
    pub model_dir:        PathBuf,
    pub n_gpus:           usize,
    pub training_dir:     PathBuf,
    pub test_dir:         PathBuf,

    pub seed:             u64,
    pub weight_decay:     f64,
    pub max_grad_norm:    f64,
    pub logging_steps:    usize,
    /// Optional cap below the model's own maximum sequence length
    pub max_seq_len:      Option<usize>,
    pub freeze_encoder:   bool,
}

impl Hyperparameters {
    /// Training logs go under `<output_data_dir>/logs`
    pub fn logging_dir(&self) -> PathBuf {
        self.output_data_dir.join("logs")
    }

    /// Log every resolved field
    pub fn log_resolved(&self) {
        tracing::info!("args.output_data_dir {}", self.output_data_dir.display());
        tracing::info!("args.model_dir {}",       self.model_dir.display());
        tracing::info!("args.n_gpus {}",          self.n_gpus);
        tracing::info!("args.training_dir {}",    self.training_dir.display());
        tracing::info!("args.test_dir {}",        self.test_dir.display());
        tracing::info!(
            "model={} epochs={} train_batch_size={} eval_batch_size={} warmup_steps={} learning_rate={}",
            self.model_name,
            self.epochs,
            self.train_batch_size,
            self.eval_batch_size,
            self.warmup_steps,
            self.learning_rate,
        );
        tracing::debug!("resolved hyperparameters: {:?}", self);
    }
}
