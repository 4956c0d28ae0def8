// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Writes model directories with Burn's CompactRecorder:
//
//   <dir>/
//     model.mpk.gz     ← weights (MessagePack, gzip, half precision)
//     config.json      ← architecture, resolvable by the model hub
//     tokenizer.json   ← the tokenizer the model was trained with
//
// Per-epoch checkpoints add the trainer state:
//
//   <output_dir>/checkpoint-<global_step>/
//     ...same files...
//     trainer_state.json
//
// Checkpoints are write-only; resuming from them is not supported.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::Serialize;
use tokenizers::Tokenizer;

use crate::domain::error::PersistenceError;
use crate::infra::model_hub::{PretrainedConfig, CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_STEM};
use crate::ml::model::TextClassifier;

pub const TRAINER_STATE_FILE: &str = "trainer_state.json";

/// Serialize `value` as pretty JSON to `path`, replacing any existing file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| PersistenceError::Save {
        what:    "json",
        path:    path.to_path_buf(),
        message: e.to_string(),
    })?;
    fs::write(path, json).map_err(|e| PersistenceError::io(path, e))
}

/// Save weights, config and tokenizer into `dir` (created if needed).
pub fn save_pretrained<B: Backend>(
    dir:       &Path,
    model:     &TextClassifier<B>,
    config:    &PretrainedConfig,
    tokenizer: &Tokenizer,
) -> Result<(), PersistenceError> {
    fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;

    let weights = dir.join(WEIGHTS_STEM);
    CompactRecorder::new()
        .record(model.clone().into_record(), weights.clone())
        .map_err(|e| PersistenceError::Save {
            what:    "model weights",
            path:    weights,
            message: format!("{e:?}"),
        })?;

    write_json(&dir.join(CONFIG_FILE), &config.for_saving())?;

    let tok_path = dir.join(TOKENIZER_FILE);
    tokenizer
        .save(&tok_path, false)
        .map_err(|e| PersistenceError::Save {
            what:    "tokenizer",
            path:    tok_path,
            message: e.to_string(),
        })?;

    tracing::debug!("Saved model to '{}'", dir.display());
    Ok(())
}

/// Manages the per-epoch checkpoint directories of one run.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn checkpoint_dir(&self, global_step: usize) -> PathBuf {
        self.dir.join(format!("checkpoint-{global_step}"))
    }

    /// Save a full checkpoint plus the serialized trainer state.
    pub fn save_checkpoint<B: Backend, S: Serialize>(
        &self,
        model:       &TextClassifier<B>,
        config:      &PretrainedConfig,
        tokenizer:   &Tokenizer,
        global_step: usize,
        state:       &S,
    ) -> Result<PathBuf, PersistenceError> {
        let dir = self.checkpoint_dir(global_step);
        save_pretrained(&dir, model, config, tokenizer)?;
        write_json(&dir.join(TRAINER_STATE_FILE), state)?;
        Ok(dir)
    }
}
