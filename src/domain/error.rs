// ============================================================
// Layer 3 — Error Kinds
// ============================================================
// One enum per failure family of a run. Nothing here is caught
// or retried: every error travels up to main() and ends the
// process with a non-zero exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration could not be assembled from flags + environment.
///
/// A setting that is absent from both its flag and its `SM_*`
/// variable is `MissingConfiguration`. A setting that is present but
/// does not coerce (`--learning_rate abc`, `SM_NUM_GPUS=two`, a zero
/// batch size) is `InvalidValue`. Both stop the run before any data
/// is read.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No flag and no environment fallback
    #[error("missing configuration '{name}': {hint}")]
    MissingConfiguration { name: &'static str, hint: String },

    /// Present, but not a usable number
    #[error("invalid value for '{name}': {value:?} ({reason})")]
    InvalidValue {
        name:   &'static str,
        value:  String,
        reason: String,
    },
}

/// A serialized example collection could not be loaded.
#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("dataset path '{0}' does not exist or is not a directory")]
    NotADirectory(PathBuf),

    #[error("no *.jsonl data files found in '{0}'")]
    NoDataFiles(PathBuf),

    #[error("cannot read '{path}': {source}")]
    Io {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error("malformed record at {path}:{line}: {message}")]
    Malformed {
        path:    PathBuf,
        line:    usize,
        message: String,
    },

    #[error("dataset '{0}' contains no records")]
    Empty(PathBuf),

    #[error("record {index}: {message}")]
    InvalidRecord { index: usize, message: String },

    #[error("tokenizer cannot truncate to {max_seq_len} tokens: {message}")]
    Truncation { max_seq_len: usize, message: String },
}

/// A model identifier could not be turned into a usable model + tokenizer.
#[derive(Debug, Error)]
pub enum ModelResolutionError {
    #[error("cannot fetch '{file}' for model '{model}': {message}")]
    Download {
        model:   String,
        file:    String,
        message: String,
    },

    #[error("invalid model config '{path}': {message}")]
    Config { path: PathBuf, message: String },

    #[error("cannot load tokenizer '{path}': {message}")]
    Tokenizer { path: PathBuf, message: String },

    #[error("cannot load weights '{path}': {message}")]
    Weights { path: PathBuf, message: String },
}

/// Results or model artifacts could not be written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("cannot write '{path}': {source}")]
    Io {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error("cannot save {what} to '{path}': {message}")]
    Save {
        what:    &'static str,
        path:    PathBuf,
        message: String,
    },
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
