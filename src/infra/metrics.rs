// ============================================================
// Layer 6 — Epoch Metrics Logger
// ============================================================
// Appends one CSV row per epoch to <logging_dir>/metrics.csv:
//
//   epoch,train_loss,eval_loss,accuracy,f1,precision,recall
//   1,0.693100,0.688400,0.540000,0.612000,0.550000,0.690000
//
// The header is written only when the file is new, so several
// runs against the same logging directory accumulate rows.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

use crate::domain::error::PersistenceError;
use crate::ml::metrics::Metrics;

pub const METRICS_CSV: &str = "metrics.csv";

/// One row of the epoch log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    pub train_loss: f64,
    pub eval_loss:  f64,
    pub accuracy:   f64,
    pub f1:         f64,
    pub precision:  f64,
    pub recall:     f64,
}

impl EpochMetrics {
    /// Pick the logged columns out of an evaluation result; absent keys are NaN
    pub fn from_eval(epoch: usize, train_loss: f64, eval: &Metrics) -> Self {
        let get = |k: &str| eval.get(k).copied().unwrap_or(f64::NAN);
        Self {
            epoch,
            train_loss,
            eval_loss: get("loss"),
            accuracy:  get("accuracy"),
            f1:        get("f1"),
            precision: get("precision"),
            recall:    get("recall"),
        }
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| PersistenceError::io(&dir, e))?;

        let csv_path = dir.join(METRICS_CSV);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path).map_err(|e| PersistenceError::io(&csv_path, e))?;
            writeln!(f, "epoch,train_loss,eval_loss,accuracy,f1,precision,recall")
                .map_err(|e| PersistenceError::io(&csv_path, e))?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<(), PersistenceError> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .map_err(|e| PersistenceError::io(&self.csv_path, e))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.eval_loss, m.accuracy, m.f1, m.precision, m.recall,
        )
        .map_err(|e| PersistenceError::io(&self.csv_path, e))?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, eval_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.eval_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
