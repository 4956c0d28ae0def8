// ============================================================
// Layer 6 — Evaluation Results File
// ============================================================
// Writes <output_data_dir>/eval_results.txt:
//
//   accuracy = 0.5
//   epoch = 1.0
//   f1 = 0.5
//   ...
//
// One `key = value` line per metric, keys in lexicographic
// order (the map is already sorted, so keys never repeat).
// An existing file is truncated. The write is not atomic.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::error::PersistenceError;
use crate::ml::metrics::Metrics;

pub const RESULTS_FILE: &str = "eval_results.txt";

pub fn format_results(result: &Metrics) -> String {
    result
        .iter()
        .map(|(key, value)| format!("{key} = {value:?}\n"))
        .collect()
}

pub fn write_eval_results(dir: &Path, result: &Metrics) -> Result<PathBuf, PersistenceError> {
    let path = dir.join(RESULTS_FILE);
    let body = format_results(result);

    println!("***** Eval results *****");
    for line in body.lines() {
        tracing::info!("  {}", line);
    }

    fs::write(&path, body).map_err(|e| PersistenceError::io(&path, e))?;
    Ok(path)
}
