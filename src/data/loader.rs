// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Loads a serialized labeled-example collection from disk.
//
// On-disk layout of one collection (one channel directory):
//
//   train/
//     part-00000.jsonl   ← one JSON LabeledExample per line
//     part-00001.jsonl
//     ...
//
// Files are read in file-name order, blank lines are skipped.
// Any unreadable file or malformed line fails the whole load;
// the files themselves are never modified.

use std::{
    fs::{self, File},
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::domain::error::DatasetLoadError;
use crate::domain::example::LabeledExample;
use crate::domain::traits::ExampleSource;

/// Extension of the data files inside a collection directory
pub const DATA_FILE_EXTENSION: &str = "jsonl";

/// Reads every `*.jsonl` file of one directory.
pub struct JsonlDirSource {
    dir: PathBuf,
}

impl JsonlDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Data files of the collection, sorted by name
    fn data_files(&self) -> Result<Vec<PathBuf>, DatasetLoadError> {
        if !self.dir.is_dir() {
            return Err(DatasetLoadError::NotADirectory(self.dir.clone()));
        }

        let entries = fs::read_dir(&self.dir).map_err(|source| DatasetLoadError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DatasetLoadError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(DATA_FILE_EXTENSION)
            {
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(DatasetLoadError::NoDataFiles(self.dir.clone()));
        }
        files.sort();
        Ok(files)
    }
}

impl ExampleSource for JsonlDirSource {
    fn load_all(&self) -> Result<Vec<LabeledExample>, DatasetLoadError> {
        let mut examples = Vec::new();

        for path in self.data_files()? {
            let file = File::open(&path).map_err(|source| DatasetLoadError::Io {
                path: path.clone(),
                source,
            })?;

            for (idx, line) in BufReader::new(file).lines().enumerate() {
                let line = line.map_err(|source| DatasetLoadError::Io {
                    path: path.clone(),
                    source,
                })?;
                if line.trim().is_empty() {
                    continue;
                }

                let example: LabeledExample =
                    serde_json::from_str(&line).map_err(|e| DatasetLoadError::Malformed {
                        path:    path.clone(),
                        line:    idx + 1,
                        message: e.to_string(),
                    })?;

                if !example.has_input() {
                    return Err(DatasetLoadError::Malformed {
                        path:    path.clone(),
                        line:    idx + 1,
                        message: "record has neither `input_ids` nor `text`".to_string(),
                    });
                }
                examples.push(example);
            }

            tracing::debug!("Read data file '{}'", path.display());
        }

        Ok(examples)
    }
}

/// An in-memory, read-only handle to one loaded collection.
#[derive(Debug, Clone)]
pub struct DiskDataset {
    path:     PathBuf,
    examples: Vec<LabeledExample>,
}

impl DiskDataset {
    /// Load a collection previously written to `path`.
    /// An empty collection is an error.
    pub fn load_from_disk(path: impl AsRef<Path>) -> Result<Self, DatasetLoadError> {
        let path     = path.as_ref().to_path_buf();
        let examples = JsonlDirSource::new(&path).load_all()?;
        if examples.is_empty() {
            return Err(DatasetLoadError::Empty(path));
        }
        Ok(Self { path, examples })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LabeledExample> {
        self.examples.iter()
    }
}
