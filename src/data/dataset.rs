// ============================================================
// Layer 4 — Classification Dataset
// ============================================================
// Turns a loaded collection into samples the model can take:
//
//   text record       → tokenizer (truncating, [CLS]/[SEP] kept)
//   input_ids record  → cut to max_seq_len as given
//
// Every sample is then checked against the model's vocabulary
// and label count. Padding is left to the batcher.

use std::sync::Arc;

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use tokenizers::{Tokenizer, TruncationParams};

use crate::data::loader::DiskDataset;
use crate::domain::error::DatasetLoadError;

/// One tokenized, unpadded classification sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSample {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub label:          usize,
}

/// Bounds a sample must respect to be fed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetLimits {
    pub max_seq_len: usize,
    pub vocab_size:  usize,
    pub num_labels:  usize,
}

pub struct ClassificationDataset {
    samples: Vec<ClassificationSample>,
}

impl ClassificationDataset {
    pub fn new(samples: Vec<ClassificationSample>) -> Self { Self { samples } }

    /// Turn a loaded collection into model-ready samples.
    ///
    /// Raw-text records are encoded with `tokenizer` truncating to
    /// `limits.max_seq_len`, so its special tokens survive; pre-tokenized
    /// records are cut at `limits.max_seq_len`. Token ids outside the
    /// vocabulary and labels outside `0..num_labels` are rejected.
    pub fn build(
        disk:      &DiskDataset,
        tokenizer: &Tokenizer,
        limits:    DatasetLimits,
    ) -> Result<Self, DatasetLoadError> {
        let mut tokenizer = tokenizer.clone();
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: limits.max_seq_len,
                ..Default::default()
            }))
            .map_err(|e| DatasetLoadError::Truncation {
                max_seq_len: limits.max_seq_len,
                message:     e.to_string(),
            })?;

        let mut samples = Vec::with_capacity(disk.len());

        for (index, example) in disk.iter().enumerate() {
            let (input_ids, attention_mask) = match (&example.input_ids, &example.text) {
                (Some(ids), _) => {
                    let mask = example
                        .attention_mask
                        .clone()
                        .unwrap_or_else(|| vec![1; ids.len()]);
                    if mask.len() != ids.len() {
                        return Err(DatasetLoadError::InvalidRecord {
                            index,
                            message: format!(
                                "attention_mask has {} entries for {} input_ids",
                                mask.len(),
                                ids.len()
                            ),
                        });
                    }
                    let keep = ids.len().min(limits.max_seq_len);
                    (ids[..keep].to_vec(), mask[..keep].to_vec())
                }
                (None, Some(text)) => {
                    let enc = tokenizer.encode(text.as_str(), true).map_err(|e| {
                        DatasetLoadError::InvalidRecord {
                            index,
                            message: format!("tokenisation error: {e}"),
                        }
                    })?;
                    (enc.get_ids().to_vec(), enc.get_attention_mask().to_vec())
                }
                (None, None) => {
                    return Err(DatasetLoadError::InvalidRecord {
                        index,
                        message: "record has no input".to_string(),
                    })
                }
            };

            if input_ids.is_empty() {
                return Err(DatasetLoadError::InvalidRecord {
                    index,
                    message: "empty token sequence".to_string(),
                });
            }
            if let Some(&id) = input_ids.iter().find(|&&id| id as usize >= limits.vocab_size) {
                return Err(DatasetLoadError::InvalidRecord {
                    index,
                    message: format!("token id {id} outside vocabulary of {}", limits.vocab_size),
                });
            }
            if example.label >= limits.num_labels {
                return Err(DatasetLoadError::InvalidRecord {
                    index,
                    message: format!(
                        "label {} outside 0..{}",
                        example.label, limits.num_labels
                    ),
                });
            }

            samples.push(ClassificationSample {
                input_ids,
                attention_mask,
                label: example.label,
            });
        }

        Ok(Self::new(samples))
    }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    pub fn into_shared(self) -> Arc<Self> { Arc::new(self) }
}

impl Dataset<ClassificationSample> for ClassificationDataset {
    fn get(&self, index: usize) -> Option<ClassificationSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
