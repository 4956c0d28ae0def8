// ============================================================
// Layer 3 — Labeled Example
// ============================================================
// One record of a serialized dataset collection.
//
// A record is either already tokenized (`input_ids`, with an
// optional `attention_mask`) or carries raw `text` that the
// data layer encodes with the model's tokenizer. The class is
// stored under `label` (`labels` is accepted too). Unknown
// columns are ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_ids: Option<Vec<u32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention_mask: Option<Vec<u32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(alias = "labels")]
    pub label: usize,
}

impl LabeledExample {
    /// True when the record has something a model can consume
    pub fn has_input(&self) -> bool {
        self.input_ids.is_some() || self.text.is_some()
    }
}
