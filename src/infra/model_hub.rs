// ============================================================
// Layer 6 — Model Hub
// ============================================================
// Resolves a model identifier to a classification network and
// its tokenizer.
//
// Resolution order:
//   1. the identifier names an existing local directory → use it
//   2. otherwise fetch it from the Hugging Face Hub (hf-hub sync
//      API; files land in the local hub cache, HF_TOKEN is used
//      for gated repos)
//
// A model directory contains:
//   config.json     ← Hugging Face style architecture config
//   tokenizer.json  ← tokenizers JSON
//   weights, first match wins:
//     model.mpk.gz                  Burn compact record (our own saves)
//     model.safetensors             Hugging Face checkpoint
//     model.safetensors.index.json  sharded Hugging Face checkpoint
//
// A hub model must carry weights. A local directory without any
// is a scratch model and starts from fresh initialisation.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use hf_hub::api::sync::ApiBuilder;
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::data::dataset::DatasetLimits;
use crate::domain::error::ModelResolutionError;
use crate::infra::hf_weights::import_pretrained;
use crate::infra::tensor_store::{shard_names, TensorStore, SAFETENSORS_FILE, SAFETENSORS_INDEX_FILE};
use crate::ml::model::{TextClassifier, TextClassifierConfig};

pub const CONFIG_FILE:    &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const WEIGHTS_FILE:   &str = "model.mpk.gz";
/// Path handed to the recorder, which appends `.mpk.gz` itself
pub const WEIGHTS_STEM:   &str = "model";

pub const ARCHITECTURE: &str = "TextClassifier";

fn default_hidden_size() -> usize { 768 }
fn default_num_attention_heads() -> usize { 12 }
fn default_num_hidden_layers() -> usize { 12 }
fn default_intermediate_size() -> usize { 3072 }
fn default_max_position_embeddings() -> usize { 512 }
fn default_hidden_dropout_prob() -> f64 { 0.1 }
fn default_layer_norm_eps() -> f64 { 1e-12 }

/// Model types whose position table reserves `pad_token_id + 1` leading rows
const OFFSET_POSITION_MODELS: &[&str] = &["roberta", "xlm-roberta", "camembert"];

/// Architecture config in the Hugging Face `config.json` layout.
/// DistilBERT's field names (`dim`, `n_heads`, ...) are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PretrainedConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub architectures: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,

    pub vocab_size: usize,

    #[serde(default = "default_hidden_size", alias = "dim")]
    pub hidden_size: usize,

    #[serde(default = "default_num_attention_heads", alias = "n_heads")]
    pub num_attention_heads: usize,

    #[serde(default = "default_num_hidden_layers", alias = "n_layers")]
    pub num_hidden_layers: usize,

    #[serde(default = "default_intermediate_size", alias = "hidden_dim")]
    pub intermediate_size: usize,

    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,

    #[serde(default = "default_hidden_dropout_prob", alias = "dropout")]
    pub hidden_dropout_prob: f64,

    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_labels: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id2label: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pad_token_id: Option<u32>,
}

impl PretrainedConfig {
    /// `num_labels`, else the size of `id2label`, else binary
    pub fn num_labels(&self) -> usize {
        self.num_labels
            .or_else(|| self.id2label.as_ref().map(BTreeMap::len))
            .unwrap_or(2)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.vocab_size == 0 {
            return Err("vocab_size must be positive".into());
        }
        if self.hidden_size == 0 || self.num_attention_heads == 0 {
            return Err("hidden_size and num_attention_heads must be positive".into());
        }
        if self.hidden_size % self.num_attention_heads != 0 {
            return Err(format!(
                "hidden_size {} is not divisible by num_attention_heads {}",
                self.hidden_size, self.num_attention_heads
            ));
        }
        if self.max_position_embeddings <= self.position_offset() {
            return Err(format!(
                "max_position_embeddings {} leaves no usable positions after offset {}",
                self.max_position_embeddings,
                self.position_offset()
            ));
        }
        if self.num_labels() < 2 {
            return Err(format!("need at least 2 labels, got {}", self.num_labels()));
        }
        if !(0.0..1.0).contains(&self.hidden_dropout_prob) {
            return Err(format!("hidden_dropout_prob {} outside [0, 1)", self.hidden_dropout_prob));
        }
        Ok(())
    }

    fn is_model_type(&self, types: &[&str]) -> bool {
        self.model_type.as_deref().is_some_and(|t| types.contains(&t))
    }

    /// Leading rows of the position table that no token uses
    pub fn position_offset(&self) -> usize {
        if self.is_model_type(OFFSET_POSITION_MODELS) {
            self.pad_token_id.unwrap_or(1) as usize + 1
        } else {
            0
        }
    }

    /// Longest sequence the position table can hold
    pub fn max_seq_len(&self) -> usize {
        self.max_position_embeddings.saturating_sub(self.position_offset())
    }

    pub fn to_model_config(&self) -> TextClassifierConfig {
        TextClassifierConfig::new(
            self.vocab_size,
            self.max_seq_len(),
            self.hidden_size,
            self.num_attention_heads,
            self.num_hidden_layers,
            self.intermediate_size,
            self.hidden_dropout_prob,
            self.num_labels(),
        )
        .with_layer_norm_eps(self.layer_norm_eps)
        .with_pooler_tanh(!self.is_model_type(&["distilbert"]))
    }

    /// The config as written next to a fine-tuned model
    pub fn for_saving(&self) -> Self {
        Self {
            architectures: vec![ARCHITECTURE.to_string()],
            num_labels:    Some(self.num_labels()),
            ..self.clone()
        }
    }
}

/// Where a model's weights live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightFiles {
    /// Burn compact record
    Record(PathBuf),
    /// Hugging Face safetensors, one file or every shard
    Safetensors(Vec<PathBuf>),
}

/// Local paths of one resolved model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config:    PathBuf,
    pub tokenizer: PathBuf,
    /// `None` only for a local scratch directory
    pub weights:   Option<WeightFiles>,
}

impl ModelFiles {
    pub fn from_dir(dir: &Path) -> Result<Self, ModelResolutionError> {
        let config = dir.join(CONFIG_FILE);
        if !config.is_file() {
            return Err(ModelResolutionError::Config {
                path:    config,
                message: "file not found".to_string(),
            });
        }
        let tokenizer = dir.join(TOKENIZER_FILE);
        if !tokenizer.is_file() {
            return Err(ModelResolutionError::Tokenizer {
                path:    tokenizer,
                message: "file not found".to_string(),
            });
        }
        let weights = Self::local_weights(dir)?;
        Ok(Self { config, tokenizer, weights })
    }

    fn local_weights(dir: &Path) -> Result<Option<WeightFiles>, ModelResolutionError> {
        let record = dir.join(WEIGHTS_FILE);
        if record.is_file() {
            return Ok(Some(WeightFiles::Record(record)));
        }
        let single = dir.join(SAFETENSORS_FILE);
        if single.is_file() {
            return Ok(Some(WeightFiles::Safetensors(vec![single])));
        }
        let index = dir.join(SAFETENSORS_INDEX_FILE);
        if index.is_file() {
            let shards = shard_names(&index)?.into_iter().map(|name| dir.join(name)).collect();
            return Ok(Some(WeightFiles::Safetensors(shards)));
        }
        Ok(None)
    }

    /// Build the network on `device` and pair it with its tokenizer.
    pub fn load<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<PretrainedModel<B>, ModelResolutionError> {
        let text = fs::read_to_string(&self.config).map_err(|e| ModelResolutionError::Config {
            path:    self.config.clone(),
            message: e.to_string(),
        })?;
        let config: PretrainedConfig =
            serde_json::from_str(&text).map_err(|e| ModelResolutionError::Config {
                path:    self.config.clone(),
                message: e.to_string(),
            })?;
        config
            .validate()
            .map_err(|message| ModelResolutionError::Config { path: self.config.clone(), message })?;

        let tokenizer = Tokenizer::from_file(&self.tokenizer).map_err(|e| {
            ModelResolutionError::Tokenizer {
                path:    self.tokenizer.clone(),
                message: e.to_string(),
            }
        })?;
        let tok_vocab = tokenizer.get_vocab_size(true);
        if tok_vocab > config.vocab_size {
            tracing::warn!(
                "Tokenizer vocabulary ({}) is larger than the model's ({})",
                tok_vocab,
                config.vocab_size
            );
        }

        let mut model: TextClassifier<B> = config.to_model_config().init(device);
        match &self.weights {
            Some(WeightFiles::Record(path)) => {
                let record = CompactRecorder::new()
                    .load(path.with_file_name(WEIGHTS_STEM), device)
                    .map_err(|e| ModelResolutionError::Weights {
                        path:    path.clone(),
                        message: format!("{e:?}"),
                    })?;
                model = model.load_record(record);
                tracing::info!("Loaded pretrained weights from '{}'", path.display());
            }
            Some(WeightFiles::Safetensors(paths)) => {
                let store = TensorStore::load(paths)?;
                let first = paths.first().cloned().unwrap_or_default();
                let imported = import_pretrained(model, &store, config.position_offset(), device)
                    .map_err(|message| ModelResolutionError::Weights { path: first.clone(), message })?;
                tracing::info!(
                    "Loaded {} tensors ({:?} layout) from '{}'",
                    store.len(),
                    imported.layout,
                    first.display()
                );
                for head in &imported.fresh {
                    tracing::warn!("No pretrained '{}' weights; it starts freshly initialised", head);
                }
                model = imported.model;
            }
            None => tracing::warn!(
                "No weights next to '{}'; starting from freshly initialised weights",
                self.config.display()
            ),
        }

        Ok(PretrainedModel { model, config, tokenizer })
    }
}

/// A classification network and the tokenizer it was trained with.
pub struct PretrainedModel<B: Backend> {
    pub model:     TextClassifier<B>,
    pub config:    PretrainedConfig,
    pub tokenizer: Tokenizer,
}

impl<B: Backend> PretrainedModel<B> {
    /// Padding token: config, then tokenizer padding, then common pad tokens, then 0
    pub fn pad_id(&self) -> u32 {
        self.config
            .pad_token_id
            .or_else(|| self.tokenizer.get_padding().map(|p| p.pad_id))
            .or_else(|| self.tokenizer.token_to_id("[PAD]"))
            .or_else(|| self.tokenizer.token_to_id("<pad>"))
            .unwrap_or(0)
    }

    /// Sample bounds for this model, optionally capping the sequence length
    pub fn dataset_limits(&self, max_seq_len: Option<usize>) -> DatasetLimits {
        let model_max = self.config.max_seq_len();
        DatasetLimits {
            max_seq_len: max_seq_len.map_or(model_max, |cap| cap.min(model_max)),
            vocab_size:  self.config.vocab_size,
            num_labels:  self.config.num_labels(),
        }
    }
}

/// Resolves identifiers locally or through the Hugging Face Hub.
pub struct ModelHub {
    token: Option<String>,
}

impl ModelHub {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// Picks up `HF_TOKEN` when set
    pub fn from_env() -> Self {
        Self::new(std::env::var("HF_TOKEN").ok().filter(|t| !t.is_empty()))
    }

    pub fn resolve(&self, identifier: &str) -> Result<ModelFiles, ModelResolutionError> {
        let local = Path::new(identifier);
        if local.is_dir() {
            tracing::info!("Using local model directory '{}'", local.display());
            return ModelFiles::from_dir(local);
        }
        self.download(identifier)
    }

    fn download(&self, identifier: &str) -> Result<ModelFiles, ModelResolutionError> {
        let download_err = |file: &str, message: String| ModelResolutionError::Download {
            model: identifier.to_string(),
            file:  file.to_string(),
            message,
        };

        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(token) = &self.token {
            builder = builder.with_token(Some(token.clone()));
        }
        let api  = builder.build().map_err(|e| download_err("<api>", e.to_string()))?;
        let repo = api.model(identifier.to_string());

        tracing::info!("Fetching '{}' from the model hub", identifier);
        let info = repo.info().map_err(|e| download_err("<repo info>", e.to_string()))?;
        let listed: BTreeSet<String> = info.siblings.into_iter().map(|s| s.rfilename).collect();
        let fetch = |file: &str| repo.get(file).map_err(|e| download_err(file, e.to_string()));

        let config    = fetch(CONFIG_FILE)?;
        let tokenizer = fetch(TOKENIZER_FILE)?;
        let weights = match pick_remote_weights(&listed) {
            Some(RemoteWeights::Record) => WeightFiles::Record(fetch(WEIGHTS_FILE)?),
            Some(RemoteWeights::Safetensors) => WeightFiles::Safetensors(vec![fetch(SAFETENSORS_FILE)?]),
            Some(RemoteWeights::Sharded) => {
                let index = fetch(SAFETENSORS_INDEX_FILE)?;
                let shards = shard_names(&index)?
                    .iter()
                    .map(|name| fetch(name))
                    .collect::<Result<Vec<_>, _>>()?;
                WeightFiles::Safetensors(shards)
            }
            None => {
                return Err(ModelResolutionError::Weights {
                    path:    PathBuf::from(identifier),
                    message: format!(
                        "repository lists none of {WEIGHTS_FILE}, {SAFETENSORS_FILE}, {SAFETENSORS_INDEX_FILE}"
                    ),
                })
            }
        };

        Ok(ModelFiles { config, tokenizer, weights: Some(weights) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemoteWeights {
    Record,
    Safetensors,
    Sharded,
}

/// Which weight files to fetch, given the repository's file listing
fn pick_remote_weights(listed: &BTreeSet<String>) -> Option<RemoteWeights> {
    if listed.contains(WEIGHTS_FILE) {
        Some(RemoteWeights::Record)
    } else if listed.contains(SAFETENSORS_FILE) {
        Some(RemoteWeights::Safetensors)
    } else if listed.contains(SAFETENSORS_INDEX_FILE) {
        Some(RemoteWeights::Sharded)
    } else {
        None
    }
}
