//! Fixtures shared by the unit tests.

use std::{fs, path::Path};

use safetensors::{serialize, tensor::TensorView, Dtype};
use tokenizers::Tokenizer;

use crate::domain::hyperparameters::Hyperparameters;
use crate::infra::hf_weights::CheckpointLayout;
use crate::infra::model_hub::{PretrainedConfig, CONFIG_FILE, TOKENIZER_FILE};

/// Word-level tokenizer over a 10-word vocabulary, `[PAD]` = 0.
/// Encodings are wrapped as `[CLS] … [SEP]` (ids 2 and 3).
pub fn word_level_tokenizer() -> Tokenizer {
    let json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 0, "content": "[PAD]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 1, "content": "[UNK]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 2, "content": "[CLS]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 3, "content": "[SEP]", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": {
            "type": "BertProcessing",
            "sep": ["[SEP]", 3],
            "cls": ["[CLS]", 2]
        },
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {
                "[PAD]": 0, "[UNK]": 1, "[CLS]": 2, "[SEP]": 3,
                "good": 4, "bad": 5, "movie": 6, "film": 7, "great": 8, "awful": 9
            },
            "unk_token": "[UNK]"
        }
    });
    Tokenizer::from_bytes(json.to_string().as_bytes()).unwrap()
}

pub fn tiny_pretrained_config() -> PretrainedConfig {
    PretrainedConfig {
        architectures:           Vec::new(),
        model_type:              None,
        vocab_size:              16,
        hidden_size:             8,
        num_attention_heads:     2,
        num_hidden_layers:       1,
        intermediate_size:       16,
        max_position_embeddings: 8,
        hidden_dropout_prob:     0.0,
        layer_norm_eps:          1e-12,
        num_labels:              Some(2),
        id2label:                None,
        pad_token_id:            None,
    }
}

/// A resolvable model directory without weights.
pub fn write_model_dir(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join(CONFIG_FILE),
        serde_json::to_string_pretty(&tiny_pretrained_config()).unwrap(),
    )
    .unwrap();
    word_level_tokenizer().save(dir.join(TOKENIZER_FILE), false).unwrap();
}

/// Writes a Hugging Face checkpoint shaped for `cfg`.
/// Element k of every tensor holds `k * 0.001`.
pub fn write_hf_checkpoint(
    path: &Path,
    cfg: &PretrainedConfig,
    layout: CheckpointLayout,
    prefix: &str,
    with_head: bool,
) {
    let (d, ff) = (cfg.hidden_size, cfg.intermediate_size);
    let mut shapes: Vec<(String, Vec<usize>)> = vec![
        (format!("{prefix}embeddings.word_embeddings.weight"), vec![cfg.vocab_size, d]),
        (format!("{prefix}embeddings.position_embeddings.weight"), vec![cfg.max_position_embeddings, d]),
        (format!("{prefix}embeddings.LayerNorm.weight"), vec![d]),
        (format!("{prefix}embeddings.LayerNorm.bias"), vec![d]),
    ];
    let linear = |shapes: &mut Vec<(String, Vec<usize>)>, base: String, d_in: usize, d_out: usize| {
        shapes.push((format!("{base}.weight"), vec![d_out, d_in]));
        shapes.push((format!("{base}.bias"), vec![d_out]));
    };
    let norm = |shapes: &mut Vec<(String, Vec<usize>)>, base: String| {
        shapes.push((format!("{base}.weight"), vec![d]));
        shapes.push((format!("{base}.bias"), vec![d]));
    };
    // (attention q/k/v/out, attention norm, ffn in, ffn out, ffn norm)
    let (stack, attn, attn_norm, ffn_in, ffn_out, ffn_norm) = match layout {
        CheckpointLayout::Bert => {
            shapes.push((format!("{prefix}embeddings.token_type_embeddings.weight"), vec![2, d]));
            (
                "encoder",
                ["attention.self.query", "attention.self.key", "attention.self.value", "attention.output.dense"],
                "attention.output.LayerNorm",
                "intermediate.dense",
                "output.dense",
                "output.LayerNorm",
            )
        }
        CheckpointLayout::DistilBert => (
            "transformer",
            ["attention.q_lin", "attention.k_lin", "attention.v_lin", "attention.out_lin"],
            "sa_layer_norm",
            "ffn.lin1",
            "ffn.lin2",
            "output_layer_norm",
        ),
    };
    for i in 0..cfg.num_hidden_layers {
        let l = format!("{prefix}{stack}.layer.{i}");
        for name in attn {
            linear(&mut shapes, format!("{l}.{name}"), d, d);
        }
        norm(&mut shapes, format!("{l}.{attn_norm}"));
        linear(&mut shapes, format!("{l}.{ffn_in}"), d, ff);
        linear(&mut shapes, format!("{l}.{ffn_out}"), ff, d);
        norm(&mut shapes, format!("{l}.{ffn_norm}"));
    }
    if with_head {
        let pooler = match layout {
            CheckpointLayout::Bert => format!("{prefix}pooler.dense"),
            CheckpointLayout::DistilBert => "pre_classifier".to_string(),
        };
        linear(&mut shapes, pooler, d, d);
        linear(&mut shapes, "classifier".to_string(), d, cfg.num_labels());
    }

    let bytes: Vec<(String, Vec<usize>, Vec<u8>)> = shapes
        .into_iter()
        .map(|(name, shape)| {
            let n: usize = shape.iter().product();
            let data = (0..n).flat_map(|k| (k as f32 * 0.001).to_le_bytes()).collect();
            (name, shape, data)
        })
        .collect();
    let views: Vec<(String, TensorView<'_>)> = bytes
        .iter()
        .map(|(name, shape, data)| (name.clone(), TensorView::new(Dtype::F32, shape.clone(), data).unwrap()))
        .collect();
    fs::write(path, serialize(views, None).unwrap()).unwrap();
}

pub fn hyperparameters(root: &Path) -> Hyperparameters {
    Hyperparameters {
        epochs:           1,
        train_batch_size: 32,
        eval_batch_size:  64,
        warmup_steps:     500,
        model_name:       "tiny".to_string(),
        learning_rate:    5e-5,
        output_data_dir:  root.join("output"),
        model_dir:        root.join("model"),
        n_gpus:           0,
        training_dir:     root.join("train"),
        test_dir:         root.join("test"),
        seed:             42,
        weight_decay:     0.0,
        max_grad_norm:    1.0,
        logging_steps:    500,
        max_seq_len:      None,
        freeze_encoder:   false,
    }
}
