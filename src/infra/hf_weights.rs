// ============================================================
// Layer 6 — Hugging Face Weight Import
// ============================================================
// Copies BERT-family checkpoint tensors into a TextClassifier.
//
// Two naming layouts are recognised, under any prefix
// (`bert.`, `roberta.`, `distilbert.`, or none):
//
//   Bert        embeddings.{word,position,token_type}_embeddings
//               embeddings.LayerNorm
//               encoder.layer.N.attention.self.{query,key,value}
//               encoder.layer.N.attention.output.{dense,LayerNorm}
//               encoder.layer.N.{intermediate.dense,output.dense,output.LayerNorm}
//   DistilBert  embeddings.{word,position}_embeddings, embeddings.LayerNorm
//               transformer.layer.N.attention.{q,k,v,out}_lin
//               transformer.layer.N.{sa_layer_norm,ffn.lin1,ffn.lin2,output_layer_norm}
//
// PyTorch stores Linear weights as [out, in]; Burn as [in, out].
// Token-type embedding row 0 is folded into the position table
// (every sequence here has token type 0).
//
// Every encoder tensor is required. The pooler and classifier
// are copied when present with matching shapes; otherwise they
// keep their fresh initialisation, as for a base checkpoint.

use burn::{
    module::Param,
    nn::{LayerNorm, Linear},
    prelude::*,
};

use crate::infra::tensor_store::TensorStore;
use crate::ml::model::{EncoderBlock, TextClassifier};

const WORD_EMBEDDINGS: &str = "embeddings.word_embeddings.weight";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointLayout {
    Bert,
    DistilBert,
}

struct BlockNames {
    query:     String,
    key:       String,
    value:     String,
    attn_out:  String,
    attn_norm: String,
    ffn_in:    String,
    ffn_out:   String,
    ffn_norm:  String,
}

impl CheckpointLayout {
    fn block(self, prefix: &str, i: usize) -> BlockNames {
        match self {
            CheckpointLayout::Bert => {
                let l = format!("{prefix}encoder.layer.{i}");
                BlockNames {
                    query:     format!("{l}.attention.self.query"),
                    key:       format!("{l}.attention.self.key"),
                    value:     format!("{l}.attention.self.value"),
                    attn_out:  format!("{l}.attention.output.dense"),
                    attn_norm: format!("{l}.attention.output.LayerNorm"),
                    ffn_in:    format!("{l}.intermediate.dense"),
                    ffn_out:   format!("{l}.output.dense"),
                    ffn_norm:  format!("{l}.output.LayerNorm"),
                }
            }
            CheckpointLayout::DistilBert => {
                let l = format!("{prefix}transformer.layer.{i}");
                BlockNames {
                    query:     format!("{l}.attention.q_lin"),
                    key:       format!("{l}.attention.k_lin"),
                    value:     format!("{l}.attention.v_lin"),
                    attn_out:  format!("{l}.attention.out_lin"),
                    attn_norm: format!("{l}.sa_layer_norm"),
                    ffn_in:    format!("{l}.ffn.lin1"),
                    ffn_out:   format!("{l}.ffn.lin2"),
                    ffn_norm:  format!("{l}.output_layer_norm"),
                }
            }
        }
    }

    /// Pooler sources, most specific first (RoBERTa keeps its own in the head)
    fn pooler(self, prefix: &str) -> Vec<String> {
        match self {
            CheckpointLayout::Bert => vec!["classifier.dense".to_string(), format!("{prefix}pooler.dense")],
            CheckpointLayout::DistilBert => vec!["pre_classifier".to_string()],
        }
    }

    fn classifier(self) -> Vec<String> {
        match self {
            CheckpointLayout::Bert => vec!["classifier.out_proj".to_string(), "classifier".to_string()],
            CheckpointLayout::DistilBert => vec!["classifier".to_string()],
        }
    }
}

/// Find the tensor-name prefix and layout of a checkpoint.
pub fn detect_layout(store: &TensorStore) -> Result<(String, CheckpointLayout), String> {
    let prefix = store
        .names()
        .filter_map(|name| name.strip_suffix(WORD_EMBEDDINGS))
        .min_by_key(|p| p.len())
        .ok_or_else(|| format!("no '{WORD_EMBEDDINGS}' tensor; not a BERT-family checkpoint"))?
        .to_string();

    if store.contains(&format!("{prefix}transformer.layer.0.attention.q_lin.weight")) {
        Ok((prefix, CheckpointLayout::DistilBert))
    } else if store.contains(&format!("{prefix}encoder.layer.0.attention.self.query.weight")) {
        Ok((prefix, CheckpointLayout::Bert))
    } else {
        Err(format!("unrecognised encoder layer naming under prefix '{prefix}'"))
    }
}

/// Outcome of an import
#[derive(Debug)]
pub struct Imported<B: Backend> {
    pub model:  TextClassifier<B>,
    pub layout: CheckpointLayout,
    /// Head modules that kept their fresh initialisation
    pub fresh:  Vec<&'static str>,
}

struct Importer<'a, B: Backend> {
    store:  &'a TensorStore,
    device: &'a B::Device,
}

impl<B: Backend> Importer<'_, B> {
    fn tensor<const D: usize>(&self, name: &str, shape: [usize; D]) -> Result<Tensor<B, D>, String> {
        let stored = self.store.get(name, &shape)?;
        Ok(Tensor::from_data(TensorData::new(stored.values.clone(), shape), self.device))
    }

    fn linear(&self, base: &str, mut linear: Linear<B>) -> Result<Linear<B>, String> {
        let [d_in, d_out] = linear.weight.val().dims();
        let weight = self.tensor::<2>(&format!("{base}.weight"), [d_out, d_in])?.transpose();
        let bias   = self.tensor::<1>(&format!("{base}.bias"), [d_out])?;
        linear.weight = Param::from_tensor(weight);
        linear.bias   = Some(Param::from_tensor(bias));
        Ok(linear)
    }

    /// Accepts both `weight`/`bias` and the older `gamma`/`beta` names.
    fn layer_norm(&self, base: &str, mut norm: LayerNorm<B>) -> Result<LayerNorm<B>, String> {
        let [d] = norm.gamma.val().dims();
        let (scale, shift) = if self.store.contains(&format!("{base}.gamma")) {
            ("gamma", "beta")
        } else {
            ("weight", "bias")
        };
        norm.gamma = Param::from_tensor(self.tensor::<1>(&format!("{base}.{scale}"), [d])?);
        norm.beta  = Param::from_tensor(self.tensor::<1>(&format!("{base}.{shift}"), [d])?);
        Ok(norm)
    }

    fn block(&self, names: &BlockNames, mut block: EncoderBlock<B>) -> Result<EncoderBlock<B>, String> {
        block.self_attn.query  = self.linear(&names.query, block.self_attn.query)?;
        block.self_attn.key    = self.linear(&names.key, block.self_attn.key)?;
        block.self_attn.value  = self.linear(&names.value, block.self_attn.value)?;
        block.self_attn.output = self.linear(&names.attn_out, block.self_attn.output)?;
        block.norm1            = self.layer_norm(&names.attn_norm, block.norm1)?;
        block.ffn_linear1      = self.linear(&names.ffn_in, block.ffn_linear1)?;
        block.ffn_linear2      = self.linear(&names.ffn_out, block.ffn_linear2)?;
        block.norm2            = self.layer_norm(&names.ffn_norm, block.norm2)?;
        Ok(block)
    }

    /// First candidate present in the checkpoint with matching shapes, if any.
    fn optional_linear(&self, candidates: &[String], linear: Linear<B>) -> (Linear<B>, bool) {
        for base in candidates {
            if !self.store.contains(&format!("{base}.weight")) {
                continue;
            }
            match self.linear(base, linear.clone()) {
                Ok(loaded) => return (loaded, true),
                Err(e) => tracing::warn!("Not using '{}': {}", base, e),
            }
        }
        (linear, false)
    }
}

/// Overwrite `model`'s parameters with the checkpoint in `store`.
///
/// `position_offset` skips leading rows of the position table
/// (RoBERTa reserves `pad_token_id + 1` of them).
pub fn import_pretrained<B: Backend>(
    mut model:       TextClassifier<B>,
    store:           &TensorStore,
    position_offset: usize,
    device:          &B::Device,
) -> Result<Imported<B>, String> {
    let (prefix, layout) = detect_layout(store)?;
    let importer = Importer::<B> { store, device };

    let [vocab, d_model] = model.token_embedding.weight.val().dims();
    model.token_embedding.weight = Param::from_tensor(
        importer.tensor::<2>(&format!("{prefix}{WORD_EMBEDDINGS}"), [vocab, d_model])?,
    );

    let [rows, _] = model.position_embedding.weight.val().dims();
    let pos_name  = format!("{prefix}embeddings.position_embeddings.weight");
    let stored    = store.get(&pos_name, &[rows + position_offset, d_model])?;
    let mut positions = stored.values[position_offset * d_model..].to_vec();
    if let Some(token_type) = store.first_row(&format!("{prefix}embeddings.token_type_embeddings.weight"), d_model) {
        for row in positions.chunks_mut(d_model) {
            row.iter_mut().zip(token_type).for_each(|(p, t)| *p += t);
        }
    }
    model.position_embedding.weight = Param::from_tensor(Tensor::from_data(
        TensorData::new(positions, [rows, d_model]),
        device,
    ));

    model.embedding_norm = importer.layer_norm(&format!("{prefix}embeddings.LayerNorm"), model.embedding_norm)?;

    model.layers = model
        .layers
        .into_iter()
        .enumerate()
        .map(|(i, block)| importer.block(&layout.block(&prefix, i), block))
        .collect::<Result<Vec<_>, _>>()?;

    let mut fresh = Vec::new();
    let (pooler, found) = importer.optional_linear(&layout.pooler(&prefix), model.pooler);
    model.pooler = pooler;
    if !found {
        fresh.push("pooler");
    }
    let (classifier, found) = importer.optional_linear(&layout.classifier(), model.classifier);
    model.classifier = classifier;
    if !found {
        fresh.push("classifier");
    }
    model.pooler_tanh = layout == CheckpointLayout::Bert;

    Ok(Imported { model, layout, fresh })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tensor_store::SAFETENSORS_FILE;
    use crate::test_util::{tiny_pretrained_config, write_hf_checkpoint};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn import(layout: CheckpointLayout, prefix: &str, with_head: bool) -> Imported<TestBackend> {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SAFETENSORS_FILE);
        let cfg  = tiny_pretrained_config();
        write_hf_checkpoint(&path, &cfg, layout, prefix, with_head);

        let store  = TensorStore::load(&[path]).unwrap();
        let device = Default::default();
        let model  = cfg.to_model_config().init::<TestBackend>(&device);
        import_pretrained(model, &store, 0, &device).unwrap()
    }

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    #[test]
    fn bert_layout_fills_every_parameter() {
        let imported = import(CheckpointLayout::Bert, "bert.", true);
        assert_eq!(imported.layout, CheckpointLayout::Bert);
        assert!(imported.fresh.is_empty());
        assert!(imported.model.pooler_tanh);

        // fixture value for element k of a tensor is k * 0.001, so the
        // word embedding comes back unchanged
        let emb = values(imported.model.token_embedding.weight.val());
        assert_eq!(emb[0], 0.0);
        assert!((emb[5] - 0.005).abs() < 1e-6);

        // classifier stored as [2, 8]; Burn holds the transpose [8, 2]
        let w = values(imported.model.classifier.weight.val());
        assert!((w[1] - 0.008).abs() < 1e-6);
    }

    #[test]
    fn distilbert_base_checkpoint_keeps_fresh_head() {
        let imported = import(CheckpointLayout::DistilBert, "distilbert.", false);
        assert_eq!(imported.layout, CheckpointLayout::DistilBert);
        assert_eq!(imported.fresh, vec!["pooler", "classifier"]);
        assert!(!imported.model.pooler_tanh);
    }

    #[test]
    fn two_imports_give_identical_models() {
        let a = import(CheckpointLayout::Bert, "", true);
        let b = import(CheckpointLayout::Bert, "", true);
        let device = Default::default();
        let ids  = Tensor::<TestBackend, 1, Int>::from_ints([2, 4, 6, 3].as_slice(), &device).reshape([1, 4]);
        let mask = Tensor::<TestBackend, 1, Int>::from_ints([1, 1, 1, 1].as_slice(), &device).reshape([1, 4]);
        assert_eq!(
            values(a.model.forward(ids.clone(), mask.clone())),
            values(b.model.forward(ids, mask))
        );
    }

    #[test]
    fn missing_encoder_tensor_is_an_error() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SAFETENSORS_FILE);
        let mut cfg = tiny_pretrained_config();
        write_hf_checkpoint(&path, &cfg, CheckpointLayout::Bert, "bert.", false);

        // the model asks for one more layer than the checkpoint has
        cfg.num_hidden_layers = 2;
        let store  = TensorStore::load(&[path]).unwrap();
        let device = Default::default();
        let model  = cfg.to_model_config().init::<TestBackend>(&device);
        let err = import_pretrained(model, &store, 0, &device).err().unwrap();
        assert!(err.contains("encoder.layer.1"), "{err}");
    }
}
