// ============================================================
// Layer 6 — Safetensors Store
// ============================================================
// Reads Hugging Face `model.safetensors` files (one file, or
// the shards listed in `model.safetensors.index.json`) into
// host-side f32 buffers keyed by tensor name.
//
// F32, F16 and BF16 are accepted; other dtypes are an error
// only when a caller asks for that tensor.

use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
};

use safetensors::{tensor::TensorView, Dtype, SafeTensors};
use serde::Deserialize;

use crate::domain::error::ModelResolutionError;

pub const SAFETENSORS_FILE:       &str = "model.safetensors";
pub const SAFETENSORS_INDEX_FILE: &str = "model.safetensors.index.json";

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTensor {
    pub shape:  Vec<usize>,
    pub values: Vec<f32>,
}

#[derive(Debug, Default)]
pub struct TensorStore {
    tensors: HashMap<String, StoredTensor>,
    skipped: HashMap<String, Dtype>,
}

#[derive(Deserialize)]
struct ShardIndex {
    weight_map: HashMap<String, String>,
}

/// Shard file names referenced by an index file, sorted and deduplicated.
pub fn shard_names(index: &Path) -> Result<Vec<String>, ModelResolutionError> {
    let weights_err = |message: String| ModelResolutionError::Weights {
        path: index.to_path_buf(),
        message,
    };
    let text = fs::read_to_string(index).map_err(|e| weights_err(e.to_string()))?;
    let parsed: ShardIndex = serde_json::from_str(&text).map_err(|e| weights_err(e.to_string()))?;
    let names: BTreeSet<String> = parsed.weight_map.into_values().collect();
    if names.is_empty() {
        return Err(weights_err("index lists no shards".to_string()));
    }
    Ok(names.into_iter().collect())
}

fn to_f32(view: &TensorView<'_>) -> Option<Vec<f32>> {
    let data = view.data();
    let values = match view.dtype() {
        Dtype::F32 => data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Dtype::F16 => data
            .chunks_exact(2)
            .map(|c| half::f16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
            .collect(),
        Dtype::BF16 => data
            .chunks_exact(2)
            .map(|c| half::bf16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
            .collect(),
        _ => return None,
    };
    Some(values)
}

impl TensorStore {
    /// Read every tensor of every file in `paths`.
    pub fn load(paths: &[PathBuf]) -> Result<Self, ModelResolutionError> {
        let mut store = Self::default();
        for path in paths {
            let bytes = fs::read(path).map_err(|e| ModelResolutionError::Weights {
                path:    path.clone(),
                message: e.to_string(),
            })?;
            let tensors = SafeTensors::deserialize(&bytes).map_err(|e| ModelResolutionError::Weights {
                path:    path.clone(),
                message: e.to_string(),
            })?;

            for (name, view) in tensors.tensors() {
                match to_f32(&view) {
                    Some(values) => {
                        store.tensors.insert(name, StoredTensor { shape: view.shape().to_vec(), values });
                    }
                    None => {
                        store.skipped.insert(name, view.dtype());
                    }
                }
            }
            tracing::debug!("Read safetensors file '{}'", path.display());
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    /// First row of a 2-d tensor whose rows are `width` wide
    pub fn first_row(&self, name: &str, width: usize) -> Option<&[f32]> {
        let t = self.tensors.get(name)?;
        (t.shape.len() == 2 && t.shape[0] > 0 && t.shape[1] == width).then(|| &t.values[..width])
    }

    /// The tensor called `name`, checked against `shape`.
    pub fn get(&self, name: &str, shape: &[usize]) -> Result<&StoredTensor, String> {
        if let Some(dtype) = self.skipped.get(name) {
            return Err(format!("tensor '{name}' has unsupported dtype {dtype:?}"));
        }
        let tensor = self
            .tensors
            .get(name)
            .ok_or_else(|| format!("tensor '{name}' not found"))?;
        if tensor.shape != shape {
            return Err(format!(
                "tensor '{name}' has shape {:?}, expected {:?}",
                tensor.shape, shape
            ));
        }
        Ok(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safetensors::serialize;

    fn write(path: &Path, tensors: &[(&str, Dtype, Vec<usize>, Vec<u8>)]) {
        let views: Vec<(String, TensorView<'_>)> = tensors
            .iter()
            .map(|(name, dtype, shape, bytes)| {
                (name.to_string(), TensorView::new(*dtype, shape.clone(), bytes).unwrap())
            })
            .collect();
        fs::write(path, serialize(views, None).unwrap()).unwrap();
    }

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn reads_f32_and_half_precision_tensors() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SAFETENSORS_FILE);
        let bf16: Vec<u8> = [1.5f32, -2.0]
            .iter()
            .flat_map(|v| half::bf16::from_f32(*v).to_le_bytes())
            .collect();
        write(&path, &[
            ("a.weight", Dtype::F32, vec![2, 2], f32_bytes(&[0.0, 1.0, 2.0, 3.0])),
            ("b.bias",   Dtype::BF16, vec![2], bf16),
        ]);

        let store = TensorStore::load(&[path]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a.weight", &[2, 2]).unwrap().values, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(store.get("b.bias", &[2]).unwrap().values, vec![1.5, -2.0]);
    }

    #[test]
    fn shape_mismatch_and_missing_names_are_reported() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SAFETENSORS_FILE);
        write(&path, &[("a.weight", Dtype::F32, vec![2], f32_bytes(&[0.0, 1.0]))]);

        let store = TensorStore::load(&[path]).unwrap();
        assert!(store.get("a.weight", &[1, 2]).unwrap_err().contains("shape"));
        assert!(store.get("missing", &[2]).unwrap_err().contains("not found"));
        assert!(store.first_row("a.weight", 2).is_none());
    }

    #[test]
    fn shards_from_index_are_unique_and_sorted() {
        let tmp   = tempfile::tempdir().unwrap();
        let index = tmp.path().join(SAFETENSORS_INDEX_FILE);
        fs::write(
            &index,
            r#"{"metadata":{},"weight_map":{"a":"model-00002.safetensors","b":"model-00001.safetensors","c":"model-00002.safetensors"}}"#,
        )
        .unwrap();
        assert_eq!(
            shard_names(&index).unwrap(),
            vec!["model-00001.safetensors".to_string(), "model-00002.safetensors".to_string()]
        );
    }

    #[test]
    fn corrupt_file_is_a_weights_error() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SAFETENSORS_FILE);
        fs::write(&path, b"not a safetensors file").unwrap();
        let err = TensorStore::load(&[path]).unwrap_err();
        assert!(matches!(err, ModelResolutionError::Weights { .. }));
    }
}
