// ============================================================
// Layer 4 — Classification Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec of samples
// into tensors for one forward pass.
//
// Samples arrive unpadded. Each batch is padded to its own
// longest sequence with the tokenizer's pad id:
//
//   input_ids       [batch, seq]   pad id beyond each sample's length
//   attention_mask  [batch, seq]   1 = real token, 0 = padding
//   labels          [batch]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::ClassificationSample;

#[derive(Debug, Clone)]
pub struct ClassificationBatch<B: Backend> {
    pub input_ids:      Tensor<B, 2, Int>,
    pub attention_mask: Tensor<B, 2, Int>,
    pub labels:         Tensor<B, 1, Int>,
    /// Host-side copy of `labels`, handed to the metrics function
    pub label_ids:      Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct ClassificationBatcher<B: Backend> {
    pub device: B::Device,
    pub pad_id: u32,
}

impl<B: Backend> ClassificationBatcher<B> {
    pub fn new(device: B::Device, pad_id: u32) -> Self {
        Self { device, pad_id }
    }
}

impl<B: Backend> Batcher<ClassificationSample, ClassificationBatch<B>> for ClassificationBatcher<B> {
    fn batch(&self, items: Vec<ClassificationSample>) -> ClassificationBatch<B> {
        let batch_size = items.len();
        let seq_len    = items
            .iter()
            .map(|s| s.input_ids.len())
            .max()
            .unwrap_or(0)
            .max(1);

        let mut input_flat: Vec<i32> = Vec::with_capacity(batch_size * seq_len);
        let mut mask_flat:  Vec<i32> = Vec::with_capacity(batch_size * seq_len);

        for sample in &items {
            for pos in 0..seq_len {
                match sample.input_ids.get(pos) {
                    Some(&id) => {
                        input_flat.push(id as i32);
                        mask_flat.push(sample.attention_mask.get(pos).copied().unwrap_or(1) as i32);
                    }
                    None => {
                        input_flat.push(self.pad_id as i32);
                        mask_flat.push(0);
                    }
                }
            }
        }

        let label_ids: Vec<usize> = items.iter().map(|s| s.label).collect();
        let labels_i32: Vec<i32>  = label_ids.iter().map(|&l| l as i32).collect();

        let input_ids = Tensor::<B, 1, Int>::from_ints(
            input_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let attention_mask = Tensor::<B, 1, Int>::from_ints(
            mask_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let labels = Tensor::<B, 1, Int>::from_ints(labels_i32.as_slice(), &self.device);

        ClassificationBatch {
            input_ids,
            attention_mask,
            labels,
            label_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn sample(ids: &[u32], label: usize) -> ClassificationSample {
        ClassificationSample {
            input_ids:      ids.to_vec(),
            attention_mask: vec![1; ids.len()],
            label,
        }
    }

    #[test]
    fn pads_to_longest_sequence_in_batch() {
        let batcher = ClassificationBatcher::<TestBackend>::new(Default::default(), 0);
        let batch   = batcher.batch(vec![sample(&[5, 6, 7], 1), sample(&[8], 0)]);

        assert_eq!(batch.input_ids.dims(), [2, 3]);
        assert_eq!(batch.attention_mask.dims(), [2, 3]);
        assert_eq!(batch.labels.dims(), [2]);
        assert_eq!(batch.label_ids, vec![1, 0]);

        let ids: Vec<i64> = batch.input_ids.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(ids, vec![5, 6, 7, 8, 0, 0]);
        let mask: Vec<i64> = batch.attention_mask.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(mask, vec![1, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn uses_configured_pad_id() {
        let batcher = ClassificationBatcher::<TestBackend>::new(Default::default(), 3);
        let batch   = batcher.batch(vec![sample(&[9, 9], 0), sample(&[4], 1)]);
        let ids: Vec<i64> = batch.input_ids.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(ids, vec![9, 9, 4, 3]);
    }
}
