// ============================================================
// Layer 5 — Trainable-Parameter Report
// ============================================================
// Walks every float parameter tensor of a module and splits
// the element counts by the require-grad flag. With a frozen
// encoder only the pooler and classifier count as trainable.

use std::fmt;

use burn::{
    module::{Module, ModuleVisitor, ParamId},
    prelude::*,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterCount {
    pub trainable: usize,
    pub total:     usize,
}

impl ParameterCount {
    pub fn of<B: Backend, M: Module<B>>(module: &M) -> Self {
        let mut counter = ParameterCount::default();
        module.visit(&mut counter);
        counter
    }

    /// `trainable / total` as a percentage, 0 for an empty module
    pub fn trainable_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.trainable as f64 / self.total as f64
        }
    }
}

impl<B: Backend> ModuleVisitor<B> for ParameterCount {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        let n = tensor.shape().num_elements();
        self.total += n;
        if tensor.is_require_grad() {
            self.trainable += n;
        }
    }
}

impl fmt::Display for ParameterCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trainable params: {} || all params: {} || trainable%: {:.2}",
            self.trainable,
            self.total,
            self.trainable_percent(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{TextClassifier, TextClassifierConfig};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn model() -> TextClassifier<TestBackend> {
        TextClassifierConfig::new(16, 8, 8, 2, 1, 16, 0.0, 2).init(&Default::default())
    }

    #[test]
    fn everything_is_trainable_by_default() {
        let m     = model();
        let count = ParameterCount::of(&m);
        assert_eq!(count.total, m.num_params());
        assert_eq!(count.trainable, count.total);
        assert!((count.trainable_percent() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn frozen_encoder_leaves_only_the_head() {
        let count = ParameterCount::of(&model().freeze_encoder());
        // pooler Linear(8 → 8): 72, classifier Linear(8 → 2): 18
        assert_eq!(count.trainable, 90);
        assert!(count.trainable_percent() < 100.0);
    }

    #[test]
    fn display_matches_report_format() {
        let count = ParameterCount { trainable: 1, total: 3 };
        assert_eq!(
            count.to_string(),
            "trainable params: 1 || all params: 3 || trainable%: 33.33"
        );
    }

    #[test]
    fn empty_module_reports_zero_percent() {
        assert_eq!(ParameterCount::default().trainable_percent(), 0.0);
    }
}
