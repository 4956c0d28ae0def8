// ============================================================
// Layer 5 — Classification Metrics
// ============================================================
// The metrics function the Trainer calls after every
// evaluation pass:
//
//   1. reduce each row of logits to a class (argmax)
//   2. precision / recall / F1 against the positive class 1
//   3. accuracy over all examples
//   4. return {accuracy, f1, precision, recall}
//
// A zero denominator yields 0.0 instead of an error, so a batch
// with no positive predictions and no positive labels is fine.

use std::collections::BTreeMap;

/// Name → value, iterated in key order
pub type Metrics = BTreeMap<String, f64>;

/// Signature of the callback handed to the Trainer
pub type MetricsFn = fn(&[Vec<f32>], &[usize]) -> Metrics;

/// The class treated as "positive" by the binary averaging policy
pub const POSITIVE_LABEL: usize = 1;

/// Index of the highest score; the first one wins ties, NaN never wins.
pub fn argmax(scores: &[f32]) -> usize {
    let mut best_idx = 0;
    let mut best     = f32::NEG_INFINITY;
    for (idx, &score) in scores.iter().enumerate() {
        if score > best {
            best     = score;
            best_idx = idx;
        }
    }
    best_idx
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BinaryCounts {
    true_pos:  usize,
    false_pos: usize,
    false_neg: usize,
    correct:   usize,
    total:     usize,
}

impl BinaryCounts {
    fn tally(predicted: &[usize], labels: &[usize]) -> Self {
        let mut c = Self::default();
        for (&p, &y) in predicted.iter().zip(labels) {
            c.total += 1;
            if p == y {
                c.correct += 1;
            }
            match (p == POSITIVE_LABEL, y == POSITIVE_LABEL) {
                (true, true)  => c.true_pos  += 1,
                (true, false) => c.false_pos += 1,
                (false, true) => c.false_neg += 1,
                (false, false) => {}
            }
        }
        c
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Accuracy plus binary precision, recall and F1 from raw logits.
pub fn compute_metrics(predictions: &[Vec<f32>], labels: &[usize]) -> Metrics {
    debug_assert_eq!(predictions.len(), labels.len());

    let predicted: Vec<usize> = predictions.iter().map(|row| argmax(row)).collect();
    let c = BinaryCounts::tally(&predicted, labels);

    let precision = ratio(c.true_pos, c.true_pos + c.false_pos);
    let recall    = ratio(c.true_pos, c.true_pos + c.false_neg);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    let accuracy = ratio(c.correct, c.total);

    Metrics::from([
        ("accuracy".to_string(),  accuracy),
        ("f1".to_string(),        f1),
        ("precision".to_string(), precision),
        ("recall".to_string(),    recall),
    ])
}
