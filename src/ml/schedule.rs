/// Linear warmup to the peak learning rate, then linear decay to zero.
///
/// `lr_at(step)` is queried with the number of optimizer steps already
/// taken, so the very first update runs at 0 when warmup is enabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearWarmupSchedule {
    peak_lr:      f64,
    warmup_steps: usize,
    total_steps:  usize,
}

impl LinearWarmupSchedule {
    pub fn new(peak_lr: f64, warmup_steps: usize, total_steps: usize) -> Self {
        Self { peak_lr, warmup_steps, total_steps }
    }

    pub fn lr_at(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            return self.peak_lr * step as f64 / self.warmup_steps.max(1) as f64;
        }
        let remaining = self.total_steps.saturating_sub(step) as f64;
        let decay_len = self.total_steps.saturating_sub(self.warmup_steps).max(1) as f64;
        self.peak_lr * (remaining / decay_len).max(0.0)
    }
}
