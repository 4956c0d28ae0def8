// ============================================================
// Layer 5 — Trainer
// ============================================================
// Drives Burn's DataLoader, autodiff and AdamW through a run:
//
//   train()       epoch loop; each step = forward, backward,
//                 clip, AdamW step at the scheduled rate.
//                 At every epoch end: evaluate on the eval set,
//                 append to the metrics CSV, save a checkpoint.
//   evaluate()    forward-only pass on the inner backend
//                 (no autodiff, dropout off) + metrics callback
//   save_model()  weights, config, tokenizer, training args
//
// Burn notes:
//   - training runs on B (Autodiff<…>) for gradients
//   - model.valid() gives the model on B::InnerBackend
//   - the eval batcher must use B::InnerBackend too
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use anyhow::{anyhow, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::data::{
    batcher::ClassificationBatcher,
    dataset::ClassificationDataset,
};
use crate::domain::hyperparameters::Hyperparameters;
use crate::infra::{
    checkpoint::{save_pretrained, write_json, CheckpointManager},
    metrics::{EpochMetrics, MetricsLogger},
    model_hub::{PretrainedConfig, PretrainedModel},
};
use crate::ml::{
    metrics::{compute_metrics, Metrics, MetricsFn},
    model::TextClassifier,
    schedule::LinearWarmupSchedule,
};

pub const TRAINING_ARGS_FILE: &str = "training_args.json";

/// When the evaluation set is scored during training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStrategy {
    /// After every epoch, before its checkpoint
    Epoch,
}

/// Everything the Trainer needs to know about a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArguments {
    pub output_dir:                  PathBuf,
    pub num_train_epochs:            usize,
    pub per_device_train_batch_size: usize,
    pub per_device_eval_batch_size:  usize,
    pub warmup_steps:                usize,
    pub evaluation_strategy:         EvaluationStrategy,
    pub logging_dir:                 PathBuf,
    pub learning_rate:               f64,
    pub weight_decay:                f64,
    pub max_grad_norm:               f64,
    pub logging_steps:               usize,
    pub seed:                        u64,
}

impl From<&Hyperparameters> for TrainingArguments {
    fn from(hp: &Hyperparameters) -> Self {
        TrainingArguments {
            output_dir:                  hp.model_dir.clone(),
            num_train_epochs:            hp.epochs,
            per_device_train_batch_size: hp.train_batch_size,
            per_device_eval_batch_size:  hp.eval_batch_size,
            warmup_steps:                hp.warmup_steps,
            evaluation_strategy:         EvaluationStrategy::Epoch,
            logging_dir:                 hp.logging_dir(),
            learning_rate:               hp.learning_rate,
            weight_decay:                hp.weight_decay,
            max_grad_norm:               hp.max_grad_norm,
            logging_steps:               hp.logging_steps,
            seed:                        hp.seed,
        }
    }
}

/// Progress of a run, serialized into every checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerState {
    pub epoch:       f64,
    pub global_step: usize,
    pub log_history: Vec<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOutput {
    pub global_step:   usize,
    pub training_loss: f64,
}

pub struct Trainer<B: AutodiffBackend> {
    model:           TextClassifier<B>,
    config:          PretrainedConfig,
    tokenizer:       Tokenizer,
    pad_id:          u32,
    args:            TrainingArguments,
    train_dataset:   Arc<ClassificationDataset>,
    eval_dataset:    Arc<ClassificationDataset>,
    compute_metrics: MetricsFn,
    device:          B::Device,
    state:           TrainerState,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(
        pretrained:    PretrainedModel<B>,
        args:          TrainingArguments,
        train_dataset: Arc<ClassificationDataset>,
        eval_dataset:  Arc<ClassificationDataset>,
        device:        B::Device,
    ) -> Self {
        let pad_id = pretrained.pad_id();
        Self {
            model:           pretrained.model,
            config:          pretrained.config,
            tokenizer:       pretrained.tokenizer,
            pad_id,
            args,
            train_dataset,
            eval_dataset,
            compute_metrics,
            device,
            state:           TrainerState::default(),
        }
    }

    /// Replace the metrics callback run after every evaluation pass.
    pub fn with_compute_metrics(mut self, f: MetricsFn) -> Self {
        self.compute_metrics = f;
        self
    }

    pub fn state(&self) -> &TrainerState {
        &self.state
    }

    pub fn train(&mut self) -> Result<TrainOutput> {
        let args = self.args.clone();
        if args.per_device_train_batch_size == 0 || args.per_device_eval_batch_size == 0 {
            return Err(anyhow!("batch sizes must be positive"));
        }

        let train_batcher = ClassificationBatcher::<B>::new(self.device.clone(), self.pad_id);
        let train_loader  = DataLoaderBuilder::new(train_batcher)
            .batch_size(args.per_device_train_batch_size)
            .shuffle(args.seed)
            .num_workers(1)
            .build(self.train_dataset.clone());

        let steps_per_epoch = self
            .train_dataset
            .sample_count()
            .div_ceil(args.per_device_train_batch_size);
        let total_steps = steps_per_epoch * args.num_train_epochs;
        let schedule    = LinearWarmupSchedule::new(args.learning_rate, args.warmup_steps, total_steps);

        let grad_clipping = (args.max_grad_norm > 0.0)
            .then(|| GradientClippingConfig::Norm(args.max_grad_norm as f32));
        let mut optim = AdamWConfig::new()
            .with_weight_decay(args.weight_decay as f32)
            .with_grad_clipping(grad_clipping)
            .init();

        let checkpoints = CheckpointManager::new(&args.output_dir);
        let metrics_log = MetricsLogger::new(&args.logging_dir)?;
        tracing::debug!("Epoch metrics go to '{}'", metrics_log.csv_path().display());

        tracing::info!("***** Running training *****");
        tracing::info!("  Num examples = {}", self.train_dataset.sample_count());
        tracing::info!("  Num epochs = {}", args.num_train_epochs);
        tracing::info!("  Batch size = {}", args.per_device_train_batch_size);
        tracing::info!("  Total optimization steps = {}", total_steps);

        let mut model         = self.model.clone();
        let mut run_loss_sum  = 0.0f64;
        let mut run_steps     = 0usize;

        for epoch in 1..=args.num_train_epochs {
            let mut epoch_loss_sum = 0.0f64;
            let mut epoch_batches  = 0usize;

            for batch in train_loader.iter() {
                let lr = schedule.lr_at(self.state.global_step);

                let output = model.forward_classification(
                    batch.input_ids,
                    batch.attention_mask,
                    batch.labels,
                );
                let loss_val: f64 = output.loss.clone().into_scalar().elem::<f64>();
                if !loss_val.is_finite() {
                    return Err(anyhow!(
                        "training loss diverged at step {}: {}",
                        self.state.global_step,
                        loss_val
                    ));
                }
                epoch_loss_sum += loss_val;
                epoch_batches  += 1;

                let grads = output.loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(lr, model, grads);

                self.state.global_step += 1;
                let step = self.state.global_step;
                if args.logging_steps > 0 && step % args.logging_steps == 0 {
                    let fractional_epoch = (epoch - 1) as f64
                        + epoch_batches as f64 / steps_per_epoch.max(1) as f64;
                    tracing::info!("step {} | loss={:.4} | lr={:.3e}", step, loss_val, lr);
                    self.state.log_history.push(BTreeMap::from([
                        ("epoch".to_string(),         fractional_epoch),
                        ("learning_rate".to_string(), lr),
                        ("loss".to_string(),          loss_val),
                        ("step".to_string(),          step as f64),
                    ]));
                }
            }

            run_loss_sum += epoch_loss_sum;
            run_steps    += epoch_batches;
            self.state.epoch = epoch as f64;

            let avg_train_loss = if epoch_batches > 0 {
                epoch_loss_sum / epoch_batches as f64
            } else { f64::NAN };

            match args.evaluation_strategy {
                EvaluationStrategy::Epoch => {
                    let eval = self.evaluation_loop(&model.valid(), self.eval_dataset.clone())?;
                    tracing::info!(
                        "Epoch {:>3}/{} | train_loss={:.4} | eval_loss={:.4} | accuracy={:.4} | f1={:.4}",
                        epoch, args.num_train_epochs, avg_train_loss,
                        eval.get("loss").copied().unwrap_or(f64::NAN),
                        eval.get("accuracy").copied().unwrap_or(f64::NAN),
                        eval.get("f1").copied().unwrap_or(f64::NAN),
                    );
                    metrics_log.log(&EpochMetrics::from_eval(epoch, avg_train_loss, &eval))?;

                    let mut entry = eval;
                    entry.insert("step".to_string(), self.state.global_step as f64);
                    self.state.log_history.push(entry);
                }
            }

            let dir = checkpoints.save_checkpoint(
                &model,
                &self.config,
                &self.tokenizer,
                self.state.global_step,
                &self.state,
            )?;
            tracing::info!("Checkpoint saved to '{}'", dir.display());
        }

        self.model = model;

        let training_loss = if run_steps > 0 { run_loss_sum / run_steps as f64 } else { f64::NAN };
        tracing::info!("Training complete! global_step={} training_loss={:.4}", self.state.global_step, training_loss);
        Ok(TrainOutput { global_step: self.state.global_step, training_loss })
    }

    /// Forward-only pass over `dataset`; returns the callback's metrics
    /// plus `loss`, `runtime`, `samples_per_second` and `epoch`.
    pub fn evaluate(&self, dataset: &Arc<ClassificationDataset>) -> Result<Metrics> {
        self.evaluation_loop(&self.model.valid(), dataset.clone())
    }

    fn evaluation_loop(
        &self,
        model:   &TextClassifier<B::InnerBackend>,
        dataset: Arc<ClassificationDataset>,
    ) -> Result<Metrics> {
        let eval_batcher = ClassificationBatcher::<B::InnerBackend>::new(self.device.clone(), self.pad_id);
        let eval_loader  = DataLoaderBuilder::new(eval_batcher)
            .batch_size(self.args.per_device_eval_batch_size)
            .num_workers(1)
            .build(dataset);

        let started = Instant::now();
        let mut predictions: Vec<Vec<f32>> = Vec::new();
        let mut labels:      Vec<usize>    = Vec::new();
        let mut loss_sum = 0.0f64;

        for batch in eval_loader.iter() {
            let batch_len = batch.label_ids.len();
            let output = model.forward_classification(
                batch.input_ids,
                batch.attention_mask,
                batch.labels,
            );
            loss_sum += output.loss.into_scalar().elem::<f64>() * batch_len as f64;

            let [_, num_labels] = output.logits.dims();
            let flat: Vec<f32> = output
                .logits
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| anyhow!("cannot read logits: {e:?}"))?;
            predictions.extend(flat.chunks(num_labels.max(1)).map(<[f32]>::to_vec));
            labels.extend(batch.label_ids);
        }

        let runtime = started.elapsed().as_secs_f64();
        let count   = labels.len();

        let mut result = (self.compute_metrics)(&predictions, &labels);
        result.insert(
            "loss".to_string(),
            if count > 0 { loss_sum / count as f64 } else { f64::NAN },
        );
        result.insert("runtime".to_string(), round4(runtime));
        result.insert(
            "samples_per_second".to_string(),
            if runtime > 0.0 { round4(count as f64 / runtime) } else { 0.0 },
        );
        result.insert("epoch".to_string(), self.state.epoch);
        Ok(result)
    }

    /// Write the fine-tuned model to `dir` in a layout the model hub resolves.
    pub fn save_model(&self, dir: &Path) -> Result<()> {
        save_pretrained(dir, &self.model, &self.config, &self.tokenizer)?;
        write_json(&dir.join(TRAINING_ARGS_FILE), &self.args)?;
        tracing::info!("Model saved to '{}'", dir.display());
        Ok(())
    }
}

fn round4(x: f64) -> f64 {
    (x * 1e4).round() / 1e4
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::ClassificationSample;
    use crate::infra::model_hub::{ModelFiles, CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE};
    use crate::test_util::write_model_dir;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn dataset() -> Arc<ClassificationDataset> {
        let samples = (0..8)
            .map(|i| ClassificationSample {
                input_ids:      vec![2, 4 + (i % 2) as u32, 6, 3],
                attention_mask: vec![1, 1, 1, 1],
                label:          (i % 2) as usize,
            })
            .collect();
        Arc::new(ClassificationDataset::new(samples))
    }

    fn args(root: &Path) -> TrainingArguments {
        TrainingArguments {
            output_dir:                  root.join("model"),
            num_train_epochs:            2,
            per_device_train_batch_size: 4,
            per_device_eval_batch_size:  3,
            warmup_steps:                1,
            evaluation_strategy:         EvaluationStrategy::Epoch,
            logging_dir:                 root.join("output/logs"),
            learning_rate:               1e-3,
            weight_decay:                0.0,
            max_grad_norm:               1.0,
            logging_steps:               1,
            seed:                        42,
        }
    }

    fn trainer(root: &Path) -> Trainer<TestBackend> {
        let model_dir = root.join("pretrained");
        write_model_dir(&model_dir);
        let device     = Default::default();
        let pretrained = ModelFiles::from_dir(&model_dir).unwrap().load::<TestBackend>(&device).unwrap();
        Trainer::new(pretrained, args(root), dataset(), dataset(), device)
    }

    #[test]
    fn training_args_follow_hyperparameters() {
        let hp = crate::test_util::hyperparameters(Path::new("/run"));
        let a  = TrainingArguments::from(&hp);
        assert_eq!(a.output_dir, hp.model_dir);
        assert_eq!(a.logging_dir, hp.output_data_dir.join("logs"));
        assert_eq!(a.evaluation_strategy, EvaluationStrategy::Epoch);
        assert_eq!(a.learning_rate, 5e-5);
    }

    #[test]
    fn evaluate_reports_metrics_and_framework_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let t   = trainer(tmp.path());

        let result = t.evaluate(&dataset()).unwrap();
        let keys: Vec<&str> = result.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["accuracy", "epoch", "f1", "loss", "precision", "recall", "runtime", "samples_per_second"]
        );
        for key in ["accuracy", "f1", "precision", "recall"] {
            assert!((0.0..=1.0).contains(&result[key]), "{key}");
        }
        assert!(result["loss"].is_finite());
        assert_eq!(result["epoch"], 0.0);
    }

    #[test]
    fn evaluate_is_deterministic() {
        let tmp = tempfile::tempdir().unwrap();
        let t   = trainer(tmp.path());
        let a   = t.evaluate(&dataset()).unwrap();
        let b   = t.evaluate(&dataset()).unwrap();
        for key in ["accuracy", "f1", "loss", "precision", "recall"] {
            assert_eq!(a[key].to_bits(), b[key].to_bits(), "{key}");
        }
    }

    #[test]
    fn custom_metrics_callback_is_used() {
        fn constant(_: &[Vec<f32>], labels: &[usize]) -> Metrics {
            Metrics::from([("seen".to_string(), labels.len() as f64)])
        }
        let tmp    = tempfile::tempdir().unwrap();
        let t      = trainer(tmp.path()).with_compute_metrics(constant);
        let result = t.evaluate(&dataset()).unwrap();
        assert_eq!(result["seen"], 8.0);
        assert!(!result.contains_key("accuracy"));
    }

    #[test]
    fn train_runs_epochs_logs_and_checkpoints() {
        let tmp   = tempfile::tempdir().unwrap();
        let mut t = trainer(tmp.path());

        let out = t.train().unwrap();
        // 8 samples / batch 4 = 2 steps per epoch, 2 epochs
        assert_eq!(out.global_step, 4);
        assert!(out.training_loss.is_finite());
        assert_eq!(t.state().epoch, 2.0);

        // 4 step entries + 2 epoch evaluations
        assert_eq!(t.state().log_history.len(), 6);

        let model_out = tmp.path().join("model");
        assert!(model_out.join("checkpoint-2").join(WEIGHTS_FILE).is_file());
        assert!(model_out.join("checkpoint-4").join("trainer_state.json").is_file());

        let csv = std::fs::read_to_string(tmp.path().join("output/logs/metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);

        let result = t.evaluate(&dataset()).unwrap();
        assert_eq!(result["epoch"], 2.0);
    }

    #[test]
    fn saved_model_contains_all_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let t   = trainer(tmp.path());
        let out = tmp.path().join("final");

        t.save_model(&out).unwrap();
        for file in [WEIGHTS_FILE, CONFIG_FILE, TOKENIZER_FILE, TRAINING_ARGS_FILE] {
            assert!(out.join(file).is_file(), "{file}");
        }
        assert!(ModelFiles::from_dir(&out).unwrap().weights.is_some());

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(TRAINING_ARGS_FILE)).unwrap()).unwrap();
        assert_eq!(saved["evaluation_strategy"], "epoch");
    }
}
