// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Runs one fine-tuning job as a strictly linear sequence:
//
//   Step 1: Load train/test collections   (Layer 4 - data)
//   Step 2: Resolve model + tokenizer     (Layer 6 - infra)
//   Step 3: Report trainable parameters   (Layer 5 - ml)
//   Step 4: Tokenize / validate samples   (Layer 4 - data)
//   Step 5: Train, timing the call        (Layer 5 - ml)
//   Step 6: Evaluate on the test set      (Layer 5 - ml)
//   Step 7: Write eval_results.txt        (Layer 6 - infra)
//   Step 8: Save the fine-tuned model     (Layer 6 - infra)
//
// The first error at any step ends the run. Step 6 repeats the
// evaluation the Trainer already did at the last epoch end; its
// result is the one written in step 7.

use std::time::Instant;

use anyhow::{Context, Result};
use burn::{
    backend::{
        ndarray::NdArrayDevice,
        wgpu::WgpuDevice,
        Autodiff, NdArray, Wgpu,
    },
    tensor::backend::AutodiffBackend,
};

use crate::data::{dataset::ClassificationDataset, loader::DiskDataset};
use crate::domain::hyperparameters::Hyperparameters;
use crate::infra::{model_hub::ModelHub, results::write_eval_results};
use crate::ml::{
    metrics::compute_metrics,
    params::ParameterCount,
    trainer::{Trainer, TrainingArguments},
};

type GpuBackend = Autodiff<Wgpu>;
type CpuBackend = Autodiff<NdArray>;

pub struct TrainUseCase {
    config: Hyperparameters,
}

impl TrainUseCase {
    pub fn new(config: Hyperparameters) -> Self {
        Self { config }
    }

    /// Pick the device from the GPU count and run the pipeline on it.
    pub fn execute(&self) -> Result<()> {
        if self.config.n_gpus > 0 {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            self.run::<GpuBackend>(device)
        } else {
            tracing::info!("Using CPU (ndarray) backend");
            self.run::<CpuBackend>(NdArrayDevice::Cpu)
        }
    }

    fn run<B: AutodiffBackend>(&self, device: B::Device) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Load datasets ─────────────────────────────────────────────
        let train_disk = DiskDataset::load_from_disk(&cfg.training_dir)
            .with_context(|| format!("loading training data from '{}'", cfg.training_dir.display()))?;
        let test_disk = DiskDataset::load_from_disk(&cfg.test_dir)
            .with_context(|| format!("loading test data from '{}'", cfg.test_dir.display()))?;

        tracing::info!(" loaded train_dataset length is: {}", train_disk.len());
        tracing::info!(" loaded test_dataset length is: {}", test_disk.len());
        tracing::debug!(
            "train from '{}', test from '{}'",
            train_disk.path().display(),
            test_disk.path().display()
        );

        // ── Step 2: Resolve model and tokenizer ───────────────────────────────
        let files = ModelHub::from_env()
            .resolve(&cfg.model_name)
            .with_context(|| format!("resolving model '{}'", cfg.model_name))?;
        let mut pretrained = files
            .load::<B>(&device)
            .with_context(|| format!("loading model '{}'", cfg.model_name))?;

        if cfg.freeze_encoder {
            pretrained.model = pretrained.model.freeze_encoder();
            tracing::info!("Encoder frozen; only the classification head will be updated");
        }

        // ── Step 3: Trainable-parameter report ────────────────────────────────
        println!("{}", ParameterCount::of(&pretrained.model));

        // ── Step 4: Model-ready datasets ──────────────────────────────────────
        let limits = pretrained.dataset_limits(cfg.max_seq_len);
        let train_dataset = ClassificationDataset::build(&train_disk, &pretrained.tokenizer, limits)
            .context("preparing training samples")?
            .into_shared();
        let test_dataset = ClassificationDataset::build(&test_disk, &pretrained.tokenizer, limits)
            .context("preparing test samples")?
            .into_shared();

        // ── Step 5: Train ─────────────────────────────────────────────────────
        let args = TrainingArguments::from(cfg);
        let mut trainer = Trainer::new(pretrained, args, train_dataset, test_dataset.clone(), device)
            .with_compute_metrics(compute_metrics);

        let start_time = Instant::now();
        let output = trainer.train()?;
        println!("EXEC TIME: {}", start_time.elapsed().as_secs_f64());
        tracing::info!(
            "train_loss={:.4} after {} steps",
            output.training_loss,
            output.global_step
        );

        // ── Step 6: Final evaluation ──────────────────────────────────────────
        tracing::info!("Evaluating on the test set after epoch {}", trainer.state().epoch);
        let eval_result = trainer.evaluate(&test_dataset)?;

        // ── Step 7: Results file ──────────────────────────────────────────────
        let results_path = write_eval_results(&cfg.output_data_dir, &eval_result)?;
        tracing::info!("Eval results written to '{}'", results_path.display());

        // ── Step 8: Save model ────────────────────────────────────────────────
        trainer.save_model(&cfg.model_dir)?;

        Ok(())
    }
}
