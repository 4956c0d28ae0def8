// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// Hyperparameters arrive as command-line flags (a managed
// training-job launcher passes them as `--name value`). Data,
// model and output locations plus the GPU count default to the
// launcher's environment variables.
//
// clap parses and type-checks the flags; `resolve` fills in the
// environment fallbacks and turns the result into the
// application-layer Hyperparameters.

use std::path::PathBuf;

use clap::Args;

use crate::domain::error::ConfigError;
use crate::domain::hyperparameters::Hyperparameters;

pub const ENV_OUTPUT_DATA_DIR: &str = "SM_OUTPUT_DATA_DIR";
pub const ENV_MODEL_DIR:       &str = "SM_MODEL_DIR";
pub const ENV_NUM_GPUS:        &str = "SM_NUM_GPUS";
pub const ENV_CHANNEL_TRAIN:   &str = "SM_CHANNEL_TRAIN";
pub const ENV_CHANNEL_TEST:    &str = "SM_CHANNEL_TEST";

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Number of full passes through the training data
    #[arg(long, default_value_t = 1)]
    pub epochs: usize,

    /// Per-device batch size for training
    #[arg(long = "train_batch_size", default_value_t = 32)]
    pub train_batch_size: usize,

    /// Per-device batch size for evaluation
    #[arg(long = "eval_batch_size", default_value_t = 64)]
    pub eval_batch_size: usize,

    /// Steps of linear learning-rate warmup
    #[arg(long = "warmup_steps", default_value_t = 500)]
    pub warmup_steps: usize,

    /// Model identifier: a local directory or a model hub repo id
    #[arg(long = "model_name")]
    pub model_name: Option<String>,

    /// Peak learning rate; decimal or exponent notation
    #[arg(long = "learning_rate", default_value = "5e-5")]
    pub learning_rate: String,

    /// Where eval_results.txt and logs go [env: SM_OUTPUT_DATA_DIR]
    #[arg(long = "output_data_dir")]
    pub output_data_dir: Option<PathBuf>,

    /// Where the fine-tuned model is saved [env: SM_MODEL_DIR]
    #[arg(long = "model_dir")]
    pub model_dir: Option<PathBuf>,

    /// Number of GPUs; 0 trains on the CPU [env: SM_NUM_GPUS]
    #[arg(long = "n_gpus")]
    pub n_gpus: Option<String>,

    /// Training collection directory [env: SM_CHANNEL_TRAIN]
    #[arg(long = "training_dir")]
    pub training_dir: Option<PathBuf>,

    /// Test collection directory [env: SM_CHANNEL_TEST]
    #[arg(long = "test_dir")]
    pub test_dir: Option<PathBuf>,

    /// Seed for shuffling the training data
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// AdamW weight decay
    #[arg(long = "weight_decay", default_value_t = 0.0)]
    pub weight_decay: f64,

    /// Gradient norm clipping threshold; 0 disables clipping
    #[arg(long = "max_grad_norm", default_value_t = 1.0)]
    pub max_grad_norm: f64,

    /// Log training loss every N optimizer steps; 0 disables
    #[arg(long = "logging_steps", default_value_t = 500)]
    pub logging_steps: usize,

    /// Truncate sequences to at most this many tokens
    #[arg(long = "max_seq_len")]
    pub max_seq_len: Option<usize>,

    /// Train only the classification head
    #[arg(long = "freeze_encoder")]
    pub freeze_encoder: bool,
}

fn required(
    flag:   Option<String>,
    name:   &'static str,
    env:    &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    flag.or_else(|| lookup(env))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingConfiguration {
            name,
            hint: format!("pass --{name} or set {env}"),
        })
}

fn required_path(
    flag:   Option<PathBuf>,
    name:   &'static str,
    env:    &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, ConfigError> {
    let flag = flag.map(|p| p.to_string_lossy().into_owned());
    required(flag, name, env, lookup).map(PathBuf::from)
}

/// Parse a learning rate such as "5e-5" or "0.0001"; must be finite and positive.
pub fn parse_learning_rate(raw: &str) -> Result<f64, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        name:   "learning_rate",
        value:  raw.to_string(),
        reason: reason.to_string(),
    };
    let lr: f64 = raw.trim().parse().map_err(|_| invalid("not a number"))?;
    if !lr.is_finite() || lr <= 0.0 {
        return Err(invalid("must be a finite positive number"));
    }
    Ok(lr)
}

impl TrainArgs {
    /// Resolve flags plus environment fallbacks into Hyperparameters.
    ///
    /// `lookup` reads one environment variable; main passes the
    /// process environment. Runs before any data is touched.
    pub fn resolve(
        self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Hyperparameters, ConfigError> {
        let output_data_dir = required_path(self.output_data_dir, "output_data_dir", ENV_OUTPUT_DATA_DIR, &lookup)?;
        let model_dir       = required_path(self.model_dir,       "model_dir",       ENV_MODEL_DIR,       &lookup)?;
        let n_gpus_raw      = required(self.n_gpus,               "n_gpus",          ENV_NUM_GPUS,        &lookup)?;
        let training_dir    = required_path(self.training_dir,    "training_dir",    ENV_CHANNEL_TRAIN,   &lookup)?;
        let test_dir        = required_path(self.test_dir,        "test_dir",        ENV_CHANNEL_TEST,    &lookup)?;

        let n_gpus = n_gpus_raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue {
                name:   "n_gpus",
                value:  n_gpus_raw.clone(),
                reason: "not a non-negative integer".to_string(),
            })?;

        let model_name = self
            .model_name
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ConfigError::MissingConfiguration {
                name: "model_name",
                hint: "pass --model_name".to_string(),
            })?;

        let learning_rate = parse_learning_rate(&self.learning_rate)?;

        for (name, value) in [
            ("train_batch_size", self.train_batch_size),
            ("eval_batch_size",  self.eval_batch_size),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    name,
                    value:  value.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        Ok(Hyperparameters {
            epochs:           self.epochs,
            train_batch_size: self.train_batch_size,
            eval_batch_size:  self.eval_batch_size,
            warmup_steps:     self.warmup_steps,
            model_name,
            learning_rate,
            output_data_dir,
            model_dir,
            n_gpus,
            training_dir,
            test_dir,
            seed:             self.seed,
            weight_decay:     self.weight_decay,
            max_grad_norm:    self.max_grad_norm,
            logging_steps:    self.logging_steps,
            max_seq_len:      self.max_seq_len,
            freeze_encoder:   self.freeze_encoder,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use std::collections::HashMap;

    fn parse(extra: &[&str]) -> TrainArgs {
        let mut argv = vec!["seqcls-finetune", "--model_name", "distilbert-base-uncased"];
        argv.extend_from_slice(extra);
        Cli::try_parse_from(argv).unwrap().args
    }

    fn launcher_env() -> HashMap<String, String> {
        HashMap::from([
            (ENV_OUTPUT_DATA_DIR.to_string(), "/opt/ml/output/data".to_string()),
            (ENV_MODEL_DIR.to_string(),       "/opt/ml/model".to_string()),
            (ENV_NUM_GPUS.to_string(),        "1".to_string()),
            (ENV_CHANNEL_TRAIN.to_string(),   "/opt/ml/input/data/train".to_string()),
            (ENV_CHANNEL_TEST.to_string(),    "/opt/ml/input/data/test".to_string()),
        ])
    }

    fn lookup(env: HashMap<String, String>) -> impl Fn(&str) -> Option<String> {
        move |k: &str| env.get(k).cloned()
    }

    #[test]
    fn defaults_and_environment() {
        let hp = parse(&[]).resolve(lookup(launcher_env())).unwrap();
        assert_eq!(hp.epochs, 1);
        assert_eq!(hp.train_batch_size, 32);
        assert_eq!(hp.eval_batch_size, 64);
        assert_eq!(hp.warmup_steps, 500);
        assert_eq!(hp.learning_rate, 0.00005);
        assert_eq!(hp.n_gpus, 1);
        assert_eq!(hp.model_dir, PathBuf::from("/opt/ml/model"));
        assert_eq!(hp.test_dir, PathBuf::from("/opt/ml/input/data/test"));
        assert!(!hp.freeze_encoder);
    }

    #[test]
    fn flags_override_environment() {
        let hp = parse(&[
            "--epochs", "3",
            "--train_batch_size", "16",
            "--learning_rate", "0.0003",
            "--model_dir", "/tmp/model",
        ])
        .resolve(lookup(launcher_env()))
        .unwrap();
        assert_eq!(hp.epochs, 3);
        assert_eq!(hp.train_batch_size, 16);
        assert_eq!(hp.learning_rate, 0.0003);
        assert_eq!(hp.model_dir, PathBuf::from("/tmp/model"));
    }

    #[test]
    fn learning_rate_is_always_finite_positive() {
        for raw in ["5e-5", "0.00005", "1E-3", " 2e-4 ", "1"] {
            let lr = parse_learning_rate(raw).unwrap();
            assert!(lr.is_finite() && lr > 0.0, "{raw}");
        }
        assert_eq!(parse_learning_rate("5e-5").unwrap(), 0.00005);
        for raw in ["abc", "", "0", "-1e-5", "inf", "NaN"] {
            assert!(parse_learning_rate(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn each_missing_env_var_is_fatal() {
        for var in [ENV_OUTPUT_DATA_DIR, ENV_MODEL_DIR, ENV_NUM_GPUS, ENV_CHANNEL_TRAIN, ENV_CHANNEL_TEST] {
            let mut env = launcher_env();
            env.remove(var);
            let err = parse(&[]).resolve(lookup(env)).unwrap_err();
            match err {
                ConfigError::MissingConfiguration { hint, .. } => assert!(hint.contains(var)),
                other => panic!("unexpected error for {var}: {other}"),
            }
        }
    }

    #[test]
    fn missing_model_name_is_fatal() {
        let args = Cli::try_parse_from(["seqcls-finetune"]).unwrap().args;
        let err  = args.resolve(lookup(launcher_env())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfiguration { name: "model_name", .. }));
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        assert!(Cli::try_parse_from(["seqcls-finetune", "--epochs", "two"]).is_err());

        let mut env = launcher_env();
        env.insert(ENV_NUM_GPUS.to_string(), "many".to_string());
        let err = parse(&[]).resolve(lookup(env)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "n_gpus", .. }));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = parse(&["--eval_batch_size", "0"]).resolve(lookup(launcher_env())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "eval_batch_size", .. }));
    }
}
