// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for the launcher. One invocation = one training
// run; there are no subcommands. All work is delegated to
// Layer 2 (application).
//
// Launchers pass every job hyperparameter as `--name value`,
// including ones this program has no use for (`--fp16 true`).
// Those are set aside before clap sees the arguments and are
// logged, not rejected.

pub mod commands;

use std::ffi::OsString;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use commands::TrainArgs;

#[derive(Parser, Debug)]
#[command(
    name = "seqcls-finetune",
    version,
    about = "Fine-tune a pretrained sequence-classification model and write eval metrics."
)]
pub struct Cli {
    #[command(flatten)]
    pub args: TrainArgs,

    /// Arguments set aside by `parse_known`
    #[arg(skip)]
    pub ignored: Vec<String>,
}

impl Cli {
    /// Parse the process arguments, ignoring flags this program does not define.
    pub fn parse_known() -> Self {
        let (known, ignored) = split_known_args(std::env::args_os());
        Self { ignored, ..Self::parse_from(known) }
    }

    pub fn try_parse_known_from<I, T>(argv: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let (known, ignored) = split_known_args(argv);
        Ok(Self { ignored, ..Self::try_parse_from(known)? })
    }

    /// Resolve the configuration, then hand off to the training use case.
    /// Configuration errors surface here, before any dataset is opened.
    pub fn run(self) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        if !self.ignored.is_empty() {
            tracing::warn!("Ignoring unrecognised arguments: {}", self.ignored.join(" "));
        }
        let hp = self
            .args
            .resolve(|key| std::env::var(key).ok())?;
        hp.log_resolved();

        TrainUseCase::new(hp).execute()
    }
}

/// Split `argv` into what clap knows and unknown `--flag [value]` groups.
///
/// An unknown flag swallows the next token as its value unless that
/// token is itself a `--` flag or the flag was written `--flag=value`.
fn split_known_args<I, T>(argv: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let command = Cli::command();
    // Some(takes_value) for a defined flag, None for an unknown one
    let lookup = |name: &str| -> Option<bool> {
        if matches!(name, "help" | "version") {
            return Some(false);
        }
        command
            .get_arguments()
            .find(|a| a.get_long() == Some(name))
            .map(|a| a.get_action().takes_values())
    };

    let mut argv = argv
        .into_iter()
        .map(|a| a.into().to_string_lossy().into_owned())
        .peekable();
    let mut known   = argv.next().into_iter().collect::<Vec<_>>();
    let mut ignored = Vec::new();

    while let Some(arg) = argv.next() {
        let Some(flag) = arg.strip_prefix("--").filter(|f| !f.is_empty()) else {
            known.push(arg);
            continue;
        };
        let (name, inline) = match flag.split_once('=') {
            Some((name, _)) => (name, true),
            None => (flag, false),
        };

        match lookup(name) {
            Some(takes_value) => {
                let value = (takes_value && !inline).then(|| argv.next()).flatten();
                known.push(arg);
                known.extend(value);
            }
            None => {
                let value = if inline { None } else { argv.next_if(|v| !v.starts_with("--")) };
                ignored.push(arg);
                ignored.extend(value);
            }
        }
    }
    (known, ignored)
}
