// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands:
//   list     registered task names with variant and data path
//   inspect  build one task and dump counts, metrics, instances
//   vocab    most frequent tokens of a task's train + val text
//
// Run flags (data dir, length cap, tokenizer) are shared by the
// commands that build a task, and override the JSON config file.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::config::RunOverrides;
use crate::domain::split::Split;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every registered task
    List,

    /// Build a task and print what it loaded
    Inspect(InspectArgs),

    /// Print the most frequent tokens of a task
    Vocab(VocabArgs),
}

/// Flags shared by every command that constructs a task
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// JSON run config; flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Root directory holding the corpora
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Maximum tokens per sentence, sentinels included
    #[arg(long)]
    pub max_seq_len: Option<usize>,

    /// HuggingFace tokenizer.json; whitespace splitting when absent
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Tokenizer identifier used for retokenized file names
    #[arg(long)]
    pub tokenizer_name: Option<String>,
}

impl From<&RunArgs> for RunOverrides {
    fn from(a: &RunArgs) -> Self {
        RunOverrides {
            data_dir:       a.data_dir.clone(),
            max_seq_len:    a.max_seq_len,
            tokenizer_file: a.tokenizer.clone(),
            tokenizer_name: a.tokenizer_name.clone(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum SplitArg {
    Train,
    Val,
    Test,
}

impl From<SplitArg> for Split {
    fn from(s: SplitArg) -> Self {
        match s {
            SplitArg::Train => Split::Train,
            SplitArg::Val   => Split::Val,
            SplitArg::Test  => Split::Test,
        }
    }
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Registered task name, e.g. `sts-b`
    #[arg(long)]
    pub task: String,

    /// Split to sample instances from
    #[arg(long, value_enum, default_value_t = SplitArg::Val)]
    pub split: SplitArg,

    /// Number of instances to print
    #[arg(long, default_value_t = 3)]
    pub show: usize,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Debug)]
pub struct VocabArgs {
    /// Registered task name
    #[arg(long)]
    pub task: String,

    /// Number of tokens to print
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    #[command(flatten)]
    pub run: RunArgs,
}
