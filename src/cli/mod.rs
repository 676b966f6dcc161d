// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with `clap` and routes each subcommand to
// Layer 2. This is the only layer that prints.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, InspectArgs, RunArgs, VocabArgs};

use crate::application::{
    config::RunConfig,
    inspect_use_case::InspectUseCase,
};
use crate::tasks::TaskRegistry;

#[derive(Parser, Debug)]
#[command(
    name = "multitask-data",
    version = "0.1.0",
    about = "Inspect the multi-task NLP task registry and its datasets."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let registry = TaskRegistry::builtin();
        match self.command {
            Commands::List          => run_list(&registry),
            Commands::Inspect(args) => run_inspect(&registry, args),
            Commands::Vocab(args)   => run_vocab(&registry, args),
        }
    }
}

fn use_case<'r>(registry: &'r TaskRegistry, run: &RunArgs) -> Result<InspectUseCase<'r>> {
    let config = RunConfig::resolve(run.config.as_deref(), run.into())?;
    tracing::info!("Data directory: {}", config.data_dir.display());
    Ok(InspectUseCase::new(registry, config.task_context()?))
}

fn run_list(registry: &TaskRegistry) -> Result<()> {
    for entry in registry.entries() {
        println!("{:<30} {:<18} {}", entry.name, entry.definition.kind_name(), entry.rel_path);
    }
    println!("\n{} tasks", registry.len());
    Ok(())
}

fn run_inspect(registry: &TaskRegistry, args: InspectArgs) -> Result<()> {
    let report = use_case(registry, &args.run)?.inspect(&args.task, args.split.into(), args.show)?;
    let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
    println!("{json}");
    Ok(())
}

fn run_vocab(registry: &TaskRegistry, args: VocabArgs) -> Result<()> {
    let ranked = use_case(registry, &args.run)?.vocab(&args.task, args.top)?;
    for (rank, (token, count)) in ranked.iter().enumerate() {
        println!("{:>5}  {:<24} {}", rank + 1, token, count);
    }
    Ok(())
}
