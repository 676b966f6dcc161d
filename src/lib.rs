// ============================================================
// multitask-data
// ============================================================
// Task registry, dataset normalizers and metric aggregators for
// multi-task NLP training. Layers, outermost first:
//
//   Layer 1  cli/          — clap command surface (binary only)
//   Layer 2  application/  — run config + use cases
//   Layer 3  domain/       — Split, Instance, EdgeRecord, errors
//   Layer 4  data/         — file-format loaders
//   Layer 5  tasks/        — task variants + registry
//   Layer 6  infra/        — tokenizers + metric aggregators
//
// Reference: Rust Book §7 (Packages, Crates and Modules)

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod tasks;
pub mod infra;

pub use domain::{error::TaskError, instance::Instance, split::Split};
pub use tasks::{Task, TaskContext, TaskOptions, TaskRegistry};
