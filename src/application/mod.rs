// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Drives tasks for the binary. Nothing here parses files or
// computes metrics; it builds a context from the run config,
// asks the registry for a task and gathers what the task
// reports.
//
// Rules for this layer:
//   - No printing (that's Layer 1)
//   - No file formats (that's Layer 4)
//
// Reference: Rust Book §7 (Module System)

// Run configuration: JSON file + CLI overrides
pub mod config;

// Build a task and report counts, metrics and sample instances
pub mod inspect_use_case;
