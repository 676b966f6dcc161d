// ============================================================
// Layer 4 — Record Normalizers
// ============================================================
// This layer turns raw dataset files into normalized in-memory
// (or streamed) splits. Nothing here knows about tasks; tasks
// pick the loader that matches their format.
//
//   delimited rows ──► tsv / diagnostic ──► ColumnarSplit ──► dataset
//   JSON lines     ──► jsonl             ──► EdgeRecord stream
//   sentence files ──► lines             ──► lazy String stream
//   caption files  ──► captions          ──► CaptionSplit
//
// Each module is responsible for exactly one format.
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Lossy UTF-8 line streams and line counting
pub mod lines;

/// Parallel token columns + targets, truncation
pub mod columnar;

/// Configurable delimited-row loader
pub mod tsv;

/// Four-dimension tagged NLI diagnostic set
pub mod diagnostic;

/// JSON-lines span/edge record stream
pub mod jsonl;

/// Caption → image id loaders for grounded tasks
pub mod captions;

/// Row → Instance and the Burn Dataset adapter
pub mod dataset;
