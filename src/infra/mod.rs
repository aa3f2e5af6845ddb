// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the other
// layers:
//
//   checkpoint.rs — versioned JSON checkpoint of the trained model
//                   plus the id indices and content matrix needed
//                   to use it; atomic replace on every save.
//                   Also saves/loads TrainConfig as JSON.
//
//   metrics.rs    — one CSV row per training epoch
//
//   export.rs     — model → embedding records → EmbeddingSink,
//                   with NaN/Inf scrubbed on the way out;
//                   JsonDirSink writes them as JSON files
//
// Reference: Rust Book §9 (Error Handling with anyhow)

/// Versioned checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Embedding export and the JSON directory sink
pub mod export;
