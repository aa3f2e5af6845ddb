// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// goal per use case.
//
// Rules for this layer:
//   - No tensor maths or model code here
//   - No printing here (that's Layer 1)
//   - File access only through Layer 4 sources and Layer 6 stores
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Load → split → index → train → checkpoint
pub mod train_use_case;

// Trained-user recommendations and cold-start fold-in
pub mod recommend_use_case;

// Checkpoint → embeddings → EmbeddingSink
pub mod export_use_case;
