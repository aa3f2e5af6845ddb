// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The two seams where the recommender meets the outside world:
//
//   RatingSource  — where ratings and item metadata come from
//                   (CSV files today; a remote table tomorrow)
//   EmbeddingSink — where trained embeddings go
//                   (JSON files today; an upsert into a remote
//                    store owned by someone else)
//
// The application layer only sees these traits.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::rating::RatingRecord;

/// Per-item genre flags as ingested, keyed by external item id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemMetadata {
    /// Column names, in column order
    pub genre_names: Vec<String>,

    /// (item_id, one value per genre column)
    pub rows: Vec<(String, Vec<f32>)>,
}

// ─── RatingSource ─────────────────────────────────────────────────────────────
/// Anything that can hand over already-validated ratings and metadata.
pub trait RatingSource {
    fn load_ratings(&self) -> Result<Vec<RatingRecord>>;

    /// Item genre table. An empty `ItemMetadata` means the model runs
    /// with no content projection.
    fn load_item_metadata(&self) -> Result<ItemMetadata>;
}

/// An entity id and its embedding, ready to leave the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id:        String,
    pub embedding: Vec<f32>,
}

/// The content projection layer, exported so fold-in can also be done
/// outside this process. `weight` is [n_factors][n_genres].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreLayerRecord {
    pub name:        String,
    pub genre_names: Vec<String>,
    pub weight:      Vec<Vec<f32>>,
    pub bias:        Vec<f32>,
}

// ─── EmbeddingSink ────────────────────────────────────────────────────────────
/// Anything that can receive exported embeddings. Implementations
/// upsert by id; a full replace is also acceptable.
pub trait EmbeddingSink {
    fn upsert_items(&mut self, records: &[EmbeddingRecord]) -> Result<()>;
    fn upsert_users(&mut self, records: &[EmbeddingRecord]) -> Result<()>;
    fn upsert_genre_layer(&mut self, layer: &GenreLayerRecord) -> Result<()>;
}
