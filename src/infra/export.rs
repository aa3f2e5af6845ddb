// ============================================================
// Layer 6 — Embedding Export
// ============================================================
// Turns a trained model into plain records and hands them to an
// EmbeddingSink:
//
//   items       → projected item vector (factor + content term)
//   users       → user latent factor row
//   genre layer → content projection, weight as [n_factors][n_genres]
//
// Nothing leaves here with a NaN or Inf in it: every value goes
// through `ml::sanitize_logged`, which zeroes them and logs how many
// it hit.
//
// JsonDirSink is the file-backed sink: one JSON array per table,
// written atomically into an output directory.

use anyhow::{Context, Result};
use burn::prelude::*;
use std::path::PathBuf;

use crate::data::content::ContentMatrix;
use crate::domain::entity_index::EntityIndex;
use crate::domain::error::RecResult;
use crate::domain::traits::{EmbeddingRecord, EmbeddingSink, GenreLayerRecord};
use crate::infra::checkpoint::write_atomic;
use crate::ml::model::HybridMfModel;
use crate::ml::parameters::DenseMatrix;
use crate::ml::{sanitize_logged, to_vec_f32};

pub const GENRE_LAYER_NAME: &str = "genre_projection";

/// One record per matrix row, keyed by the index's ids.
fn rows_to_records(what: &str, index: &EntityIndex, mut matrix: DenseMatrix) -> Vec<EmbeddingRecord> {
    sanitize_logged(what, &mut matrix.values);
    index
        .ids()
        .iter()
        .enumerate()
        .map(|(i, id)| EmbeddingRecord { id: id.clone(), embedding: matrix.row(i).to_vec() })
        .collect()
}

/// Projected embedding for every catalog item.
pub fn item_records<B: Backend>(
    model:   &HybridMfModel<B>,
    items:   &EntityIndex,
    content: &ContentMatrix,
) -> RecResult<Vec<EmbeddingRecord>> {
    content.check_shape(model.n_items(), model.n_genres())?;

    let device  = model.device();
    let n_items = model.n_items();
    let ids: Vec<i32> = (0..n_items as i32).collect();
    let items_t   = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &device);
    let content_t = (content.n_genres() > 0).then(|| {
        Tensor::<B, 1>::from_floats(content.as_slice(), &device).reshape([n_items, content.n_genres()])
    });

    let projected = to_vec_f32(model.projected_items(items_t, content_t))?;
    let matrix    = DenseMatrix::new(n_items, model.n_factors, projected)?;
    Ok(rows_to_records("item embeddings", items, matrix))
}

/// Latent factor row for every trained user.
pub fn user_records<B: Backend>(model: &HybridMfModel<B>, users: &EntityIndex) -> RecResult<Vec<EmbeddingRecord>> {
    let values = to_vec_f32(model.user_factors.weight.val())?;
    let matrix = DenseMatrix::new(model.n_users(), model.n_factors, values)?;
    Ok(rows_to_records("user embeddings", users, matrix))
}

/// The content projection, or `None` for a pure collaborative model.
pub fn genre_layer_record<B: Backend>(
    model:       &HybridMfModel<B>,
    genre_names: &[String],
) -> RecResult<Option<GenreLayerRecord>> {
    let params = model.parameters()?;
    let (Some(weight), Some(mut bias)) = (params.content_weight, params.content_bias) else {
        return Ok(None);
    };

    // Stored input-major; exported output-major.
    let mut weight = weight.transposed();
    sanitize_logged("genre layer weight", &mut weight.values);
    sanitize_logged("genre layer bias", &mut bias);

    Ok(Some(GenreLayerRecord {
        name:        GENRE_LAYER_NAME.to_string(),
        genre_names: genre_names.to_vec(),
        weight:      (0..weight.rows).map(|r| weight.row(r).to_vec()).collect(),
        bias,
    }))
}

// ─── JsonDirSink ──────────────────────────────────────────────────────────────
/// Writes each table as a JSON array into `dir`. Each call replaces
/// the whole file, which is an upsert of every id at once.
pub struct JsonDirSink {
    dir: PathBuf,
}

impl JsonDirSink {
    pub const ITEMS_FILE: &'static str       = "item_embeddings.json";
    pub const USERS_FILE: &'static str       = "user_embeddings.json";
    pub const GENRE_LAYER_FILE: &'static str = "genre_layer.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write_json<T: serde::Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.dir.join(file);
        let json = serde_json::to_vec_pretty(value)
            .with_context(|| format!("Cannot serialise '{}'", path.display()))?;
        write_atomic(&path, &json)?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(())
    }
}

impl EmbeddingSink for JsonDirSink {
    fn upsert_items(&mut self, records: &[EmbeddingRecord]) -> Result<()> {
        self.write_json(Self::ITEMS_FILE, records)
    }

    fn upsert_users(&mut self, records: &[EmbeddingRecord]) -> Result<()> {
        self.write_json(Self::USERS_FILE, records)
    }

    fn upsert_genre_layer(&mut self, layer: &GenreLayerRecord) -> Result<()> {
        self.write_json(Self::GENRE_LAYER_FILE, layer)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::ml::model::HybridMfConfig;
    use crate::ml::parameters::ModelParameters;
    use crate::ml::sanitize;

    type TestBackend = NdArray;

    fn model(user_factors: Vec<f32>) -> HybridMfModel<TestBackend> {
        let params = ModelParameters {
            user_factors: DenseMatrix::new(2, 2, user_factors).unwrap(),
            item_factors: DenseMatrix::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap(),
            user_bias:    vec![0.0; 2],
            item_bias:    vec![0.0; 2],
            global_bias:  0.0,
            content_weight: Some(DenseMatrix::new(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap()),
            content_bias:   Some(vec![0.5, -0.5]),
        };
        HybridMfConfig::new(2, 2, 2)
            .with_n_genres(3)
            .with_genre_weight(2.0)
            .init_with::<TestBackend>(&params, &Default::default())
            .unwrap()
    }

    #[test]
    fn test_sanitize_counts_and_zeroes() {
        let mut v = vec![1.0, f32::NAN, f32::INFINITY, -2.0, f32::NEG_INFINITY];
        assert_eq!(sanitize(&mut v), 3);
        assert_eq!(v, vec![1.0, 0.0, 0.0, -2.0, 0.0]);
    }

    #[test]
    fn test_user_records_are_sanitized() {
        let m = model(vec![f32::NAN, 1.0, 2.0, f32::INFINITY]);
        let records = user_records(&m, &EntityIndex::build(["a", "b"])).unwrap();
        assert_eq!(records[0], EmbeddingRecord { id: "a".into(), embedding: vec![0.0, 1.0] });
        assert_eq!(records[1].embedding, vec![2.0, 0.0]);
    }

    #[test]
    fn test_item_records_use_projected_vectors() {
        // item 0: [1,2] + 2·(1·[1,2] + [0.5,-0.5]) = [4, 5]
        let m = model(vec![0.0; 4]);
        let content = ContentMatrix::from_rows(vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 0.0]], 3).unwrap();
        let records = item_records(&m, &EntityIndex::build(["x", "y"]), &content).unwrap();
        assert_eq!(records[0].embedding, vec![4.0, 5.0]);
        assert_eq!(records[1].embedding, vec![4.0, 3.0]);
    }

    #[test]
    fn test_genre_layer_is_output_major() {
        let m     = model(vec![0.0; 4]);
        let names = vec!["g0".to_string(), "g1".to_string(), "g2".to_string()];
        let layer = genre_layer_record(&m, &names).unwrap().unwrap();
        assert_eq!(layer.weight, vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
        assert_eq!(layer.bias, vec![0.5, -0.5]);
        assert_eq!(layer.genre_names, names);
    }

    #[test]
    fn test_json_dir_sink_writes_files() {
        let dir      = tempfile::tempdir().unwrap();
        let mut sink = JsonDirSink::new(dir.path());
        let records  = vec![EmbeddingRecord { id: "x".into(), embedding: vec![1.0, 2.0] }];
        sink.upsert_items(&records).unwrap();

        let text = std::fs::read_to_string(dir.path().join(JsonDirSink::ITEMS_FILE)).unwrap();
        let back: Vec<EmbeddingRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, records);
    }
}
