// ============================================================
// Layer 2 — Export Use Case
// ============================================================
// Pushes every embedding of a trained model through an
// EmbeddingSink:
//
//   Step 1: Load checkpoint               (Layer 6 - infra)
//   Step 2: Item + user embeddings        (Layer 6 - infra)
//   Step 3: Genre layer, if the model has one
//   Step 4: Upsert into the sink

use anyhow::Result;
use burn::prelude::*;

use crate::domain::traits::EmbeddingSink;
use crate::infra::{
    checkpoint::CheckpointManager,
    export::{genre_layer_record, item_records, user_records},
};
use crate::ml::{inferencer::Inferencer, InferBackend};

/// What was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub items:       usize,
    pub users:       usize,
    pub genre_layer: bool,
}

pub struct ExportUseCase {
    checkpoint_dir: String,
}

impl ExportUseCase {
    pub fn new(checkpoint_dir: impl Into<String>) -> Self {
        Self { checkpoint_dir: checkpoint_dir.into() }
    }

    pub fn execute(&self, sink: &mut dyn EmbeddingSink) -> Result<ExportSummary> {
        let ckpt       = CheckpointManager::new(&self.checkpoint_dir);
        let inferencer = Inferencer::<InferBackend>::from_checkpoint(&ckpt, &Default::default())?;
        export_all(&inferencer, sink)
    }
}

/// Export everything `inferencer` holds into `sink`.
pub fn export_all<B: Backend>(inferencer: &Inferencer<B>, sink: &mut dyn EmbeddingSink) -> Result<ExportSummary> {
    let model = inferencer.model();

    let items = item_records(model, inferencer.items(), inferencer.content())?;
    let users = user_records(model, inferencer.users())?;
    sink.upsert_items(&items)?;
    sink.upsert_users(&users)?;
    tracing::info!("Exported {} item and {} user embeddings", items.len(), users.len());

    let layer = genre_layer_record(model, inferencer.genre_names())?;
    if let Some(layer) = &layer {
        sink.upsert_genre_layer(layer)?;
        tracing::info!("Exported genre layer over {} genres", layer.genre_names.len());
    }

    Ok(ExportSummary { items: items.len(), users: users.len(), genre_layer: layer.is_some() })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::data::content::ContentMatrix;
    use crate::domain::entity_index::EntityIndex;
    use crate::domain::traits::{EmbeddingRecord, GenreLayerRecord};
    use crate::infra::checkpoint::Checkpoint;
    use crate::infra::export::JsonDirSink;
    use crate::ml::model::HybridMfConfig;

    #[derive(Default)]
    struct CollectingSink {
        items: Vec<EmbeddingRecord>,
        users: Vec<EmbeddingRecord>,
        layer: Option<GenreLayerRecord>,
    }

    impl EmbeddingSink for CollectingSink {
        fn upsert_items(&mut self, records: &[EmbeddingRecord]) -> Result<()> {
            self.items.extend_from_slice(records);
            Ok(())
        }

        fn upsert_users(&mut self, records: &[EmbeddingRecord]) -> Result<()> {
            self.users.extend_from_slice(records);
            Ok(())
        }

        fn upsert_genre_layer(&mut self, layer: &GenreLayerRecord) -> Result<()> {
            self.layer = Some(layer.clone());
            Ok(())
        }
    }

    fn checkpoint(n_genres: usize) -> Checkpoint {
        let device = Default::default();
        let model  = HybridMfConfig::new(2, 3, 4)
            .with_n_genres(n_genres)
            .init::<NdArray>(3.0, &device)
            .unwrap();
        let names: Vec<String> = (0..n_genres).map(|g| format!("g{g}")).collect();
        Checkpoint::capture(
            &model,
            &EntityIndex::build(["u1", "u2"]),
            &EntityIndex::build(["a", "b", "c"]),
            &ContentMatrix::zeros(3, n_genres),
            &names,
            3.0,
        )
        .unwrap()
    }

    #[test]
    fn test_exports_every_entity_and_the_genre_layer() {
        let inferencer = Inferencer::<NdArray>::from_checkpoint_data(checkpoint(2), &Default::default()).unwrap();
        let mut sink   = CollectingSink::default();
        let summary    = export_all(&inferencer, &mut sink).unwrap();

        assert_eq!(summary, ExportSummary { items: 3, users: 2, genre_layer: true });
        assert_eq!(sink.items.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(sink.users.iter().all(|r| r.embedding.len() == 4));

        let layer = sink.layer.unwrap();
        assert_eq!(layer.weight.len(), 4);
        assert!(layer.weight.iter().all(|row| row.len() == 2));
    }

    #[test]
    fn test_pure_collaborative_model_has_no_genre_layer() {
        let inferencer = Inferencer::<NdArray>::from_checkpoint_data(checkpoint(0), &Default::default()).unwrap();
        let mut sink   = CollectingSink::default();
        let summary    = export_all(&inferencer, &mut sink).unwrap();
        assert!(!summary.genre_layer);
        assert!(sink.layer.is_none());
    }

    #[test]
    fn test_execute_reads_checkpoint_dir() {
        let dir = tempfile::tempdir().unwrap();
        CheckpointManager::new(dir.path()).save(&checkpoint(1)).unwrap();

        let out      = dir.path().join("export");
        let mut sink = JsonDirSink::new(&out);
        let summary  = ExportUseCase::new(dir.path().to_string_lossy()).execute(&mut sink).unwrap();
        assert_eq!(summary.items, 3);
        assert!(out.join(JsonDirSink::ITEMS_FILE).exists());
        assert!(out.join(JsonDirSink::USERS_FILE).exists());
        assert!(out.join(JsonDirSink::GENRE_LAYER_FILE).exists());
    }
}
