// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load ratings + item metadata   (Layer 4 - data)
//   Step 2: Split train/validation         (Layer 4 - data)
//   Step 3: Build id indices from train    (Layer 3 - domain)
//   Step 4: Map both partitions to indices (Layer 3 - domain)
//   Step 5: Build content matrix           (Layer 4 - data)
//   Step 6: Build model                    (Layer 5 - ml)
//   Step 7: Save config, open metrics      (Layer 6 - infra)
//   Step 8: Run training loop              (Layer 5 - ml)
//
// Checkpoints are written from inside the loop, by the observer
// below, each time the evaluation RMSE improves.
//
// Reference: Burn Book §5 (Training)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use burn::{prelude::*, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};

use crate::data::{
    content::ContentMatrix,
    dataset::RatingDataset,
    loader::CsvRatingSource,
    splitter::split_train_val,
};
use crate::domain::{
    entity_index::EntityIndex,
    rating::{index_records, mean_rating},
    traits::RatingSource,
};
use crate::infra::{
    checkpoint::{Checkpoint, CheckpointManager},
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    model::{HybridMfConfig, HybridMfModel},
    trainer::{fit, EpochObserver, FitOptions, FitReport},
    TrainBackend,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a run in one record. Saved next to the checkpoint so
// a run can be inspected or repeated later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub ratings_path:   String,
    pub items_path:     Option<String>,
    pub checkpoint_dir: String,
    /// Share of ratings held out for validation; 0 evaluates on train
    pub val_size:       f64,
    pub batch_size:     usize,
    pub epochs:         usize,
    pub lr:             f64,
    pub weight_decay:   f64,
    pub dropout:        f64,
    pub grad_clip_norm: Option<f64>,
    pub factors:        usize,
    pub genre_weight:   f64,
    pub seed:           u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            ratings_path:   "data/ratings.csv".to_string(),
            items_path:     None,
            checkpoint_dir: "checkpoints".to_string(),
            val_size:       0.1,
            batch_size:     2048,
            epochs:         10,
            lr:             1e-3,
            weight_decay:   1e-6,
            dropout:        0.0,
            grad_clip_norm: None,
            factors:        64,
            genre_weight:   1.0,
            seed:           42,
        }
    }
}

impl TrainConfig {
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            epochs:         self.epochs,
            batch_size:     self.batch_size,
            learning_rate:  self.lr,
            weight_decay:   self.weight_decay,
            grad_clip_norm: self.grad_clip_norm,
            seed:           self.seed,
        }
    }
}

// ─── CheckpointObserver ──────────────────────────────────────────────────────
// Writes a metrics row every epoch and a fresh checkpoint on every
// improvement.
struct CheckpointObserver {
    manager:     CheckpointManager,
    metrics:     MetricsLogger,
    users:       EntityIndex,
    items:       EntityIndex,
    content:     Arc<ContentMatrix>,
    genre_names: Vec<String>,
    train_mean:  f32,
}

impl<B: Backend> EpochObserver<B> for CheckpointObserver {
    fn on_epoch(&mut self, metrics: &EpochMetrics) -> Result<()> {
        self.metrics.log(metrics)
    }

    fn on_improved(&mut self, model: &HybridMfModel<B>, metrics: &EpochMetrics) -> Result<()> {
        let checkpoint = Checkpoint::capture(
            model,
            &self.users,
            &self.items,
            &self.content,
            &self.genre_names,
            self.train_mean,
        )?;
        self.manager.save(&checkpoint)?;
        tracing::info!(
            "Checkpoint saved for epoch {} (eval RMSE {:.4})",
            metrics.epoch,
            metrics.eval_rmse
        );
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Train from the configured CSV files on the default backend.
    pub fn execute(&self) -> Result<FitReport> {
        let cfg    = &self.config;
        let source = CsvRatingSource::new(&cfg.ratings_path, cfg.items_path.as_ref().map(PathBuf::from));
        let device: <TrainBackend as Backend>::Device = Default::default();
        tracing::info!("Using device: {:?}", device);
        self.execute_with::<TrainBackend>(&source, &device)
    }

    /// Full pipeline against any rating source and autodiff backend.
    pub fn execute_with<B: AutodiffBackend>(
        &self,
        source: &dyn RatingSource,
        device: &B::Device,
    ) -> Result<FitReport> {
        let cfg = &self.config;

        // ── Step 1: Load ratings and item metadata ────────────────────────────
        let records  = source.load_ratings()?;
        let metadata = source.load_item_metadata()?;

        // ── Step 2: Train / validation split ──────────────────────────────────
        let (train_records, val_records) = split_train_val(records, cfg.val_size, cfg.seed);

        // ── Step 3: Indices from the training partition only ──────────────────
        let users = EntityIndex::build(train_records.iter().map(|r| r.user_id.clone()));
        let items = EntityIndex::build(train_records.iter().map(|r| r.item_id.clone()));
        tracing::info!("Indexed {} users and {} items", users.len(), items.len());

        // ── Step 4: Map to index space ────────────────────────────────────────
        let (train_ratings, _) = index_records(&train_records, &users, &items)?;
        let (val_ratings, dropped) = index_records(&val_records, &users, &items)?;
        if dropped > 0 {
            tracing::warn!(
                "Dropped {} validation ratings with users or items unseen in training",
                dropped
            );
        }

        // ── Step 5: Content matrix aligned to the item index ──────────────────
        let content = Arc::new(ContentMatrix::build(&items, &metadata)?);

        // ── Step 6: Model, global bias at the training mean ───────────────────
        let train_mean = mean_rating(&train_ratings);
        B::seed(cfg.seed);
        let model = HybridMfConfig::new(users.len(), items.len(), cfg.factors)
            .with_n_genres(content.n_genres())
            .with_dropout(cfg.dropout)
            .with_genre_weight(cfg.genre_weight)
            .init::<B>(train_mean, device)?;
        tracing::info!(
            "Model ready: {} factors, {} genres, global bias {:.4}",
            cfg.factors,
            content.n_genres(),
            train_mean
        );

        // ── Step 7: Save config, start metrics ────────────────────────────────
        let manager = CheckpointManager::new(&cfg.checkpoint_dir);
        manager.save_config(cfg)?;
        let metrics = MetricsLogger::create(manager.dir())?;

        let mut observer = CheckpointObserver {
            manager,
            metrics,
            users,
            items,
            content:     content.clone(),
            genre_names: metadata.genre_names,
            train_mean,
        };

        // ── Step 8: Run training loop (Layer 5) ───────────────────────────────
        let validation = (!val_ratings.is_empty()).then(|| RatingDataset::new(val_ratings));
        let (_, report) = fit(
            model,
            RatingDataset::new(train_ratings),
            validation,
            content,
            &cfg.fit_options(),
            device,
            &mut observer,
        )?;
        Ok(report)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    use crate::domain::rating::RatingRecord;
    use crate::domain::traits::ItemMetadata;
    use crate::ml::inferencer::Inferencer;

    type TestBackend = Autodiff<NdArray>;

    struct InMemorySource {
        ratings:  Vec<RatingRecord>,
        metadata: ItemMetadata,
    }

    impl RatingSource for InMemorySource {
        fn load_ratings(&self) -> Result<Vec<RatingRecord>> {
            Ok(self.ratings.clone())
        }

        fn load_item_metadata(&self) -> Result<ItemMetadata> {
            Ok(self.metadata.clone())
        }
    }

    fn source() -> InMemorySource {
        InMemorySource {
            ratings: vec![
                RatingRecord::new("A", "X", 5.0),
                RatingRecord::new("A", "Y", 1.0),
                RatingRecord::new("B", "X", 4.0),
                RatingRecord::new("B", "Z", 2.0),
                RatingRecord::new("C", "Y", 3.0),
            ],
            metadata: ItemMetadata {
                genre_names: vec!["g5".into(), "g6".into()],
                rows: vec![
                    ("X".into(), vec![1.0, 0.0]),
                    ("Y".into(), vec![0.0, 1.0]),
                    ("Z".into(), vec![1.0, 1.0]),
                ],
            },
        }
    }

    fn config(dir: &std::path::Path) -> TrainConfig {
        TrainConfig {
            checkpoint_dir: dir.to_string_lossy().into_owned(),
            val_size:       0.0,
            batch_size:     2,
            epochs:         4,
            lr:             0.05,
            factors:        4,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_end_to_end_training_writes_usable_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let report = TrainUseCase::new(cfg.clone())
            .execute_with::<TestBackend>(&source(), &Default::default())
            .unwrap();
        assert_eq!(report.history.len(), 4);
        assert!(report.best_rmse.is_finite());

        let manager = CheckpointManager::new(dir.path());
        let saved: TrainConfig =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("train_config.json")).unwrap()).unwrap();
        assert_eq!(saved, cfg);

        let metrics = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(metrics.lines().count(), 5);

        let inferencer = Inferencer::<NdArray>::from_checkpoint(&manager, &Default::default()).unwrap();
        assert_eq!(inferencer.genre_names(), &["g5".to_string(), "g6".to_string()]);
        assert!((inferencer.train_mean_rating() - 3.0).abs() < 1e-6);

        let recs = inferencer.recommend("A", 3, &["X".into(), "Y".into()]).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].item_id, "Z");
        assert!(inferencer.recommend("ghost", 3, &[]).unwrap_err().is_not_found());
        assert_eq!(inferencer.fold_in(&["Action", "Anime"]).unwrap().len(), 4);
    }

    #[test]
    fn test_validation_rows_with_unseen_ids_are_dropped() {
        // With 40% held out some ids exist only in validation; the run
        // must still complete on what remains.
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { val_size: 0.4, ..config(dir.path()) };
        let report = TrainUseCase::new(cfg)
            .execute_with::<TestBackend>(&source(), &Default::default())
            .unwrap();
        assert_eq!(report.history.len(), 4);
    }
}
