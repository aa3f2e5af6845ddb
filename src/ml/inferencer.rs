// ============================================================
// Layer 5 — Inferencer
// ============================================================
// A loaded checkpoint answering queries in external ids. The model
// is never mutated after loading, so one Inferencer can serve any
// number of readers through a shared reference.
use std::collections::HashSet;

use anyhow::Result;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::content::ContentMatrix;
use crate::domain::entity_index::EntityIndex;
use crate::domain::error::{EntityKind, RecError, RecResult};
use crate::domain::genre::GenreVocabulary;
use crate::infra::checkpoint::{Checkpoint, CheckpointManager};
use crate::ml::{fold_in, model::HybridMfModel, recommender, InferBackend};

/// One ranked item, by external id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: String,
    pub score:   f32,
}

pub struct Inferencer<B: Backend = InferBackend> {
    model:      HybridMfModel<B>,
    users:      EntityIndex,
    items:      EntityIndex,
    content:    ContentMatrix,
    vocabulary: GenreVocabulary,
    train_mean: f32,
}

impl<B: Backend> Inferencer<B> {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, device: &B::Device) -> Result<Self> {
        let checkpoint = ckpt_manager.load()?;
        let inferencer = Self::from_checkpoint_data(checkpoint, device)?;
        tracing::info!("Model loaded from checkpoint");
        Ok(inferencer)
    }

    pub fn from_checkpoint_data(checkpoint: Checkpoint, device: &B::Device) -> RecResult<Self> {
        let model = checkpoint.restore::<B>(device)?;
        let vocabulary = GenreVocabulary::new(checkpoint.config.genre_names.clone()).with_tmdb_aliases();
        Ok(Self {
            model,
            users:      checkpoint.users,
            items:      checkpoint.items,
            content:    checkpoint.content,
            vocabulary,
            train_mean: checkpoint.config.train_mean_rating,
        })
    }

    /// Top `top_k` items for a trained user, skipping `exclude_ids`.
    /// Excluded ids the model never saw are ignored.
    pub fn recommend(&self, user_id: &str, top_k: usize, exclude_ids: &[String]) -> RecResult<Vec<Recommendation>> {
        let user    = self.users.lookup(user_id, EntityKind::User)?;
        let exclude = self.exclusion_set(exclude_ids);
        let ranked  = recommender::recommend(&self.model, &self.content, user, &exclude, top_k)?;
        self.to_recommendations(ranked)
    }

    /// Cold-start embedding from declared genre labels.
    pub fn fold_in<S: AsRef<str>>(&self, genres: &[S]) -> RecResult<Vec<f32>> {
        fold_in::estimate(&self.model, &self.vocabulary, genres)
    }

    /// Rank the catalog for an embedding that is not a trained user row.
    pub fn recommend_for_embedding(
        &self,
        embedding:   &[f32],
        top_k:       usize,
        exclude_ids: &[String],
    ) -> RecResult<Vec<Recommendation>> {
        let exclude = self.exclusion_set(exclude_ids);
        let ranked  = recommender::recommend_for_embedding(&self.model, &self.content, embedding, &exclude, top_k)?;
        self.to_recommendations(ranked)
    }

    pub fn model(&self) -> &HybridMfModel<B> {
        &self.model
    }

    pub fn users(&self) -> &EntityIndex {
        &self.users
    }

    pub fn items(&self) -> &EntityIndex {
        &self.items
    }

    pub fn content(&self) -> &ContentMatrix {
        &self.content
    }

    pub fn genre_names(&self) -> &[String] {
        self.vocabulary.names()
    }

    pub fn train_mean_rating(&self) -> f32 {
        self.train_mean
    }

    fn exclusion_set(&self, exclude_ids: &[String]) -> HashSet<usize> {
        exclude_ids.iter().filter_map(|id| self.items.get(id)).collect()
    }

    fn to_recommendations(&self, ranked: Vec<(usize, f32)>) -> RecResult<Vec<Recommendation>> {
        ranked
            .into_iter()
            .map(|(i, score)| {
                let item_id = self
                    .items
                    .id_of(i)
                    .ok_or_else(|| RecError::item_not_found(i.to_string()))?;
                Ok(Recommendation { item_id: item_id.to_string(), score })
            })
            .collect()
    }
}
