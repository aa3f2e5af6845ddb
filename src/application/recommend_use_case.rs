// ============================================================
// Layer 2 — Recommend Use Case
// ============================================================
// Loads the checkpoint once and answers two kinds of query:
//
//   recommend — a trained user's top-K unseen items
//   fold_in   — a cold-start user described only by genres:
//               estimate an embedding, then rank the catalog for it
//
// Results are plain serde structs; Layer 1 decides how to print
// them.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::RecResult;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    inferencer::{Inferencer, Recommendation},
    InferBackend,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub user_id:         String,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldInResponse {
    pub genres:          Vec<String>,
    pub embedding:       Vec<f32>,
    pub recommendations: Vec<Recommendation>,
}

pub struct RecommendUseCase {
    inferencer: Inferencer,
}

impl RecommendUseCase {
    pub fn new(checkpoint_dir: &str) -> Result<Self> {
        let ckpt       = CheckpointManager::new(checkpoint_dir);
        let inferencer = Inferencer::<InferBackend>::from_checkpoint(&ckpt, &Default::default())?;
        Ok(Self { inferencer })
    }

    pub fn recommend(&self, user_id: &str, top_k: usize, exclude: &[String]) -> RecResult<RecommendResponse> {
        let recommendations = self.inferencer.recommend(user_id, top_k, exclude)?;
        tracing::debug!("{} recommendations for user '{}'", recommendations.len(), user_id);
        Ok(RecommendResponse { user_id: user_id.to_string(), recommendations })
    }

    pub fn fold_in(&self, genres: &[String], top_k: usize, exclude: &[String]) -> RecResult<FoldInResponse> {
        let embedding       = self.inferencer.fold_in(genres)?;
        let recommendations = self.inferencer.recommend_for_embedding(&embedding, top_k, exclude)?;
        Ok(FoldInResponse { genres: genres.to_vec(), embedding, recommendations })
    }
}
