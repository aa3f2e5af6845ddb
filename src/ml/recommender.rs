// ============================================================
// Layer 5 — Recommender
// ============================================================
// Dense exact top-K: every catalog item is scored for the user in
// one batched forward pass, known items are filtered out, and the
// rest are ranked by score.
//
// Ranking uses a stable sort, so equal scores come out in
// ascending item-index order and identical weights always give
// identical lists.

use std::collections::HashSet;

use burn::prelude::*;

use crate::data::{batcher::content_inputs, content::ContentMatrix};
use crate::domain::error::{RecError, RecResult};
use crate::ml::{model::HybridMfModel, to_vec_f32};

/// Top `top_k` unseen items for a trained user index.
pub fn recommend<B: Backend>(
    model:   &HybridMfModel<B>,
    content: &ContentMatrix,
    user:    usize,
    exclude: &HashSet<usize>,
    top_k:   usize,
) -> RecResult<Vec<(usize, f32)>> {
    if user >= model.n_users() {
        return Err(RecError::user_not_found(user.to_string()));
    }
    if top_k == 0 {
        return Ok(Vec::new());
    }
    content.check_shape(model.n_items(), model.n_genres())?;

    let device = model.device();
    let items: Vec<usize> = (0..model.n_items()).collect();
    let users = vec![user; items.len()];

    let (users_t, items_t, content_t) = content_inputs::<B>(content, &users, &items, &device);
    let scores = to_vec_f32(model.forward(users_t, items_t, content_t))?;

    Ok(rank(&scores, exclude, top_k))
}

/// Top `top_k` items for an embedding that is not a trained user row,
/// e.g. a fold-in estimate.
pub fn recommend_for_embedding<B: Backend>(
    model:     &HybridMfModel<B>,
    content:   &ContentMatrix,
    embedding: &[f32],
    exclude:   &HashSet<usize>,
    top_k:     usize,
) -> RecResult<Vec<(usize, f32)>> {
    if embedding.len() != model.n_factors {
        return Err(RecError::config(format!(
            "embedding has {} values, model has {} factors",
            embedding.len(),
            model.n_factors
        )));
    }
    if top_k == 0 {
        return Ok(Vec::new());
    }
    content.check_shape(model.n_items(), model.n_genres())?;

    // The whole catalog in index order is the content matrix itself.
    let device  = model.device();
    let n_items = model.n_items();
    let ids: Vec<i32> = (0..n_items as i32).collect();
    let items_t   = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &device);
    let content_t = (content.n_genres() > 0).then(|| {
        Tensor::<B, 1>::from_floats(content.as_slice(), &device).reshape([n_items, content.n_genres()])
    });
    let user_vec = Tensor::<B, 1>::from_floats(embedding, &device);

    let scores = to_vec_f32(model.forward_with_user_vector(user_vec, items_t, content_t))?;
    Ok(rank(&scores, exclude, top_k))
}

/// Drop excluded indices, sort by score descending (stable), keep
/// at most `top_k`. NaN scores sink to the bottom.
pub fn rank(scores: &[f32], exclude: &HashSet<usize>, top_k: usize) -> Vec<(usize, f32)> {
    let mut candidates: Vec<(usize, f32)> = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(i, _)| !exclude.contains(i))
        .collect();

    let key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    candidates.sort_by(|a, b| {
        key(b.1)
            .partial_cmp(&key(a.1))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(top_k);
    candidates
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::ml::model::HybridMfConfig;
    use crate::ml::parameters::{DenseMatrix, ModelParameters};

    type TestBackend = NdArray;

    // 2 users, 4 items, 1 factor. User 0 has factor 1, so its score
    // for item i is just item_factor[i] + global.
    fn model() -> HybridMfModel<TestBackend> {
        let params = ModelParameters {
            user_factors: DenseMatrix::new(2, 1, vec![1.0, -1.0]).unwrap(),
            item_factors: DenseMatrix::new(4, 1, vec![0.5, 2.0, 0.5, -1.0]).unwrap(),
            user_bias:    vec![0.0, 0.0],
            item_bias:    vec![0.0; 4],
            global_bias:  1.0,
            content_weight: None,
            content_bias:   None,
        };
        HybridMfConfig::new(2, 4, 1)
            .init_with::<TestBackend>(&params, &Default::default())
            .unwrap()
    }

    fn content() -> ContentMatrix {
        ContentMatrix::zeros(4, 0)
    }

    #[test]
    fn test_scores_descending_with_ties_in_index_order() {
        let recs = recommend(&model(), &content(), 0, &HashSet::new(), 10).unwrap();
        let order: Vec<usize> = recs.iter().map(|r| r.0).collect();
        assert_eq!(order, vec![1, 0, 2, 3]);
        assert!(recs.windows(2).all(|w| w[0].1 >= w[1].1));
        assert!((recs[0].1 - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_excluded_items_never_returned() {
        let exclude: HashSet<usize> = [1, 2].into_iter().collect();
        let recs = recommend(&model(), &content(), 0, &exclude, 10).unwrap();
        assert!(recs.iter().all(|(i, _)| !exclude.contains(i)));
        assert_eq!(recs.iter().map(|r| r.0).collect::<Vec<_>>(), vec![0, 3]);
    }

    #[test]
    fn test_cardinality() {
        let m = model();
        let exclude: HashSet<usize> = [3].into_iter().collect();
        for k in 0..6 {
            let recs = recommend(&m, &content(), 1, &exclude, k).unwrap();
            assert_eq!(recs.len(), k.min(4 - exclude.len()));
        }
    }

    #[test]
    fn test_unknown_user_is_not_found() {
        let err = recommend(&model(), &content(), 2, &HashSet::new(), 3).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_supplied_embedding_scores_like_a_trained_row() {
        let m = model();
        let by_row = recommend(&m, &content(), 1, &HashSet::new(), 4).unwrap();
        let by_vec = recommend_for_embedding(&m, &content(), &[-1.0], &HashSet::new(), 4).unwrap();
        assert_eq!(by_row, by_vec);
        assert!(recommend_for_embedding(&m, &content(), &[1.0, 2.0], &HashSet::new(), 4).is_err());
    }

    #[test]
    fn test_rank_puts_nan_last() {
        let recs = rank(&[f32::NAN, 0.1, 0.1, 0.3], &HashSet::new(), 4);
        assert_eq!(recs.iter().map(|r| r.0).collect::<Vec<_>>(), vec![3, 1, 2, 0]);
    }
}
