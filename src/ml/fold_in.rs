// ============================================================
// Layer 5 — Cold-Start Fold-In
// ============================================================
// Estimates an embedding from declared genres alone, no retraining.
//
// The content half of the item path is the projection W·c + b.
// With the collaborative factor taken as zero and c a normalised
// indicator over the matched genres, that is the mean of the matched
// weight rows plus the bias (genre_weight is not applied):
//
//   e = (1/|G|) · Σ_{g ∈ G} W[g, :]  +  b          (length n_factors)
//
// The result lives in the same space as trained embeddings, so it
// can be scored with the usual dot-product rule. NaN/Inf components
// are zeroed before it is returned.

use burn::prelude::*;

use crate::domain::error::{RecError, RecResult};
use crate::domain::genre::GenreVocabulary;
use crate::ml::{model::HybridMfModel, sanitize_logged, to_vec_f32};

/// Fold-in embedding for a set of declared genre labels.
///
/// `NotApplicable` when the model has no content projection or when
/// no label matches a column.
pub fn estimate<B: Backend, S: AsRef<str>>(
    model:    &HybridMfModel<B>,
    genres:   &GenreVocabulary,
    declared: &[S],
) -> RecResult<Vec<f32>> {
    let Some(linear) = &model.content_projection else {
        return Err(RecError::NotApplicable("model has no content projection".into()));
    };

    let [n_genres, n_factors] = linear.weight.val().dims();
    if genres.len() != n_genres {
        return Err(RecError::config(format!(
            "genre vocabulary has {} names, model has {} genre columns",
            genres.len(),
            n_genres
        )));
    }

    let matched = genres.resolve_all(declared);
    if matched.is_empty() {
        return Err(RecError::NotApplicable(format!(
            "none of {} declared genres matches a model column",
            declared.len()
        )));
    }

    // Row g of the weight is genre g's contribution.
    let weight = to_vec_f32(linear.weight.val())?;
    let mut embedding = vec![0.0f32; n_factors];
    for &g in &matched {
        for (e, w) in embedding.iter_mut().zip(&weight[g * n_factors..(g + 1) * n_factors]) {
            *e += w;
        }
    }

    let bias = match &linear.bias {
        Some(b) => to_vec_f32(b.val())?,
        None => vec![0.0; n_factors],
    };
    let count = matched.len() as f32;
    for (e, b) in embedding.iter_mut().zip(bias) {
        *e = *e / count + b;
    }
    sanitize_logged("fold-in embedding", &mut embedding);

    tracing::debug!("Folded in {} of {} declared genres", matched.len(), declared.len());
    Ok(embedding)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    use crate::ml::model::HybridMfConfig;
    use crate::ml::parameters::{DenseMatrix, ModelParameters};

    type TestBackend = NdArray;

    // Genres Action, Drama, Horror; 3 factors.
    fn model() -> HybridMfModel<TestBackend> {
        let params = ModelParameters {
            user_factors: DenseMatrix::new(1, 3, vec![0.0; 3]).unwrap(),
            item_factors: DenseMatrix::new(1, 3, vec![0.0; 3]).unwrap(),
            user_bias:    vec![0.0],
            item_bias:    vec![0.0],
            global_bias:  0.0,
            content_weight: Some(DenseMatrix::from_rows(&[
                vec![1.0, 2.0, 3.0],
                vec![-1.0, 0.0, 1.0],
                vec![4.0, 4.0, 4.0],
            ]).unwrap()),
            content_bias: Some(vec![0.5, 0.25, 0.0]),
        };
        HybridMfConfig::new(1, 1, 3)
            .with_n_genres(3)
            .init_with::<TestBackend>(&params, &Default::default())
            .unwrap()
    }

    fn vocab() -> GenreVocabulary {
        GenreVocabulary::new(vec!["Action".into(), "Drama".into(), "Horror".into()])
    }

    #[test]
    fn test_single_match_is_that_row_plus_bias() {
        let e = estimate(&model(), &vocab(), &["Action", "Comedy"]).unwrap();
        assert_eq!(e, vec![1.5, 2.25, 3.0]);
    }

    #[test]
    fn test_multiple_matches_are_averaged() {
        let e = estimate(&model(), &vocab(), &["action", "Drama"]).unwrap();
        assert_eq!(e, vec![0.5, 1.25, 2.0]);
    }

    #[test]
    fn test_deterministic_and_n_factors_long() {
        let m = model();
        let a = estimate(&m, &vocab(), &["Horror", "Drama", "Action"]).unwrap();
        let b = estimate(&m, &vocab(), &["Horror", "Drama", "Action"]).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(
            a.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            b.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_non_finite_weights_fold_in_as_zero() {
        let params = ModelParameters {
            user_factors:   DenseMatrix::new(1, 2, vec![0.0; 2]).unwrap(),
            item_factors:   DenseMatrix::new(1, 2, vec![0.0; 2]).unwrap(),
            user_bias:      vec![0.0],
            item_bias:      vec![0.0],
            global_bias:    0.0,
            content_weight: Some(DenseMatrix::new(1, 2, vec![f32::NAN, f32::INFINITY]).unwrap()),
            content_bias:   Some(vec![0.0, 0.0]),
        };
        let m = HybridMfConfig::new(1, 1, 2)
            .with_n_genres(1)
            .init_with::<TestBackend>(&params, &Default::default())
            .unwrap();
        let v = GenreVocabulary::new(vec!["Action".into()]);

        let e = estimate(&m, &v, &["Action"]).unwrap();
        assert_eq!(e, vec![0.0, 0.0]);
        assert_eq!(serde_json::to_string(&e).unwrap(), "[0.0,0.0]");
    }

    #[test]
    fn test_no_match_is_not_applicable() {
        let err = estimate(&model(), &vocab(), &["Western"]).unwrap_err();
        assert!(matches!(err, RecError::NotApplicable(_)));
    }

    #[test]
    fn test_pure_collaborative_model_is_not_applicable() {
        let m = HybridMfConfig::new(1, 1, 3)
            .init::<TestBackend>(0.0, &Default::default())
            .unwrap();
        let err = estimate(&m, &GenreVocabulary::default(), &["Action"]).unwrap_err();
        assert!(matches!(err, RecError::NotApplicable(_)));
    }
}
