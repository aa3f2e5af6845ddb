// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor maths lives in this layer.
//
//   model.rs      — hybrid factorisation model
//                   user/item latent factors + bias terms, item
//                   vectors shifted by a linear projection of the
//                   item's genre vector
//
//   parameters.rs — plain-data copy of every learnable tensor,
//                   used by checkpoints and by tests that need
//                   hand-set weights
//
//   trainer.rs    — minibatch Adam loop with per-epoch RMSE
//                   evaluation and best-epoch notification
//
//   recommender.rs — dense exact top-K over the whole catalog
//
//   fold_in.rs    — cold-start embedding from declared genres
//
//   inferencer.rs — loads a checkpoint and answers queries in
//                   external ids
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Koren, Bell & Volinsky (2009) Matrix Factorization
//            Techniques for Recommender Systems

use burn::prelude::*;

use crate::domain::error::{RecError, RecResult};

pub mod model;
pub mod parameters;
pub mod trainer;
pub mod recommender;
pub mod fold_in;
pub mod inferencer;

#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;
#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;

/// Backend used for training: the inference backend plus autodiff.
pub type TrainBackend = burn::backend::Autodiff<InferBackend>;

/// Copy a tensor's values to the host as f32, row-major.
pub fn to_vec_f32<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> RecResult<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| RecError::NumericAnomaly(format!("cannot read tensor data: {e:?}")))
}

/// Replace NaN/Inf with 0.0 in place; returns how many were replaced.
pub fn sanitize(values: &mut [f32]) -> usize {
    let mut replaced = 0;
    for v in values.iter_mut().filter(|v| !v.is_finite()) {
        *v = 0.0;
        replaced += 1;
    }
    replaced
}

/// `sanitize`, with a warning naming `what` when anything was replaced.
pub fn sanitize_logged(what: &str, values: &mut [f32]) {
    let replaced = sanitize(values);
    if replaced > 0 {
        tracing::warn!("Replaced {} non-finite values with 0.0 in {}", replaced, what);
    }
}
