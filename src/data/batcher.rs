// ============================================================
// Layer 4 — Rating Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<Rating> into the
// tensors one forward pass needs.
//
//   Input:  N ratings
//   Output: users   [N]            Int
//           items   [N]            Int
//           content [N, n_genres]  Float  (None when n_genres = 0)
//           targets [N]            Float
//
// The content rows are looked up here, from the shared content
// matrix, so the dataset itself stays three numbers per sample.

use std::sync::Arc;

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::content::ContentMatrix;
use crate::domain::rating::Rating;

#[derive(Debug, Clone)]
pub struct RatingBatch<B: Backend> {
    pub users:   Tensor<B, 1, Int>,
    pub items:   Tensor<B, 1, Int>,
    pub content: Option<Tensor<B, 2>>,
    pub targets: Tensor<B, 1>,
}

#[derive(Clone, Debug)]
pub struct RatingBatcher<B: Backend> {
    pub device:  B::Device,
    pub content: Arc<ContentMatrix>,
}

impl<B: Backend> RatingBatcher<B> {
    pub fn new(device: B::Device, content: Arc<ContentMatrix>) -> Self {
        Self { device, content }
    }

    /// Tensors for scoring `items` against `users`, no targets.
    /// Shared by batching and by the recommender's full-catalog pass.
    pub fn inputs(
        &self,
        users: &[usize],
        items: &[usize],
    ) -> (Tensor<B, 1, Int>, Tensor<B, 1, Int>, Option<Tensor<B, 2>>) {
        content_inputs(&self.content, users, items, &self.device)
    }
}

/// Build index and content tensors on `device`.
pub fn content_inputs<B: Backend>(
    content: &ContentMatrix,
    users:   &[usize],
    items:   &[usize],
    device:  &B::Device,
) -> (Tensor<B, 1, Int>, Tensor<B, 1, Int>, Option<Tensor<B, 2>>) {
    let user_ids: Vec<i32> = users.iter().map(|&u| u as i32).collect();
    let item_ids: Vec<i32> = items.iter().map(|&i| i as i32).collect();

    let users = Tensor::<B, 1, Int>::from_ints(user_ids.as_slice(), device);
    let items_t = Tensor::<B, 1, Int>::from_ints(item_ids.as_slice(), device);

    let n_genres = content.n_genres();
    let content_t = (n_genres > 0).then(|| {
        let flat = content.gather(items);
        Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([items.len(), n_genres])
    });

    (users, items_t, content_t)
}

impl<B: Backend> Batcher<Rating, RatingBatch<B>> for RatingBatcher<B> {
    fn batch(&self, items: Vec<Rating>) -> RatingBatch<B> {
        let user_idx: Vec<usize> = items.iter().map(|r| r.user).collect();
        let item_idx: Vec<usize> = items.iter().map(|r| r.item).collect();
        let values:   Vec<f32>   = items.iter().map(|r| r.value).collect();

        let (users, items, content) = self.inputs(&user_idx, &item_idx);
        let targets = Tensor::<B, 1>::from_floats(values.as_slice(), &self.device);

        RatingBatch { users, items, content, targets }
    }
}
