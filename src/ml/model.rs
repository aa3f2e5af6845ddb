use burn::{
    nn::{
        loss::{MseLoss, Reduction},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Initializer,
        Linear, LinearConfig,
    },
    module::Param,
    prelude::*,
};

use crate::data::batcher::RatingBatch;
use crate::domain::error::{RecError, RecResult};
use crate::ml::parameters::{DenseMatrix, ModelParameters};
use crate::ml::to_vec_f32;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct HybridMfConfig {
    pub n_users:   usize,
    pub n_items:   usize,
    pub n_factors: usize,
    /// Zero gives a pure collaborative model with no content projection.
    #[config(default = 0)]
    pub n_genres:  usize,
    #[config(default = 0.0)]
    pub dropout:   f64,
    /// Fixed blend scalar for the content term. Ignored when n_genres = 0.
    #[config(default = 1.0)]
    pub genre_weight: f64,
    #[config(default = 0.01)]
    pub init_std:  f64,
}

impl HybridMfConfig {
    /// Fresh model: Gaussian factors, zero biases, global bias set to
    /// the training mean.
    pub fn init<B: Backend>(&self, global_bias: f32, device: &B::Device) -> RecResult<HybridMfModel<B>> {
        self.validate()?;
        if !global_bias.is_finite() {
            return Err(RecError::config(format!("global bias must be finite, got {global_bias}")));
        }

        let factors = Initializer::Normal { mean: 0.0, std: self.init_std };
        let user_factors = EmbeddingConfig::new(self.n_users, self.n_factors)
            .with_initializer(factors.clone())
            .init(device);
        let item_factors = EmbeddingConfig::new(self.n_items, self.n_factors)
            .with_initializer(factors)
            .init(device);
        let user_bias = EmbeddingConfig::new(self.n_users, 1)
            .with_initializer(Initializer::Zeros)
            .init(device);
        let item_bias = EmbeddingConfig::new(self.n_items, 1)
            .with_initializer(Initializer::Zeros)
            .init(device);

        let content_projection = (self.n_genres > 0)
            .then(|| LinearConfig::new(self.n_genres, self.n_factors).init(device));

        let global_bias = Param::from_tensor(Tensor::<B, 1>::from_floats([global_bias], device));
        let dropout     = DropoutConfig::new(self.dropout).init();

        Ok(HybridMfModel {
            user_factors, item_factors, user_bias, item_bias,
            content_projection, global_bias, dropout,
            n_factors:    self.n_factors,
            genre_weight: if self.n_genres > 0 { self.genre_weight } else { 0.0 },
        })
    }

    /// Model carrying exactly `params`, e.g. restored from a checkpoint.
    pub fn init_with<B: Backend>(&self, params: &ModelParameters, device: &B::Device) -> RecResult<HybridMfModel<B>> {
        params.check(self.n_users, self.n_items, self.n_factors, self.n_genres)?;
        let mut model = self.init::<B>(params.global_bias, device)?;

        model.user_factors.weight = Param::from_tensor(matrix_tensor(&params.user_factors, device));
        model.item_factors.weight = Param::from_tensor(matrix_tensor(&params.item_factors, device));
        model.user_bias.weight    = Param::from_tensor(column_tensor(&params.user_bias, device));
        model.item_bias.weight    = Param::from_tensor(column_tensor(&params.item_bias, device));

        if let (Some(linear), Some(weight), Some(bias)) =
            (model.content_projection.as_mut(), &params.content_weight, &params.content_bias)
        {
            linear.weight = Param::from_tensor(matrix_tensor(weight, device));
            linear.bias   = Some(Param::from_tensor(Tensor::<B, 1>::from_floats(bias.as_slice(), device)));
        }
        Ok(model)
    }

    fn validate(&self) -> RecResult<()> {
        if self.n_users == 0 || self.n_items == 0 {
            return Err(RecError::config(format!(
                "model needs at least one user and one item (users={}, items={})",
                self.n_users, self.n_items
            )));
        }
        if self.n_factors == 0 {
            return Err(RecError::config("n_factors must be positive"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(RecError::config(format!("dropout must be in [0, 1), got {}", self.dropout)));
        }
        if !self.genre_weight.is_finite() {
            return Err(RecError::config("genre_weight must be finite"));
        }
        Ok(())
    }
}

fn matrix_tensor<B: Backend>(m: &DenseMatrix, device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_floats(m.values.as_slice(), device).reshape([m.rows, m.cols])
}

fn column_tensor<B: Backend>(values: &[f32], device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_floats(values, device).reshape([values.len(), 1])
}

/// Latent factor model whose item vectors are shifted by a linear
/// projection of the item's genre vector.
#[derive(Module, Debug)]
pub struct HybridMfModel<B: Backend> {
    pub user_factors:       Embedding<B>,
    pub item_factors:       Embedding<B>,
    pub user_bias:          Embedding<B>,
    pub item_bias:          Embedding<B>,
    pub content_projection: Option<Linear<B>>,
    pub global_bias:        Param<Tensor<B, 1>>,
    pub dropout:            Dropout,
    pub n_factors:          usize,
    pub genre_weight:       f64,
}

impl<B: Backend> HybridMfModel<B> {
    /// users, items: [batch] → predicted ratings: [batch]
    pub fn forward(
        &self,
        users:   Tensor<B, 1, Int>,
        items:   Tensor<B, 1, Int>,
        content: Option<Tensor<B, 2>>,
    ) -> Tensor<B, 1> {
        let [batch] = users.dims();

        let user_vec = self.dropout.forward(self.lookup_factors(&self.user_factors, users.clone()));
        let item_vec = self.dropout.forward(self.projected_items(items.clone(), content));

        // Row-wise dot product.
        let dot = (user_vec * item_vec).sum_dim(1).reshape([batch]);

        dot + self.lookup_bias(&self.user_bias, users)
            + self.lookup_bias(&self.item_bias, items)
            + self.global_bias.val()
    }

    /// item_factor + genre_weight × linear(content), [batch, n_factors].
    /// No dropout: this is also the exported item embedding.
    pub fn projected_items(&self, items: Tensor<B, 1, Int>, content: Option<Tensor<B, 2>>) -> Tensor<B, 2> {
        let factors = self.lookup_factors(&self.item_factors, items);
        match (&self.content_projection, content) {
            (Some(linear), Some(content)) => factors + linear.forward(content).mul_scalar(self.genre_weight),
            _ => factors,
        }
    }

    /// Score items against a supplied user vector [n_factors] instead of
    /// a trained user row. The user bias term is absent.
    pub fn forward_with_user_vector(
        &self,
        user_vec: Tensor<B, 1>,
        items:    Tensor<B, 1, Int>,
        content:  Option<Tensor<B, 2>>,
    ) -> Tensor<B, 1> {
        let [batch] = items.dims();
        let projected = self.projected_items(items.clone(), content);
        let dot = projected.matmul(user_vec.reshape([self.n_factors, 1])).reshape([batch]);
        dot + self.lookup_bias(&self.item_bias, items) + self.global_bias.val()
    }

    /// Mean squared error over one batch, plus the predictions.
    pub fn forward_loss(&self, batch: RatingBatch<B>) -> (Tensor<B, 1>, Tensor<B, 1>) {
        let preds = self.forward(batch.users, batch.items, batch.content);
        let loss  = MseLoss::new().forward(preds.clone(), batch.targets, Reduction::Mean);
        (loss, preds)
    }

    /// Prediction for a single (user, item, content vector).
    pub fn score(&self, user: usize, item: usize, content: &[f32]) -> RecResult<f32> {
        if user >= self.n_users() {
            return Err(RecError::user_not_found(user.to_string()));
        }
        if item >= self.n_items() {
            return Err(RecError::item_not_found(item.to_string()));
        }
        if content.len() != self.n_genres() {
            return Err(RecError::config(format!(
                "content vector has {} values, model expects {}",
                content.len(),
                self.n_genres()
            )));
        }

        let device  = self.device();
        let users   = Tensor::<B, 1, Int>::from_ints([user as i32], &device);
        let items   = Tensor::<B, 1, Int>::from_ints([item as i32], &device);
        let content = (!content.is_empty())
            .then(|| Tensor::<B, 1>::from_floats(content, &device).reshape([1, content.len()]));

        let value = to_vec_f32(self.forward(users, items, content))?;
        value
            .first()
            .copied()
            .ok_or_else(|| RecError::NumericAnomaly("empty prediction".into()))
    }

    /// Copy every learnable tensor to the host.
    pub fn parameters(&self) -> RecResult<ModelParameters> {
        let (content_weight, content_bias) = match &self.content_projection {
            Some(linear) => {
                let [rows, cols] = linear.weight.val().dims();
                let weight = DenseMatrix::new(rows, cols, to_vec_f32(linear.weight.val())?)?;
                let bias = match &linear.bias {
                    Some(b) => to_vec_f32(b.val())?,
                    None => vec![0.0; cols],
                };
                (Some(weight), Some(bias))
            }
            None => (None, None),
        };

        let global = to_vec_f32(self.global_bias.val())?;
        Ok(ModelParameters {
            user_factors: DenseMatrix::new(self.n_users(), self.n_factors, to_vec_f32(self.user_factors.weight.val())?)?,
            item_factors: DenseMatrix::new(self.n_items(), self.n_factors, to_vec_f32(self.item_factors.weight.val())?)?,
            user_bias:    to_vec_f32(self.user_bias.weight.val())?,
            item_bias:    to_vec_f32(self.item_bias.weight.val())?,
            global_bias:  global.first().copied().unwrap_or(0.0),
            content_weight,
            content_bias,
        })
    }

    pub fn n_users(&self) -> usize {
        self.user_factors.weight.val().dims()[0]
    }

    pub fn n_items(&self) -> usize {
        self.item_factors.weight.val().dims()[0]
    }

    pub fn n_genres(&self) -> usize {
        self.content_projection
            .as_ref()
            .map_or(0, |linear| linear.weight.val().dims()[0])
    }

    pub fn device(&self) -> B::Device {
        self.global_bias.val().device()
    }

    // [batch] → [batch, n_factors]
    fn lookup_factors(&self, table: &Embedding<B>, ids: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        let [batch] = ids.dims();
        table.forward(ids.reshape([batch, 1])).reshape([batch, self.n_factors])
    }

    // [batch] → [batch]
    fn lookup_bias(&self, table: &Embedding<B>, ids: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        let [batch] = ids.dims();
        table.forward(ids.reshape([batch, 1])).reshape([batch])
    }
}
