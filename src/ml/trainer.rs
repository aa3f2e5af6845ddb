// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Minibatch Adam over the training ratings, one clean RMSE
// evaluation per epoch, and a callback whenever that RMSE beats
// every earlier epoch.
//
// Backends:
//   - the model trains on B (an AutodiffBackend)
//   - model.valid() gives the same weights on B::InnerBackend with
//     dropout off, used for evaluation and handed to the observer
//
// The trainer never writes files itself. Whoever drives it decides
// what "improved" means on disk (checkpoint, metrics row, nothing).
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::sync::Arc;

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{
    batcher::{content_inputs, RatingBatcher},
    content::ContentMatrix,
    dataset::RatingDataset,
};
use crate::domain::error::{RecError, RecResult};
use crate::domain::rating::Rating;
use crate::infra::metrics::EpochMetrics;
use crate::ml::model::HybridMfModel;

/// Optimisation settings for one `fit` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub epochs:         usize,
    pub batch_size:     usize,
    pub learning_rate:  f64,
    /// L2 penalty applied to every parameter, biases included
    pub weight_decay:   f64,
    pub grad_clip_norm: Option<f64>,
    /// Seeds the per-epoch shuffle
    pub seed:           u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs:         10,
            batch_size:     2048,
            learning_rate:  1e-3,
            weight_decay:   1e-6,
            grad_clip_norm: None,
            seed:           42,
        }
    }
}

impl FitOptions {
    fn validate(&self) -> RecResult<()> {
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(RecError::config(format!(
                "epochs and batch_size must be positive (epochs={}, batch_size={})",
                self.epochs, self.batch_size
            )));
        }
        if !(self.learning_rate > 0.0) || !(self.weight_decay >= 0.0) {
            return Err(RecError::config(format!(
                "learning_rate must be > 0 and weight_decay >= 0 (lr={}, wd={})",
                self.learning_rate, self.weight_decay
            )));
        }
        if matches!(self.grad_clip_norm, Some(c) if !(c > 0.0)) {
            return Err(RecError::config("grad_clip_norm must be positive when set"));
        }
        Ok(())
    }
}

/// What a finished run looked like.
#[derive(Debug, Clone)]
pub struct FitReport {
    pub best_rmse:  f64,
    pub best_epoch: usize,
    pub history:    Vec<EpochMetrics>,
}

/// Hooks called from inside the epoch loop. `B` is the evaluation
/// (non-autodiff) backend.
pub trait EpochObserver<B: Backend> {
    /// Every epoch, after evaluation.
    fn on_epoch(&mut self, _metrics: &EpochMetrics) -> Result<()> {
        Ok(())
    }

    /// Only when the evaluation RMSE strictly improved.
    fn on_improved(&mut self, model: &HybridMfModel<B>, metrics: &EpochMetrics) -> Result<()>;
}

/// Train `model` and return it with the run's report.
///
/// Without a validation set the model is evaluated on `train`.
/// A non-finite evaluation RMSE ends the run with
/// `RecError::NumericAnomaly`; anything the observer persisted before
/// that stays valid.
pub fn fit<B: AutodiffBackend>(
    mut model:  HybridMfModel<B>,
    train:      RatingDataset,
    validation: Option<RatingDataset>,
    content:    Arc<ContentMatrix>,
    opts:       &FitOptions,
    device:     &B::Device,
    observer:   &mut dyn EpochObserver<B::InnerBackend>,
) -> Result<(HybridMfModel<B>, FitReport)> {

    // ── Preconditions ─────────────────────────────────────────────────────────
    opts.validate()?;
    if train.ratings().is_empty() {
        return Err(RecError::config("training set is empty").into());
    }
    let (n_users, n_items) = (model.n_users(), model.n_items());
    train.check_bounds(n_users, n_items)?;
    if let Some(val) = &validation {
        val.check_bounds(n_users, n_items)?;
    }
    content.check_shape(n_items, model.n_genres())?;

    let eval_ratings: Vec<Rating> = match &validation {
        Some(val) if !val.ratings().is_empty() => val.ratings().to_vec(),
        _ => train.ratings().to_vec(),
    };
    tracing::info!(
        "Training on {} ratings, evaluating on {} ({} users, {} items, {} genres)",
        train.ratings().len(),
        eval_ratings.len(),
        n_users,
        n_items,
        model.n_genres(),
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let mut optim_cfg = AdamConfig::new()
        .with_epsilon(1e-8)
        .with_weight_decay(Some(WeightDecayConfig::new(opts.weight_decay as f32)));
    if let Some(clip) = opts.grad_clip_norm {
        optim_cfg = optim_cfg.with_grad_clipping(Some(GradientClippingConfig::Norm(clip as f32)));
    }
    let mut optim = optim_cfg.init::<B, HybridMfModel<B>>();

    // ── Training data loader ──────────────────────────────────────────────────
    // Single-threaded so each epoch's batch order depends only on the seed.
    let batcher = RatingBatcher::<B>::new(device.clone(), content.clone());
    let loader  = DataLoaderBuilder::new(batcher)
        .batch_size(opts.batch_size)
        .shuffle(opts.seed)
        .build(train);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let mut best_rmse  = f64::INFINITY;
    let mut best_epoch = 0usize;
    let mut history    = Vec::with_capacity(opts.epochs);

    for epoch in 1..=opts.epochs {
        let mut sq_err_sum = 0.0f64;
        let mut seen       = 0usize;

        for batch in loader.iter() {
            let n = batch.targets.dims()[0];
            if n == 0 {
                return Err(RecError::config(format!("empty minibatch in epoch {epoch}")).into());
            }

            let (loss, _) = model.forward_loss(batch);
            sq_err_sum += loss.clone().into_scalar().elem::<f64>() * n as f64;
            seen       += n;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(opts.learning_rate, model, grads);
        }
        let train_rmse = if seen > 0 { (sq_err_sum / seen as f64).sqrt() } else { f64::NAN };

        // Dropout off, no graph.
        let eval_model = model.valid();
        let eval_rmse  = evaluate_rmse(&eval_model, &eval_ratings, &content, opts.batch_size, device)?;

        let metrics = EpochMetrics::new(epoch, train_rmse, eval_rmse, best_rmse);
        println!(
            "Epoch {:>3}/{} | train_rmse={:.4} | eval_rmse={:.4}{}",
            epoch,
            opts.epochs,
            train_rmse,
            eval_rmse,
            if metrics.improved { " | best" } else { "" },
        );

        if !eval_rmse.is_finite() {
            observer.on_epoch(&metrics)?;
            return Err(RecError::NumericAnomaly(format!(
                "evaluation RMSE is {eval_rmse} after epoch {epoch}"
            ))
            .into());
        }

        if metrics.improved {
            best_rmse  = eval_rmse;
            best_epoch = epoch;
            observer.on_improved(&eval_model, &metrics)?;
        }
        observer.on_epoch(&metrics)?;
        history.push(metrics);
    }

    tracing::info!("Training complete: best eval RMSE {:.4} at epoch {}", best_rmse, best_epoch);
    Ok((model, FitReport { best_rmse, best_epoch, history }))
}

/// Root-mean-squared error of `model` over `ratings`, scored in
/// chunks of `batch_size`.
pub fn evaluate_rmse<B: Backend>(
    model:      &HybridMfModel<B>,
    ratings:    &[Rating],
    content:    &ContentMatrix,
    batch_size: usize,
    device:     &B::Device,
) -> RecResult<f64> {
    if ratings.is_empty() {
        return Err(RecError::config("cannot evaluate on an empty rating set"));
    }

    let mut sq_err_sum = 0.0f64;
    for chunk in ratings.chunks(batch_size.max(1)) {
        let users:  Vec<usize> = chunk.iter().map(|r| r.user).collect();
        let items:  Vec<usize> = chunk.iter().map(|r| r.item).collect();
        let values: Vec<f32>   = chunk.iter().map(|r| r.value).collect();

        let (users, items, content_t) = content_inputs::<B>(content, &users, &items, device);
        let targets = Tensor::<B, 1>::from_floats(values.as_slice(), device);
        let preds   = model.forward(users, items, content_t);

        sq_err_sum += (preds - targets).powf_scalar(2.0).sum().into_scalar().elem::<f64>();
    }
    Ok((sq_err_sum / ratings.len() as f64).sqrt())
}
