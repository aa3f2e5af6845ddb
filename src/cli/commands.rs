// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Four subcommands: `train`, `recommend`, `fold-in`, `export`.
//
// clap's derive macros generate --help text, missing-argument
// errors and the string → number conversions.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the hybrid model on a ratings CSV (plus optional genres CSV)
    Train(TrainArgs),

    /// Top-K items for a user the model was trained on
    Recommend(RecommendArgs),

    /// Cold-start: embedding and top-K items from declared genres
    FoldIn(FoldInArgs),

    /// Write item, user and genre-layer embeddings as JSON files
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// CSV with user_id,item_id,rating columns
    #[arg(long, default_value = "data/ratings.csv")]
    pub ratings: String,

    /// CSV with item_id followed by one column per genre
    #[arg(long)]
    pub items: Option<String>,

    /// Directory for checkpoint.json, train_config.json and metrics.csv
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Share of ratings held out for validation (0 = evaluate on train)
    #[arg(long, default_value_t = 0.1)]
    pub val_size: f64,

    #[arg(long, default_value_t = 2048)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// L2 penalty on every parameter
    #[arg(long, default_value_t = 1e-6)]
    pub weight_decay: f64,

    /// Dropout on user and item vectors during training
    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,

    /// Clip gradient norm to this value before each step
    #[arg(long)]
    pub grad_clip: Option<f64>,

    /// Latent dimension
    #[arg(long, default_value_t = 64)]
    pub factors: usize,

    /// Blend strength of the genre projection
    #[arg(long, default_value_t = 1.0)]
    pub genre_weight: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            ratings_path:   a.ratings,
            items_path:     a.items,
            checkpoint_dir: a.checkpoint_dir,
            val_size:       a.val_size,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            lr:             a.lr,
            weight_decay:   a.weight_decay,
            dropout:        a.dropout,
            grad_clip_norm: a.grad_clip,
            factors:        a.factors,
            genre_weight:   a.genre_weight,
            seed:           a.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct RecommendArgs {
    /// External user id as it appeared in the ratings file
    #[arg(long)]
    pub user: String,

    #[arg(long, default_value_t = 10)]
    pub top_k: usize,

    /// Item ids to leave out, e.g. ones the user already rated
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

#[derive(Args, Debug)]
pub struct FoldInArgs {
    /// Genre labels, comma separated (display names or column names)
    #[arg(long, value_delimiter = ',', required = true)]
    pub genres: Vec<String>,

    #[arg(long, default_value_t = 10)]
    pub top_k: usize,

    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Output directory for the JSON files
    #[arg(long, default_value = "export")]
    pub out_dir: String,
}
