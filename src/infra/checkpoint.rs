// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// One versioned JSON document holds everything inference needs:
//
//   checkpoints/
//     checkpoint.json    ← format_version, config, id lists,
//                          content matrix, all parameters
//     train_config.json  ← the run's TrainConfig
//     metrics.csv        ← written by MetricsLogger
//
// The id lists are the EntityIndex in sorted order, so position is
// the index and the same list is the reverse map.
//
// Writes go to a temp file in the same directory and are renamed
// into place; a reader sees either the old checkpoint or the new
// one, never half of either.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::content::ContentMatrix;
use crate::domain::entity_index::EntityIndex;
use crate::domain::error::{RecError, RecResult};
use crate::ml::model::{HybridMfConfig, HybridMfModel};
use crate::ml::parameters::ModelParameters;

/// Bumped whenever a field changes meaning. Older readers refuse
/// newer files instead of misreading them.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

const CHECKPOINT_FILE: &str = "checkpoint.json";
const CONFIG_FILE: &str     = "train_config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub n_factors:           usize,
    pub n_genres:            usize,
    pub dropout:             f64,
    pub genre_weight:        f64,
    pub global_bias_at_save: f32,
    pub train_mean_rating:   f32,
    #[serde(default)]
    pub genre_names:         Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub config:         CheckpointConfig,
    pub users:          EntityIndex,
    pub items:          EntityIndex,
    pub content:        ContentMatrix,
    pub parameters:     ModelParameters,
}

impl Checkpoint {
    /// Snapshot a model together with the indices that give its rows meaning.
    pub fn capture<B: Backend>(
        model:             &HybridMfModel<B>,
        users:             &EntityIndex,
        items:             &EntityIndex,
        content:           &ContentMatrix,
        genre_names:       &[String],
        train_mean_rating: f32,
    ) -> RecResult<Self> {
        let parameters = model.parameters()?;
        let checkpoint = Self {
            format_version: CHECKPOINT_FORMAT_VERSION,
            config: CheckpointConfig {
                n_factors:           model.n_factors,
                n_genres:            model.n_genres(),
                dropout:             model.dropout.prob,
                genre_weight:        model.genre_weight,
                global_bias_at_save: parameters.global_bias,
                train_mean_rating,
                genre_names:         genre_names.to_vec(),
            },
            users:   users.clone(),
            items:   items.clone(),
            content: content.clone(),
            parameters,
        };
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Every shape in the document must agree with the config, and
    /// every parameter must be finite (JSON has no NaN or Inf).
    pub fn validate(&self) -> RecResult<()> {
        if self.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(RecError::config(format!(
                "unsupported checkpoint format_version {} (this build reads {})",
                self.format_version, CHECKPOINT_FORMAT_VERSION
            )));
        }
        let c = &self.config;
        self.parameters.check(self.users.len(), self.items.len(), c.n_factors, c.n_genres)?;
        self.content.check_shape(self.items.len(), c.n_genres)?;
        if c.genre_names.len() != c.n_genres {
            return Err(RecError::config(format!(
                "checkpoint lists {} genre names for {} genre columns",
                c.genre_names.len(),
                c.n_genres
            )));
        }

        let bad = self.parameters.non_finite_count();
        if bad > 0 {
            return Err(RecError::NumericAnomaly(format!(
                "checkpoint carries {bad} non-finite parameter values"
            )));
        }
        Ok(())
    }

    /// Rebuild the model on `device`.
    pub fn restore<B: Backend>(&self, device: &B::Device) -> RecResult<HybridMfModel<B>> {
        self.validate()?;
        HybridMfConfig::new(self.users.len(), self.items.len(), self.config.n_factors)
            .with_n_genres(self.config.n_genres)
            .with_dropout(self.config.dropout)
            .with_genre_weight(self.config.genre_weight)
            .init_with(&self.parameters, device)
    }
}

/// Reads and writes checkpoint files in one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    /// Replace the checkpoint atomically. A checkpoint that fails
    /// validation is refused and the file on disk is left alone.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        checkpoint.validate()?;
        let json = serde_json::to_vec(checkpoint).context("Cannot serialise checkpoint")?;
        let path = self.checkpoint_path();
        write_atomic(&path, &json)?;
        tracing::debug!("Saved checkpoint to '{}'", path.display());
        Ok(())
    }

    /// Load and validate the checkpoint. The version is checked before
    /// the rest of the document is interpreted.
    pub fn load(&self) -> Result<Checkpoint> {
        let path = self.checkpoint_path();
        let text = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read checkpoint '{}'. Have you run 'train' first?",
                path.display()
            )
        })?;

        let raw: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("'{}' is not valid JSON", path.display()))?;
        let version = raw
            .get("format_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| RecError::config("checkpoint has no format_version"))?;
        if version != u64::from(CHECKPOINT_FORMAT_VERSION) {
            return Err(RecError::config(format!(
                "unsupported checkpoint format_version {version} (this build reads {CHECKPOINT_FORMAT_VERSION})"
            ))
            .into());
        }

        let checkpoint: Checkpoint = serde_json::from_value(raw)
            .with_context(|| format!("Malformed checkpoint '{}'", path.display()))?;
        checkpoint.validate()?;

        tracing::info!(
            "Loaded checkpoint: {} users, {} items, {} factors, {} genres",
            checkpoint.users.len(),
            checkpoint.items.len(),
            checkpoint.config.n_factors,
            checkpoint.config.n_genres,
        );
        Ok(checkpoint)
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(cfg)?;
        let path = self.dir.join(CONFIG_FILE);
        write_atomic(&path, json.as_bytes())?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }
}

/// Write `bytes` beside `path` and rename over it.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("Cannot write '{}'", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Cannot move '{}' into place", path.display()))?;
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn sample() -> Checkpoint {
        let users = EntityIndex::build(["u2", "u1"]);
        let items = EntityIndex::build(["i1", "i2", "i3"]);
        let content = ContentMatrix::from_rows(
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 0.0]],
            2,
        )
        .unwrap();
        let model = HybridMfConfig::new(2, 3, 4)
            .with_n_genres(2)
            .with_genre_weight(0.5)
            .init::<TestBackend>(3.25, &Default::default())
            .unwrap();
        Checkpoint::capture(&model, &users, &items, &content, &["Action".into(), "Drama".into()], 3.25)
            .unwrap()
    }

    #[test]
    fn test_round_trip_restores_identical_parameters() {
        let dir     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        let saved   = sample();
        manager.save(&saved).unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded, saved);

        let model = loaded.restore::<TestBackend>(&Default::default()).unwrap();
        assert_eq!(model.parameters().unwrap(), saved.parameters);
        assert_eq!(model.genre_weight, 0.5);
        assert_eq!(loaded.users.get("u1"), Some(0));
        assert_eq!(loaded.items.id_of(2), Some("i3"));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let dir     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        let mut ckpt = sample();
        ckpt.format_version = 99;
        let json = serde_json::to_vec(&ckpt).unwrap();
        fs::write(manager.checkpoint_path(), json).unwrap();

        let err = manager.load().unwrap_err();
        assert!(matches!(err.downcast_ref::<RecError>(), Some(RecError::Configuration(_))));
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let mut ckpt = sample();
        ckpt.config.n_factors = 5;
        assert!(ckpt.validate().is_err());

        let mut ckpt = sample();
        ckpt.config.genre_names.pop();
        assert!(ckpt.validate().is_err());
    }

    #[test]
    fn test_non_finite_parameters_keep_previous_checkpoint() {
        let dir     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        let good    = sample();
        manager.save(&good).unwrap();

        let mut bad = sample();
        bad.parameters.user_bias[0] = f32::NAN;
        let err = manager.save(&bad).unwrap_err();
        assert!(matches!(err.downcast_ref::<RecError>(), Some(RecError::NumericAnomaly(_))));
        assert_eq!(manager.load().unwrap(), good);

        let params = bad.parameters.clone();
        let model = HybridMfConfig::new(2, 3, 4)
            .with_n_genres(2)
            .init_with::<TestBackend>(&params, &Default::default())
            .unwrap();
        let err = Checkpoint::capture(&model, &bad.users, &bad.items, &bad.content, &bad.config.genre_names, 3.25)
            .unwrap_err();
        assert!(matches!(err, RecError::NumericAnomaly(_)));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir     = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().join("nested"));
        manager.save(&sample()).unwrap();
        manager.save(&sample()).unwrap();

        let names: Vec<String> = fs::read_dir(manager.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![CHECKPOINT_FILE.to_string()]);
    }

    #[test]
    fn test_missing_checkpoint_mentions_train() {
        let dir = tempfile::tempdir().unwrap();
        let err = CheckpointManager::new(dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("train"));
    }
}
