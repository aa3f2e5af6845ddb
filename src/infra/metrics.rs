// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per training epoch.
//
// Output file: <checkpoint_dir>/metrics.csv
//
//   epoch,train_rmse,eval_rmse,improved
//   1,1.284113,1.301552,true
//   2,1.102874,1.173020,true
//   3,1.061540,1.180113,false
//
// train_rmse is measured on the fly during the epoch (dropout on,
// weights moving); eval_rmse is the clean end-of-epoch number the
// checkpoint policy acts on. "improved" marks the epochs that
// rewrote the checkpoint.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const HEADER: &str = "epoch,train_rmse,eval_rmse,improved";

/// Metrics for a single training epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Starts at 1
    pub epoch:      usize,
    pub train_rmse: f64,
    pub eval_rmse:  f64,
    /// Strictly better than every earlier epoch of the run
    pub improved:   bool,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_rmse: f64, eval_rmse: f64, best_so_far: f64) -> Self {
        let mut m = Self { epoch, train_rmse, eval_rmse, improved: false };
        m.improved = m.is_improvement(best_so_far);
        m
    }

    /// Strict improvement only; a tie keeps the earlier epoch.
    /// NaN never counts as an improvement.
    pub fn is_improvement(&self, best_so_far: f64) -> bool {
        self.eval_rmse < best_so_far
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Start a fresh metrics file in `dir`, replacing one from an
    /// earlier run.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "{HEADER}")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;

        writeln!(f, "{},{:.6},{:.6},{}", m.epoch, m.train_rmse, m.eval_rmse, m.improved)?;

        tracing::debug!(
            "Logged epoch {}: train_rmse={:.4}, eval_rmse={:.4}",
            m.epoch,
            m.train_rmse,
            m.eval_rmse,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
