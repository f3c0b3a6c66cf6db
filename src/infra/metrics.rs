// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one row per training step to a CSV file.
//
// Metrics recorded per step:
//   - step:      global optimisation step (1, 2, 3, ...)
//   - epoch:     completed passes over the corpus so far
//   - loss:      mse + latent_l2
//   - mse:       reconstruction error
//   - latent_l2: mean squared latent activation
//   - lr:        learning rate used for the step
//
// Output file: checkpoints/metrics.csv
//
// Example CSV output:
//   step,epoch,loss,mse,latent_l2,lr
//   1,0,0.912300,0.904100,0.008200,0.001000
//   2,0,0.887400,0.879900,0.007500,0.001000
//
// A resumed run appends to the existing file.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::StepSummary;

/// One row of metrics data for a single training step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMetrics {
    pub step:          usize,
    pub epoch:         usize,
    pub loss:          f64,
    pub mse:           f64,
    pub latent_l2:     f64,
    pub learning_rate: f64,
}

impl StepMetrics {
    pub fn new(step: usize, epoch: usize, summary: &StepSummary, learning_rate: f64) -> Self {
        Self {
            step,
            epoch,
            loss:      summary.loss,
            mse:       summary.mse,
            latent_l2: summary.latent_l2,
            learning_rate,
        }
    }

    /// Returns true if this step's loss beats the previous best
    pub fn is_improvement(&self, best_loss: f64) -> bool {
        self.loss < best_loss
    }
}

/// Appends step metrics to `metrics.csv`.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "step,epoch,loss,mse,latent_l2,lr")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &StepMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6},{:.6}",
            m.step, m.epoch, m.loss, m.mse, m.latent_l2, m.learning_rate,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn summary(loss: f64) -> StepSummary {
        StepSummary { loss, mse: loss - 0.1, latent_l2: 0.1 }
    }

    #[test]
    fn test_is_improvement() {
        let m = StepMetrics::new(2, 0, &summary(2.3), 1e-3);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }

    #[test]
    fn test_rows_are_appended_after_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&StepMetrics::new(1, 0, &summary(1.0), 1e-3)).unwrap();

        // a second logger on the same directory keeps the existing rows
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&StepMetrics::new(2, 1, &summary(0.5), 1e-3)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "step,epoch,loss,mse,latent_l2,lr");
        assert!(lines[1].starts_with("1,0,1.000000,0.900000"));
        assert!(lines[2].starts_with("2,1,0.500000"));
    }
}
