// ============================================================
// Layer 6: Metrics Logger
// ============================================================
// Appends every loss estimate the trainer produces to a CSV
// file, so a run's learning curve can be plotted afterwards.
//
// Columns:
//   step        optimizer steps at the time of the estimate
//   train_loss  mean cross-entropy over sampled train batches
//   val_loss    same for validation; empty when there is no
//               sampleable validation partition
//
// Example:
//   step,train_loss,val_loss
//   500,2.104512,2.187301
//   1000,1.733180,1.861422
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::ml::trainer::LossEstimate;

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header only when the file is new, so several runs
    /// can append to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics dir '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "step,train_loss,val_loss")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &LossEstimate) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        let val = m.validation.map(|v| format!("{v:.6}")).unwrap_or_default();
        writeln!(f, "{},{:.6},{}", m.step, m.train, val)?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
