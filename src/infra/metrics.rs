// ============================================================
// Layer 6: Metrics Logger
// ============================================================
// Appends every training progress event to a CSV file so learning
// curves can be plotted after (or during) a run.
//
// Output file: <model_dir>/metrics.csv
//
//   epoch,update,avg_loss
//   1,10,4.183210
//   1,20,3.904417
//   ...
//
// A non-finite loss is written as-is ("NaN" / "inf"); nothing is
// clamped on the way to disk.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::error::Result;
use crate::ml::trainer::ProgressEvent;

const HEADER: &str = "epoch,update,avg_loss";

/// Logs progress events to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the directory if needed and write the header if the file is new.
    /// An existing file is appended to.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, event: &ProgressEvent) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{},{},{:.6}", event.epoch, event.updates, event.avg_loss)?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
