// src/distance.rs

use crate::edit_distance::EditDistance;
use crate::error::{require_dir, CensusError, Result};
use crate::model::{DistanceFailure, DistanceRecord, SnapshotPair};
use crate::snapshot::SnapshotPairer;
use crate::table::{format_record, Table};
use indicatif::ProgressBar;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DISTANCE_HEADERS: [&str; 3] = ["First File", "Second File", "Levenshtein Distance"];

/// Everything one batch run produced
#[derive(Debug, Default, Serialize)]
pub struct DistanceReport {
    /// Successfully computed distances, folder order then pair order
    pub records: Vec<DistanceRecord>,
    /// Pairs skipped because a side could not be read as UTF-8 text
    pub failures: Vec<DistanceFailure>,
    pub folders_scanned: usize,
}

impl DistanceReport {
    pub fn pairs_found(&self) -> usize {
        self.records.len() + self.failures.len()
    }

    pub fn distances(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.distance).collect()
    }
}

/// Runs the pairer over every immediate subfolder of a root and measures
/// each pair with the configured edit-distance strategy.
pub struct DistanceBatchRunner {
    pairer: SnapshotPairer,
    metric: Box<dyn EditDistance>,
    progress: ProgressBar,
}

impl DistanceBatchRunner {
    pub fn new(pairer: SnapshotPairer, metric: Box<dyn EditDistance>) -> Self {
        Self {
            pairer,
            metric,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn run(&self, root: &Path) -> Result<DistanceReport> {
        require_dir(root)?;

        let folders = subfolders(root)?;
        info!("Found {} folders in {}", folders.len(), root.display());

        self.progress.set_length(folders.len() as u64);
        self.progress.set_message("Comparing snapshots");

        let mut report = DistanceReport {
            folders_scanned: folders.len(),
            ..Default::default()
        };

        for folder in &folders {
            let pairs = self.pairer.find_pairs(folder);
            debug!("{}: {} pair(s)", folder.display(), pairs.len());

            for pair in pairs {
                match self.measure(&pair) {
                    Ok(distance) => report.records.push(DistanceRecord {
                        before_path: pair.before_path,
                        after_path: pair.after_path,
                        distance,
                    }),
                    Err(reason) => {
                        warn!("Skipping pair {}: {}", pair.prefix, reason);
                        report.failures.push(DistanceFailure { pair, reason });
                    }
                }
            }
            self.progress.inc(1);
        }
        self.progress.finish_with_message("Distances computed");

        info!(
            "Total pairs found across all folders: {} ({} failed, using {})",
            report.pairs_found(),
            report.failures.len(),
            self.metric.name()
        );
        Ok(report)
    }

    fn measure(&self, pair: &SnapshotPair) -> std::result::Result<usize, String> {
        let before = read_text(&pair.before_path)?;
        let after = read_text(&pair.after_path)?;
        Ok(self.metric.distance(&before, &after))
    }
}

fn read_text(path: &Path) -> std::result::Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))
}

/// Immediate subdirectories of `root`, sorted by name
fn subfolders(root: &Path) -> Result<Vec<PathBuf>> {
    let mut folders: Vec<PathBuf> = fs::read_dir(root)
        .map_err(|e| CensusError::io(root, e))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    folders.sort();
    Ok(folders)
}

pub fn write_distances(records: &[DistanceRecord], path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| CensusError::io(path, e))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "{}", format_record(&DISTANCE_HEADERS)).map_err(|e| CensusError::io(path, e))?;
    for record in records {
        let before = record.before_path.to_string_lossy();
        let after = record.after_path.to_string_lossy();
        let distance = record.distance.to_string();
        writeln!(
            out,
            "{}",
            format_record(&[before.as_ref(), after.as_ref(), distance.as_str()])
        )
        .map_err(|e| CensusError::io(path, e))?;
    }
    out.flush().map_err(|e| CensusError::io(path, e))
}

/// Distance values read back from a distances CSV
#[derive(Debug, Default)]
pub struct DistanceColumn {
    pub values: Vec<i64>,
    /// Rows without a third column or with a non-integer value there
    pub skipped: usize,
}

/// Reads the third column of a distances CSV; the header names are not checked.
pub fn read_distances(path: &Path) -> Result<DistanceColumn> {
    let table = Table::read(path)?;
    let Some(column) = table.headers.get(2) else {
        return Err(CensusError::Csv {
            path: path.to_path_buf(),
            line: 1,
            reason: "expected at least 3 columns".to_string(),
        });
    };

    let mut result = DistanceColumn::default();
    for row in &table.rows {
        match row.get(column).map(|v| v.trim().parse::<i64>()) {
            Some(Ok(value)) => result.values.push(value),
            Some(Err(_)) => {
                warn!(
                    "Could not convert '{}' to integer, skipping row",
                    row.get(column).unwrap_or_default()
                );
                result.skipped += 1;
            }
            None => result.skipped += 1,
        }
    }
    if result.values.is_empty() {
        warn!("No valid distances found in {}", path.display());
    }
    Ok(result)
}
