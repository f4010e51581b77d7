// src/line_counter.rs

use crate::error::{require_dir, CensusError, Result};
use crate::model::{DirectoryCount, SkippedFile};
use crate::table::CsvAppender;
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const COUNT_HEADERS: [&str; 2] = ["directory_name", "code_lines"];

#[derive(Debug, Default, Serialize)]
pub struct LineCountReport {
    /// One entry per project unit, zero counts included
    pub counts: Vec<DirectoryCount>,
    pub skipped: Vec<SkippedFile>,
}

impl LineCountReport {
    pub fn total_lines(&self) -> u64 {
        self.counts.iter().map(|c| c.code_lines).sum()
    }
}

/// Counts non-blank lines per `root/level1/level2` project unit.
#[derive(Clone)]
pub struct LineCounter {
    /// Lowercase, dot-prefixed suffixes such as ".java"
    extensions: BTreeSet<String>,
    progress: ProgressBar,
}

impl Default for LineCounter {
    fn default() -> Self {
        Self::new([".java"])
    }
}

impl LineCounter {
    /// Extensions match case-insensitively; the leading dot is optional.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.as_ref().trim().to_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();
        Self {
            extensions,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn count(&self, root: &Path) -> Result<LineCountReport> {
        self.count_with(root, |_| Ok(()))
    }

    /// Like [`count`](Self::count), handing each unit's result to `sink` as
    /// soon as it is known. An error from `sink` aborts the run.
    pub fn count_with<F>(&self, root: &Path, mut sink: F) -> Result<LineCountReport>
    where
        F: FnMut(&DirectoryCount) -> Result<()>,
    {
        require_dir(root)?;

        let mut report = LineCountReport::default();
        let units = self.project_units(root, &mut report.skipped)?;

        self.progress.set_length(units.len() as u64);
        self.progress.set_message("Counting lines");

        for (directory_key, path) in units {
            let code_lines = self.count_project(&path, &mut report.skipped);
            debug!("{}: {} lines of code", directory_key, code_lines);

            let count = DirectoryCount {
                directory_key,
                code_lines,
            };
            sink(&count)?;
            report.counts.push(count);
            self.progress.inc(1);
        }
        self.progress.finish_with_message("Line count complete");

        info!(
            "Analyzed {} directories, {} lines total",
            report.counts.len(),
            report.total_lines()
        );
        Ok(report)
    }

    /// Counts under `root`, appending each unit's row to a counts CSV at
    /// `output` as soon as it is known.
    pub fn count_to_file(&self, root: &Path, output: &Path) -> Result<LineCountReport> {
        require_dir(root)?;
        let mut csv = CsvAppender::create(output, &COUNT_HEADERS)?;
        self.count_with(root, |count| {
            csv.append(&[count.directory_key.as_str(), count.code_lines.to_string().as_str()])
        })
    }

    /// `level1/level2` keys with their paths, both levels sorted by name
    fn project_units(
        &self,
        root: &Path,
        skipped: &mut Vec<SkippedFile>,
    ) -> Result<Vec<(String, PathBuf)>> {
        let mut units = Vec::new();
        for level1 in sorted_subdirs(root).map_err(|e| CensusError::io(root, e))? {
            let level2_dirs = match sorted_subdirs(&level1) {
                Ok(dirs) => dirs,
                Err(e) => {
                    warn!("Could not list {}: {}", level1.display(), e);
                    skipped.push(SkippedFile {
                        path: level1,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let level1_name = file_name(&level1);
            for level2 in level2_dirs {
                units.push((format!("{}/{}", level1_name, file_name(&level2)), level2));
            }
        }
        Ok(units)
    }

    fn count_project(&self, project: &Path, skipped: &mut Vec<SkippedFile>) -> u64 {
        let mut total = 0;
        for entry in WalkDir::new(project).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(project).to_path_buf();
                    warn!("Could not walk {}: {}", path.display(), e);
                    skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() || !self.matches(path) {
                continue;
            }

            match fs::read_to_string(path) {
                Ok(text) => total += count_non_blank(&text),
                Err(e) => {
                    warn!("Could not read {}: {}", path.display(), e);
                    skipped.push(SkippedFile {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        total
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&format!(".{}", ext.to_lowercase())))
            .unwrap_or(false)
    }
}

/// Lines with at least one non-whitespace character. `\n`, `\r\n` and a
/// lone `\r` all end a line.
pub fn count_non_blank(text: &str) -> u64 {
    text.split(['\n', '\r'])
        .filter(|line| !line.trim().is_empty())
        .count() as u64
}

fn sorted_subdirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
