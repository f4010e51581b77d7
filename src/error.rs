// src/error.rs

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors. Anything that only affects a single file or value is
/// reported through the stage's result struct instead.
#[derive(Error, Debug)]
pub enum CensusError {
    #[error("invalid root path {}: {reason}", path.display())]
    Configuration { path: PathBuf, reason: String },

    #[error("required input file {} does not exist", .0.display())]
    MissingInput(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed CSV in {} (line {line}): {reason}", path.display())]
    Csv {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("failed to render chart {}: {reason}", path.display())]
    Render { path: PathBuf, reason: String },
}

impl CensusError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CensusError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn configuration(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CensusError::Configuration {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CensusError>;

/// Checks that `path` exists and is a directory.
pub fn require_dir(path: &std::path::Path) -> Result<()> {
    if !path.exists() {
        return Err(CensusError::configuration(path, "does not exist"));
    }
    if !path.is_dir() {
        return Err(CensusError::configuration(path, "is not a directory"));
    }
    Ok(())
}

/// Checks that a stage's input file is present before any work starts.
pub fn require_file(path: &std::path::Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CensusError::MissingInput(path.to_path_buf()))
    }
}
