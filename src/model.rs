// src/model.rs

use crate::table::Row;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Line count for one `level1/level2` project unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryCount {
    /// Two-level key, e.g. "0xbb/otp-authenticator"
    pub directory_key: String,
    pub code_lines: u64,
}

/// A file a batch could not read. The batch continues without it.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// A before/after snapshot sharing one identifying prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotPair {
    pub prefix: String,
    pub before_path: PathBuf,
    pub after_path: PathBuf,
}

/// Edit distance between the two sides of a snapshot pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistanceRecord {
    pub before_path: PathBuf,
    pub after_path: PathBuf,
    pub distance: usize,
}

/// A pair whose distance could not be computed
#[derive(Debug, Clone, Serialize)]
pub struct DistanceFailure {
    pub pair: SnapshotPair,
    pub reason: String,
}

/// One projects-table row with its joined line count
#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub row: Row,
    pub code_lines: u64,
}

/// Popularity tier, decided by three region markers that must agree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Lesser,
    Medium,
    High,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Lesser, Tier::Medium, Tier::High];

    /// The marker value all three region columns must carry
    pub fn marker(self) -> &'static str {
        match self {
            Tier::Lesser => "1",
            Tier::Medium => "2",
            Tier::High => "3",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tier::Lesser => "lesser",
            Tier::Medium => "medium",
            Tier::High => "high",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Lesser => "Low-popularity",
            Tier::Medium => "Medium-popularity",
            Tier::High => "High-popularity",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Values of one numeric column split by tier
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TierGroups {
    pub lesser: Vec<i64>,
    pub medium: Vec<i64>,
    pub high: Vec<i64>,
    /// Rows whose region markers matched no tier
    pub other: usize,
    /// Tier rows whose target value was not an integer and became 0
    pub coerced: usize,
}

impl TierGroups {
    pub fn get(&self, tier: Tier) -> &[i64] {
        match tier {
            Tier::Lesser => &self.lesser,
            Tier::Medium => &self.medium,
            Tier::High => &self.high,
        }
    }

    pub fn get_mut(&mut self, tier: Tier) -> &mut Vec<i64> {
        match tier {
            Tier::Lesser => &mut self.lesser,
            Tier::Medium => &mut self.medium,
            Tier::High => &mut self.high,
        }
    }

    pub fn total(&self) -> usize {
        self.lesser.len() + self.medium.len() + self.high.len() + self.other
    }

    /// Tier values as floats, in tier order
    pub fn as_series(&self) -> Vec<(Tier, Vec<f64>)> {
        Tier::ALL
            .iter()
            .map(|&tier| (tier, self.get(tier).iter().map(|&v| v as f64).collect()))
            .collect()
    }
}
