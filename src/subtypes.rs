// src/subtypes.rs

use crate::error::Result;
use crate::table::{Row, Table};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_GROUP_COLUMN: &str = "group";
pub const DEFAULT_SUBTYPE_COLUMN: &str = "matcha_subtype";

/// How often each categorical sub-type occurs within each group
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SubtypeBreakdown {
    /// group -> subtype -> count
    pub counts: BTreeMap<String, BTreeMap<String, usize>>,
}

impl SubtypeBreakdown {
    /// Rows missing either value are ignored.
    pub fn from_rows<'a, I>(rows: I, group_column: &str, subtype_column: &str) -> Self
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let mut breakdown = SubtypeBreakdown::default();
        for row in rows {
            let group = row.get(group_column).unwrap_or("").trim();
            let subtype = row.get(subtype_column).unwrap_or("").trim();
            if group.is_empty() || subtype.is_empty() {
                continue;
            }
            *breakdown
                .counts
                .entry(group.to_string())
                .or_default()
                .entry(subtype.to_string())
                .or_insert(0) += 1;
        }
        breakdown
    }

    pub fn read(path: &Path, group_column: &str, subtype_column: &str) -> Result<Self> {
        let table = Table::read(path)?;
        Ok(Self::from_rows(&table.rows, group_column, subtype_column))
    }

    pub fn groups(&self) -> Vec<&str> {
        self.counts.keys().map(String::as_str).collect()
    }

    /// Every sub-type seen in any group, sorted
    pub fn subtypes(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self
            .counts
            .values()
            .flat_map(|by_subtype| by_subtype.keys().map(String::as_str))
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }

    pub fn count(&self, group: &str, subtype: &str) -> usize {
        self.counts
            .get(group)
            .and_then(|by_subtype| by_subtype.get(subtype))
            .copied()
            .unwrap_or(0)
    }

    pub fn group_total(&self, group: &str) -> usize {
        self.counts
            .get(group)
            .map(|by_subtype| by_subtype.values().sum())
            .unwrap_or(0)
    }

    /// Share of `subtype` within `group`, in percent
    pub fn percentage(&self, group: &str, subtype: &str) -> f64 {
        match self.group_total(group) {
            0 => 0.0,
            total => self.count(group, subtype) as f64 / total as f64 * 100.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
