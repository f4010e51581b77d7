// src/join.rs

use crate::error::Result;
use crate::model::ProjectRecord;
use crate::table::{Row, Table};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Columns tried, in order, for a project's identifier
pub const IDENTIFIER_COLUMNS: [&str; 5] =
    ["name", "project_name", "directory_name", "repo_name", "project"];

pub const CODE_LINES_COLUMN: &str = "code_lines";

/// Directory key -> line count, as loaded from a counts CSV
#[derive(Debug, Default, Clone)]
pub struct CountIndex {
    counts: HashMap<String, u64>,
    /// Entries whose count was not a non-negative integer
    pub coerced: usize,
}

impl CountIndex {
    pub fn from_table(table: &Table) -> Self {
        let mut index = CountIndex::default();
        for row in &table.rows {
            let key = row.get("directory_name").unwrap_or("").trim();
            if key.is_empty() {
                continue;
            }
            let raw = row.get(CODE_LINES_COLUMN).unwrap_or("0").trim();
            let value = raw.parse::<u64>().unwrap_or_else(|_| {
                warn!("Non-numeric code_lines '{}' for {}, using 0", raw, key);
                index.coerced += 1;
                0
            });
            index.counts.insert(key.to_string(), value);
        }
        index
    }

    pub fn read(path: &Path) -> Result<Self> {
        let index = Self::from_table(&Table::read(path)?);
        info!("Loaded {} code line entries", index.len());
        Ok(index)
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.counts.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<(String, u64)> for CountIndex {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        Self {
            counts: iter.into_iter().collect(),
            coerced: 0,
        }
    }
}

/// Join outcome plus the audit trail of what did not match
#[derive(Debug, Default, Serialize)]
pub struct JoinSummary {
    pub total: usize,
    pub matched: usize,
    /// Identifiers that were looked up and not found, in row order
    pub unmatched: Vec<String>,
    /// Rows with no usable identifier at all
    pub unidentified: usize,
}

impl JoinSummary {
    pub fn unmatched_count(&self) -> usize {
        self.total - self.matched
    }
}

#[derive(Debug)]
pub struct JoinOutput {
    pub records: Vec<ProjectRecord>,
    pub summary: JoinSummary,
}

impl JoinOutput {
    /// The joined table: every projects column plus `code_lines`
    pub fn to_table(&self, project_headers: &[String]) -> Table {
        let mut table = Table::new(project_headers.to_vec());
        table.ensure_column(CODE_LINES_COLUMN);
        table.rows = self
            .records
            .iter()
            .map(|record| {
                let mut row = record.row.clone();
                row.set(CODE_LINES_COLUMN, record.code_lines.to_string());
                row
            })
            .collect();
        table
    }
}

/// The identifier a row is matched on.
///
/// The first preferred column with a non-empty value wins; failing that, the
/// first non-blank value in the row. Surrounding whitespace is stripped.
pub fn identifier(row: &Row) -> Option<&str> {
    IDENTIFIER_COLUMNS
        .iter()
        .filter_map(|column| row.get(column))
        .find(|value| !value.is_empty())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| {
            row.iter()
                .map(|(_, value)| value.trim())
                .find(|value| !value.is_empty())
        })
}

/// Left-joins `rows` onto `counts`; unmatched rows get 0.
pub fn join(rows: &[Row], counts: &CountIndex) -> JoinOutput {
    let mut summary = JoinSummary {
        total: rows.len(),
        ..Default::default()
    };

    let records = rows
        .iter()
        .map(|row| {
            let code_lines = match identifier(row) {
                Some(id) => match counts.get(id) {
                    Some(lines) => {
                        debug!("Matched: {} -> {} lines", id, lines);
                        summary.matched += 1;
                        lines
                    }
                    None => {
                        debug!("No match found for: {}", id);
                        summary.unmatched.push(id.to_string());
                        0
                    }
                },
                None => {
                    summary.unidentified += 1;
                    0
                }
            };
            ProjectRecord {
                row: row.clone(),
                code_lines,
            }
        })
        .collect();

    if summary.unmatched_count() > 0 {
        warn!(
            "{} of {} projects had no line count",
            summary.unmatched_count(),
            summary.total
        );
    }

    JoinOutput { records, summary }
}

/// Reads both CSVs, joins them and writes the joined table to `output`.
pub fn join_files(projects: &Path, counts: &Path, output: &Path) -> Result<JoinSummary> {
    crate::error::require_file(projects)?;
    crate::error::require_file(counts)?;

    let index = CountIndex::read(counts)?;
    let table = Table::read(projects)?;
    let joined = join(&table.rows, &index);
    joined.to_table(&table.headers).write(output)?;

    info!(
        "Mapping complete: {} processed, {} matched, results saved to {}",
        joined.summary.total,
        joined.summary.matched,
        output.display()
    );
    Ok(joined.summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(pairs: &[(&str, u64)]) -> CountIndex {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_identifier_preference_order() {
        let row = Row::from_pairs([("repo_name", "r"), ("name", "n")]);
        assert_eq!(identifier(&row), Some("n"));

        let row = Row::from_pairs([("name", ""), ("project", "p")]);
        assert_eq!(identifier(&row), Some("p"));
    }

    #[test]
    fn test_identifier_falls_back_to_first_non_empty() {
        let row = Row::from_pairs([("id", " "), ("url", " owner/x "), ("z", "y")]);
        assert_eq!(identifier(&row), Some("owner/x"));

        let row = Row::from_pairs([("a", ""), ("b", "  ")]);
        assert_eq!(identifier(&row), None);
    }

    #[test]
    fn test_identifier_is_trimmed_and_case_sensitive() {
        let row = Row::from_pairs([("name", " Owner/Proj ")]);
        let counts = index(&[("owner/proj", 10), ("Owner/Proj", 7)]);
        let out = join(&[row], &counts);
        assert_eq!(out.records[0].code_lines, 7);
    }

    #[test]
    fn test_unmatched_row_defaults_to_zero() {
        let rows = vec![
            Row::from_pairs([("name", "a/one")]),
            Row::from_pairs([("name", "b/two")]),
            Row::from_pairs([("name", "")]),
        ];
        let out = join(&rows, &index(&[("a/one", 100)]));

        assert_eq!(out.records[0].code_lines, 100);
        assert_eq!(out.records[1].code_lines, 0);
        assert_eq!(out.summary.matched, 1);
        assert_eq!(out.summary.unmatched, vec!["b/two"]);
        assert_eq!(out.summary.unidentified, 1);
        assert_eq!(out.summary.matched + out.summary.unmatched_count(), rows.len());
    }

    #[test]
    fn test_joined_table_appends_one_column() {
        let headers = vec!["name".to_string(), "stars_region".to_string()];
        let rows = vec![Row::from_pairs([("name", "a"), ("stars_region", "1")])];
        let table = join(&rows, &index(&[])).to_table(&headers);

        assert_eq!(table.headers, vec!["name", "stars_region", "code_lines"]);
        assert_eq!(table.rows[0].get("code_lines"), Some("0"));
        assert_eq!(table.rows[0].get("stars_region"), Some("1"));
    }

    #[test]
    fn test_count_index_trims_and_coerces() {
        let table = Table::parse(
            "directory_name,code_lines\n a/b , 12 \n,5\nc/d,lots\n",
            Path::new("counts.csv"),
        )
        .unwrap();
        let index = CountIndex::from_table(&table);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("a/b"), Some(12));
        assert_eq!(index.get("c/d"), Some(0));
        assert_eq!(index.coerced, 1);
    }

    #[test]
    fn test_join_files_requires_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let result = join_files(
            &dir.path().join("projects.csv"),
            &dir.path().join("counts.csv"),
            &dir.path().join("out.csv"),
        );
        assert!(matches!(result, Err(crate::error::CensusError::MissingInput(_))));
    }
}
