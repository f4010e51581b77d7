// src/table.rs

use crate::error::{CensusError, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One CSV row as an ordered column -> value mapping.
///
/// Columns keep the order they were first set in. Lookups are by exact
/// column name; a column the source row did not have is `None`, which is
/// different from a present-but-empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut row = Row::new();
        for (k, v) in pairs {
            row.set(k, v);
        }
        row
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the value in place, or appends the column if it is new.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A header row plus data rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Reads a UTF-8 CSV file with a mandatory header row.
    pub fn read(path: &Path) -> Result<Table> {
        if !path.is_file() {
            return Err(CensusError::MissingInput(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|e| CensusError::io(path, e))?;
        Self::parse(&text, path)
    }

    /// Parses CSV text. `origin` is only used in error messages.
    pub fn parse(text: &str, origin: &Path) -> Result<Table> {
        let mut records = parse_records(text, origin)?.into_iter();
        let headers = records.next().ok_or_else(|| CensusError::Csv {
            path: origin.to_path_buf(),
            line: 1,
            reason: "missing header row".to_string(),
        })?;

        let rows = records
            .map(|values| {
                // Short rows leave trailing columns absent, extra values are dropped
                Row::from_pairs(headers.iter().cloned().zip(values))
            })
            .collect();

        Ok(Table { headers, rows })
    }

    /// Adds `column` to the header if it is not there yet.
    pub fn ensure_column(&mut self, column: &str) {
        if !self.headers.iter().any(|h| h == column) {
            self.headers.push(column.to_string());
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| CensusError::io(path, e))?;
        let mut out = BufWriter::new(file);
        let header: Vec<&str> = self.headers.iter().map(String::as_str).collect();
        writeln!(out, "{}", format_record(&header)).map_err(|e| CensusError::io(path, e))?;
        for row in &self.rows {
            let values: Vec<&str> = self
                .headers
                .iter()
                .map(|h| row.get(h).unwrap_or(""))
                .collect();
            writeln!(out, "{}", format_record(&values)).map_err(|e| CensusError::io(path, e))?;
        }
        out.flush().map_err(|e| CensusError::io(path, e))
    }
}

/// Writes a header, then flushes every appended record so a partial run
/// still leaves a usable file behind.
#[derive(Debug)]
pub struct CsvAppender {
    path: PathBuf,
    out: BufWriter<File>,
}

impl CsvAppender {
    pub fn create(path: &Path, headers: &[&str]) -> Result<Self> {
        let file = File::create(path).map_err(|e| CensusError::io(path, e))?;
        let mut appender = Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        };
        appender.append(headers)?;
        Ok(appender)
    }

    pub fn append(&mut self, fields: &[&str]) -> Result<()> {
        writeln!(self.out, "{}", format_record(fields))
            .and_then(|_| self.out.flush())
            .map_err(|e| CensusError::io(&self.path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Quotes a field if it contains a comma, quote, or line break
pub fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn format_record(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_records(text: &str, origin: &Path) -> Result<Vec<Vec<String>>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    // Whether the current record has seen anything at all; blank lines are skipped
    let mut touched = false;
    let mut in_quotes = false;
    let mut line = 1;
    let mut quote_line = 1;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => {
                    if c == '\n' {
                        line += 1;
                    }
                    field.push(c);
                }
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => {
                in_quotes = true;
                touched = true;
                quote_line = line;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                touched = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\r' | '\n' => {
                finish_record(&mut records, &mut record, &mut field, touched);
                touched = false;
                line += 1;
            }
            _ => {
                field.push(c);
                touched = true;
            }
        }
    }

    if in_quotes {
        return Err(CensusError::Csv {
            path: origin.to_path_buf(),
            line: quote_line,
            reason: "unterminated quoted field".to_string(),
        });
    }
    finish_record(&mut records, &mut record, &mut field, touched);

    Ok(records)
}

fn finish_record(
    records: &mut Vec<Vec<String>>,
    record: &mut Vec<String>,
    field: &mut String,
    touched: bool,
) {
    if touched {
        record.push(std::mem::take(field));
        records.push(std::mem::take(record));
    } else {
        record.clear();
        field.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Table {
        Table::parse(text, Path::new("test.csv")).unwrap()
    }

    #[test]
    fn test_parse_simple_table() {
        let table = parse("name,stars_region\na,1\nb,2\n");
        assert_eq!(table.headers, vec!["name", "stars_region"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].get("name"), Some("b"));
        assert_eq!(table.rows[1].get("stars_region"), Some("2"));
    }

    #[test]
    fn test_parse_quoted_fields() {
        let table = parse("name,desc\n\"x, y\",\"say \"\"hi\"\"\nthere\"\n");
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].get("name"), Some("x, y"));
        assert_eq!(table.rows[0].get("desc"), Some("say \"hi\"\nthere"));
    }

    #[test]
    fn test_parse_crlf_and_blank_lines() {
        let table = parse("a,b\r\n1,2\r\n\r\n3,4");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].get("b"), Some("4"));
    }

    #[test]
    fn test_short_row_leaves_column_absent() {
        let table = parse("a,b,c\n1,2\n");
        assert_eq!(table.rows[0].get("b"), Some("2"));
        assert_eq!(table.rows[0].get("c"), None);
    }

    #[test]
    fn test_strips_byte_order_mark() {
        let table = parse("\u{feff}name\nx\n");
        assert_eq!(table.headers, vec!["name"]);
    }

    #[test]
    fn test_unterminated_quote_is_an_error() {
        let err = Table::parse("a\n\"oops\n", Path::new("bad.csv")).unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_empty_input_has_no_header() {
        assert!(Table::parse("", Path::new("empty.csv")).is_err());
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("q\"q"), "\"q\"\"q\"");
    }

    #[test]
    fn test_row_set_replaces_in_place() {
        let mut row = Row::from_pairs([("a", "1"), ("b", "2")]);
        row.set("a", "9");
        row.set("c", "3");
        let cols: Vec<_> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(cols, vec!["a", "b", "c"]);
        assert_eq!(row.get("a"), Some("9"));
    }

    #[test]
    fn test_write_then_read_keeps_awkward_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut table = Table::new(vec!["name".into(), "note".into()]);
        table.rows.push(Row::from_pairs([("name", "a/b"), ("note", "x,\"y\"")]));
        table.write(&path).unwrap();

        let back = Table::read(&path).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_appender_flushes_each_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.csv");
        let mut appender = CsvAppender::create(&path, &["directory_name", "code_lines"]).unwrap();
        appender.append(&["o/p", "12"]).unwrap();

        // Readable before the appender is dropped
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "directory_name,code_lines\no/p,12\n");
    }
}
