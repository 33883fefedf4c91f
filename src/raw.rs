use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::error::LoadError;

/// A cell as handed over by the scraper.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Absent,
}

impl RawValue {
    /// Trimmed textual view; `None` for absent or blank cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || is_missing_marker(trimmed) {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Self::Number(n) if n.is_finite() => {
                if n.fract() == 0.0 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
            Self::Number(_) | Self::Absent => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

// pandas writes NaN back out as text when a cleaned frame is re-exported.
fn is_missing_marker(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "nan" | "none" | "null" | "n/a")
}

/// One row of an input file, keyed by normalized column name.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    /// 1-based data line number in the source file (header excluded).
    pub line: usize,
    fields: HashMap<String, RawValue>,
}

impl RawRecord {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            fields: HashMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: impl Into<RawValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: impl Into<RawValue>) {
        self.fields.insert(normalize_column(column), value.into());
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// First present, non-blank value among `aliases`.
    pub fn text(&self, aliases: &[&str]) -> Option<String> {
        aliases
            .iter()
            .filter_map(|alias| self.fields.get(*alias))
            .find_map(RawValue::as_text)
    }

    pub fn has_any(&self, aliases: &[&str]) -> bool {
        aliases.iter().any(|alias| self.fields.contains_key(*alias))
    }
}

/// Lower-case, trim and flatten a header the same way the cleaning step does.
pub fn normalize_column(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace('+', "_plus_")
}

/// Reads a whole CSV document into records.
///
/// Any structural problem (ragged rows, bad UTF-8, missing header) fails the
/// input as a whole; nothing is returned for a partially readable file.
pub fn read_csv_records<R: Read>(path: &Path, rdr: R) -> Result<Vec<RawRecord>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::None)
        .from_reader(rdr);

    let headers = reader
        .headers()
        .map_err(|e| LoadError::input(path, format!("unreadable header: {e}")))?
        .iter()
        .map(normalize_column)
        .collect::<Vec<_>>();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::input(path, "empty header row"));
    }

    let mut out = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.map_err(|e| LoadError::input(path, format!("malformed csv: {e}")))?;
        let mut record = RawRecord::new(idx + 1);
        for (column, cell) in headers.iter().zip(row.iter()) {
            if column.is_empty() {
                continue;
            }
            let value = if cell.trim().is_empty() {
                RawValue::Absent
            } else {
                RawValue::Text(cell.to_string())
            };
            // Duplicate headers: keep the first non-blank cell.
            let keep_existing = record
                .fields
                .get(column)
                .is_some_and(|existing| existing.as_text().is_some());
            if !keep_existing {
                record.fields.insert(column.clone(), value);
            }
        }
        out.push(record);
    }
    Ok(out)
}

pub fn read_csv_file(path: &Path) -> Result<Vec<RawRecord>, LoadError> {
    let file = std::fs::File::open(path)
        .map_err(|e| LoadError::input(path, format!("cannot open: {e}")))?;
    read_csv_records(path, file)
}
