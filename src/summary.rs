use std::path::PathBuf;

use serde::Serialize;

use crate::error::{ErrorKind, LoadError};
use crate::loader::LoadOutcome;

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub line: usize,
    pub kind: ErrorKind,
    pub cause: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub loaded: usize,
    pub updated: usize,
    /// Table footers such as "Squad Total".
    pub ignored: usize,
    pub skipped: Vec<SkippedRecord>,
    /// Set when the whole file was rejected.
    pub input_error: Option<String>,
    /// Set when cancellation stopped the file before its last record.
    pub abandoned: bool,
}

impl FileSummary {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            loaded: 0,
            updated: 0,
            ignored: 0,
            skipped: Vec::new(),
            input_error: None,
            abandoned: false,
        }
    }

    pub fn failed(path: PathBuf, err: &LoadError) -> Self {
        let mut out = Self::new(path);
        out.input_error = Some(err.to_string());
        out
    }

    pub fn record(&mut self, outcome: LoadOutcome) {
        match outcome {
            LoadOutcome::Loaded => self.loaded += 1,
            LoadOutcome::Updated => self.updated += 1,
        }
    }

    pub fn skip(&mut self, line: usize, err: &LoadError) {
        self.skipped.push(SkippedRecord {
            line,
            kind: err.kind(),
            cause: err.to_string(),
        });
    }

    pub fn skipped_count(&self, kind: ErrorKind) -> usize {
        self.skipped.iter().filter(|s| s.kind == kind).count()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub run_id: Option<i64>,
    pub files: Vec<FileSummary>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn loaded(&self) -> usize {
        self.files.iter().map(|f| f.loaded).sum()
    }

    pub fn updated(&self) -> usize {
        self.files.iter().map(|f| f.updated).sum()
    }

    pub fn skipped(&self) -> usize {
        self.files.iter().map(|f| f.skipped.len()).sum()
    }

    pub fn files_failed(&self) -> usize {
        self.files.iter().filter(|f| f.input_error.is_some()).count()
    }

    /// One line per skipped file or record, `kind: path:line: cause`.
    pub fn error_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for file in &self.files {
            if let Some(cause) = &file.input_error {
                out.push(format!("{}: {}", ErrorKind::Input.label(), cause));
            }
            for skip in &file.skipped {
                out.push(format!(
                    "{}: {}:{}: {}",
                    skip.kind.label(),
                    file.path.display(),
                    skip.line,
                    skip.cause
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_add_up_across_files() {
        let mut a = FileSummary::new("a.csv".into());
        a.record(LoadOutcome::Loaded);
        a.record(LoadOutcome::Loaded);
        a.skip(3, &LoadError::validation("date", "bad"));
        let mut b = FileSummary::new("b.csv".into());
        b.record(LoadOutcome::Updated);
        let c = FileSummary::failed("c.csv".into(), &LoadError::input("c.csv", "ragged"));

        let run = RunSummary {
            run_id: None,
            files: vec![a, b, c],
            cancelled: false,
        };
        assert_eq!(run.loaded(), 2);
        assert_eq!(run.updated(), 1);
        assert_eq!(run.skipped(), 1);
        assert_eq!(run.files_failed(), 1);
        let lines = run.error_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "ValidationError: a.csv:3: invalid field `date`: bad");
        assert!(lines[1].starts_with("InputError: input c.csv"));
    }
}
