//! Batch driver: inputs in, committed rows and a run summary out.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;

use crate::config::LoaderConfig;
use crate::error::{FatalStoreError, LoadError};
use crate::loader::{LoadOutcome, load_fixture, load_player};
use crate::normalize::{InputContext, PlayerRow, columns, normalize_fixture, normalize_player};
use crate::raw::{RawRecord, read_csv_file};
use crate::resolve::ResolutionContext;
use crate::store;
use crate::summary::{FileSummary, RunSummary};

const PLAYER_STATS_MARKER: &str = "standard_stats";
const FIXTURES_MARKER: &str = "scores_fixtures";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    PlayerStats,
    Fixtures,
}

impl InputKind {
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        if name.contains(PLAYER_STATS_MARKER) {
            Some(Self::PlayerStats)
        } else if name.contains(FIXTURES_MARKER) {
            Some(Self::Fixtures)
        } else {
            None
        }
    }
}

/// One source file, or records already read on the caller's side.
#[derive(Debug, Clone)]
pub struct SourceInput {
    pub path: PathBuf,
    pub kind: Option<InputKind>,
    pub context: InputContext,
    records: Option<Vec<RawRecord>>,
}

impl SourceInput {
    pub fn from_file(path: PathBuf, context: InputContext) -> Self {
        Self {
            kind: InputKind::detect(&path),
            path,
            context,
            records: None,
        }
    }

    pub fn from_records(
        path: impl Into<PathBuf>,
        kind: InputKind,
        context: InputContext,
        records: Vec<RawRecord>,
    ) -> Self {
        Self {
            path: path.into(),
            kind: Some(kind),
            context,
            records: Some(records),
        }
    }

    fn take_records(&mut self) -> Result<Vec<RawRecord>, LoadError> {
        match self.records.take() {
            Some(records) => Ok(records),
            None => read_csv_file(&self.path),
        }
    }
}

/// Cooperative stop signal, checked before each file and each record.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Collects the cleaned team exports under `dir`, one folder per team.
///
/// Player stats come before fixtures so squads exist by the time schedules
/// reference them; within a kind, paths are sorted.
pub fn discover_inputs(dir: &Path, config: &LoaderConfig) -> Result<Vec<SourceInput>> {
    let mut files = Vec::new();
    collect_csv_files(dir, &mut files)
        .with_context(|| format!("scan input dir {}", dir.display()))?;
    files.sort();

    let mut stats = Vec::new();
    let mut fixtures = Vec::new();
    for path in files {
        let team = path
            .parent()
            .filter(|parent| *parent != dir)
            .and_then(|parent| parent.file_name())
            .and_then(|name| name.to_str())
            .map(|name| name.replace('_', " "));
        let context = InputContext {
            team,
            competition: Some(config.competition.clone()),
            season: Some(config.season.clone()),
        };
        let input = SourceInput::from_file(path, context);
        match input.kind {
            Some(InputKind::PlayerStats) => stats.push(input),
            Some(InputKind::Fixtures) => fixtures.push(input),
            None => debug!("ignoring {}", input.path.display()),
        }
    }
    stats.extend(fixtures);
    Ok(stats)
}

fn collect_csv_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_csv_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Runs every input through normalize, resolve and load.
///
/// Record and file failures end up in the summary. Only a store failure that
/// leaves the connection unusable stops the run; whatever was committed
/// before it stays committed.
pub fn run_batch(
    conn: &mut Connection,
    inputs: Vec<SourceInput>,
    cancel: &CancelToken,
) -> Result<RunSummary, FatalStoreError> {
    run_batch_observed(conn, inputs, cancel, |_| {})
}

/// `run_batch` that reports the running file summary after every record.
pub fn run_batch_observed(
    conn: &mut Connection,
    inputs: Vec<SourceInput>,
    cancel: &CancelToken,
    mut on_record: impl FnMut(&FileSummary),
) -> Result<RunSummary, FatalStoreError> {
    let mut ctx = ResolutionContext::new();
    let mut summary = RunSummary::default();

    for mut input in inputs {
        if cancel.is_cancelled() {
            info!("run cancelled before {}", input.path.display());
            summary.cancelled = true;
            break;
        }

        let Some(kind) = input.kind else {
            let err = LoadError::input(&input.path, "unrecognized input kind");
            warn!("skipping file: {err}");
            summary.files.push(FileSummary::failed(input.path, &err));
            continue;
        };
        let records = match input
            .take_records()
            .and_then(|records| check_columns(kind, &input.path, records))
        {
            Ok(records) => records,
            Err(err) => {
                warn!("skipping file: {err}");
                summary.files.push(FileSummary::failed(input.path, &err));
                continue;
            }
        };

        let mut file = FileSummary::new(input.path.clone());
        for raw in &records {
            if cancel.is_cancelled() {
                info!(
                    "run cancelled, abandoning {} at line {}",
                    input.path.display(),
                    raw.line
                );
                file.abandoned = true;
                summary.cancelled = true;
                break;
            }
            match process_record(conn, &mut ctx, kind, &input.context, raw) {
                Ok(Some(outcome)) => file.record(outcome),
                Ok(None) => file.ignored += 1,
                Err(LoadError::Store {
                    fatal: true,
                    source,
                }) => {
                    error!(
                        "store failure at {}:{}, {} loaded / {} updated so far",
                        input.path.display(),
                        raw.line,
                        summary.loaded() + file.loaded,
                        summary.updated() + file.updated
                    );
                    return Err(FatalStoreError {
                        file: input.path,
                        line: raw.line,
                        source,
                    });
                }
                Err(err) => {
                    debug!("{}:{}: {err}", input.path.display(), raw.line);
                    file.skip(raw.line, &err);
                }
            }
            on_record(&file);
        }

        info!(
            "{}: loaded={} updated={} skipped={} ignored={}",
            file.path.display(),
            file.loaded,
            file.updated,
            file.skipped.len(),
            file.ignored
        );
        let abandoned = file.abandoned;
        summary.files.push(file);
        if abandoned {
            break;
        }
    }

    Ok(summary)
}

/// `run_batch` bracketed by an `ingest_runs` audit row.
pub fn run_with_audit(
    conn: &mut Connection,
    inputs: Vec<SourceInput>,
    cancel: &CancelToken,
) -> Result<RunSummary> {
    let run_id = store::begin_run(conn, inputs.len())?;
    let mut summary = run_batch(conn, inputs, cancel)?;
    summary.run_id = Some(run_id);
    store::finish_run(conn, run_id, &summary)?;
    Ok(summary)
}

fn process_record(
    conn: &mut Connection,
    ctx: &mut ResolutionContext,
    kind: InputKind,
    input: &InputContext,
    raw: &RawRecord,
) -> Result<Option<LoadOutcome>, LoadError> {
    match kind {
        InputKind::PlayerStats => match normalize_player(raw, input)? {
            PlayerRow::Player(record) => load_player(conn, ctx, record).map(Some),
            PlayerRow::Aggregate => Ok(None),
        },
        InputKind::Fixtures => {
            let record = normalize_fixture(raw, input)?;
            load_fixture(conn, ctx, record).map(Some)
        }
    }
}

fn check_columns(
    kind: InputKind,
    path: &Path,
    records: Vec<RawRecord>,
) -> Result<Vec<RawRecord>, LoadError> {
    if records.is_empty() {
        return Ok(records);
    }
    let first = &records[0];
    let missing = match kind {
        InputKind::PlayerStats => (!first.has_any(columns::PLAYER)).then_some("player"),
        InputKind::Fixtures => {
            if !first.has_any(columns::DATE) {
                Some("date")
            } else if !first.has_any(columns::OPPONENT)
                && !(first.has_any(columns::HOME_TEAM) && first.has_any(columns::AWAY_TEAM))
            {
                Some("opponent")
            } else {
                None
            }
        }
    };
    match missing {
        Some(column) => Err(LoadError::input(
            path,
            format!("missing required column `{column}`"),
        )),
        None => Ok(records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_file_name() {
        assert_eq!(
            InputKind::detect(Path::new("SILVER/Arsenal/arsenal_standard_stats.csv")),
            Some(InputKind::PlayerStats)
        );
        assert_eq!(
            InputKind::detect(Path::new("Arsenal_Scores_Fixtures.csv")),
            Some(InputKind::Fixtures)
        );
        assert_eq!(InputKind::detect(Path::new("shooting.csv")), None);
    }

    #[test]
    fn missing_player_column_rejects_file() {
        let records = vec![RawRecord::new(1).with("gls", "3")];
        let err = check_columns(InputKind::PlayerStats, Path::new("x.csv"), records).unwrap_err();
        assert!(matches!(err, LoadError::Input { .. }));
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
