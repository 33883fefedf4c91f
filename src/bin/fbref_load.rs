use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;

use fbref_loader::config::{self, ConfigOverrides, LoaderConfig};
use fbref_loader::ingest::{self, CancelToken};
use fbref_loader::store;

/// Load cleaned fbref team exports into the football database.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Folder holding one sub-folder of CSV exports per team.
    #[arg(long)]
    input: Option<PathBuf>,

    /// SQLite database file; created if missing.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Competition for rows that do not name one.
    #[arg(long)]
    competition: Option<String>,

    /// Season for rows that do not name one, e.g. 2024-2025.
    #[arg(long)]
    season: Option<String>,

    /// Also write the run summary as JSON to this path.
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

fn main() -> Result<()> {
    config::load_dotenv();
    env_logger::init();

    let args = Args::parse();
    let config = LoaderConfig::resolve(ConfigOverrides {
        db_path: args.db,
        input_dir: args.input,
        competition: args.competition,
        season: args.season,
        summary_json: args.summary_json,
    })?;

    if !config.input_dir.is_dir() {
        return Err(anyhow!(
            "input dir {} does not exist",
            config.input_dir.display()
        ));
    }

    let inputs = ingest::discover_inputs(&config.input_dir, &config)?;
    if inputs.is_empty() {
        return Err(anyhow!(
            "no *_standard_stats.csv or *_scores_fixtures.csv under {}",
            config.input_dir.display()
        ));
    }

    let mut conn = store::open_db(&config.db_path)?;
    let summary = ingest::run_with_audit(&mut conn, inputs, &CancelToken::new())?;

    println!("Load complete");
    println!("DB: {}", config.db_path.display());
    println!(
        "Competition: {} / Season: {}",
        config.competition, config.season
    );
    println!(
        "Files: {} ({} rejected)",
        summary.files.len(),
        summary.files_failed()
    );
    println!(
        "Records: loaded={} updated={} skipped={}",
        summary.loaded(),
        summary.updated(),
        summary.skipped()
    );
    if summary.cancelled {
        println!("Run was cancelled before all inputs were processed");
    }

    for file in &summary.files {
        println!(
            "{}: loaded={} updated={} skipped={}{}",
            file.path.display(),
            file.loaded,
            file.updated,
            file.skipped.len(),
            if file.abandoned { " (abandoned)" } else { "" }
        );
    }

    let errors = summary.error_lines();
    if !errors.is_empty() {
        println!("Errors: {}", errors.len());
        for err in &errors {
            println!(" - {err}");
        }
    }

    for (table, count) in store::table_counts(&conn)? {
        println!("{table}: {count}");
    }

    if let Some(path) = &config.summary_json {
        let json = serde_json::to_string_pretty(&summary).context("serialize run summary")?;
        std::fs::write(path, json)
            .with_context(|| format!("write run summary {}", path.display()))?;
    }

    Ok(())
}
