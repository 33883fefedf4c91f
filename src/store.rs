use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};

use crate::summary::RunSummary;

const DATA_DIR: &str = "fbref_loader";
const DB_FILE: &str = "football.sqlite";
const BUSY_TIMEOUT_SECS: u64 = 5;

/// Tables in dependency order: every table only references tables above it.
pub const TABLES: &[&str] = &[
    "competition",
    "saison",
    "equipe",
    "joueur",
    "match",
    "resultatmatch",
    "statistiquejoueur",
];

pub fn default_db_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(DB_FILE))
}

fn app_data_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_DATA_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(DATA_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(DATA_DIR),
    )
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))
        .context("set busy timeout")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS competition (
            idcompetition INTEGER PRIMARY KEY AUTOINCREMENT,
            nomcompetition TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS saison (
            id_saison INTEGER PRIMARY KEY AUTOINCREMENT,
            annee TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS equipe (
            idequipe INTEGER PRIMARY KEY AUTOINCREMENT,
            nomequipe TEXT NOT NULL,
            idcompetition INTEGER NOT NULL REFERENCES competition(idcompetition),
            idsaison INTEGER NOT NULL REFERENCES saison(id_saison),
            UNIQUE (nomequipe, idcompetition, idsaison)
        );

        CREATE TABLE IF NOT EXISTS joueur (
            idjoueur INTEGER PRIMARY KEY AUTOINCREMENT,
            nomjoueur TEXT NOT NULL,
            position TEXT NULL,
            nationalite TEXT NULL,
            id_equipe INTEGER NOT NULL REFERENCES equipe(idequipe),
            id_saison INTEGER NOT NULL REFERENCES saison(id_saison),
            UNIQUE (nomjoueur, id_saison)
        );
        CREATE INDEX IF NOT EXISTS idx_joueur_equipe ON joueur(id_equipe);

        CREATE TABLE IF NOT EXISTS "match" (
            idmatch INTEGER PRIMARY KEY AUTOINCREMENT,
            date_match TEXT NOT NULL,
            heure TEXT NULL,
            round TEXT NULL,
            venue TEXT NULL,
            idteamhome INTEGER NOT NULL REFERENCES equipe(idequipe),
            idteamaway INTEGER NOT NULL REFERENCES equipe(idequipe),
            id_competition INTEGER NOT NULL REFERENCES competition(idcompetition),
            id_saison INTEGER NOT NULL REFERENCES saison(id_saison),
            CHECK (idteamhome <> idteamaway),
            UNIQUE (date_match, idteamhome, idteamaway, id_competition, id_saison)
        );
        CREATE INDEX IF NOT EXISTS idx_match_date ON "match"(date_match);

        CREATE TABLE IF NOT EXISTS resultatmatch (
            idmatch INTEGER NOT NULL REFERENCES "match"(idmatch),
            idequipe INTEGER NOT NULL REFERENCES equipe(idequipe),
            butsmarques INTEGER NOT NULL CHECK (butsmarques >= 0),
            butsconcedes INTEGER NOT NULL CHECK (butsconcedes >= 0),
            resultat TEXT NOT NULL CHECK (resultat IN ('Victoire', 'Défaite', 'Nul')),
            PRIMARY KEY (idmatch, idequipe)
        );

        CREATE TABLE IF NOT EXISTS statistiquejoueur (
            idjoueur INTEGER NOT NULL REFERENCES joueur(idjoueur),
            idsaison INTEGER NOT NULL REFERENCES saison(id_saison),
            buts INTEGER NOT NULL DEFAULT 0 CHECK (buts >= 0),
            passesdecisives INTEGER NOT NULL DEFAULT 0 CHECK (passesdecisives >= 0),
            nbmatchesplayed INTEGER NOT NULL DEFAULT 0 CHECK (nbmatchesplayed >= 0),
            cartonsjaunes INTEGER NOT NULL DEFAULT 0 CHECK (cartonsjaunes >= 0),
            cartonsrouges INTEGER NOT NULL DEFAULT 0 CHECK (cartonsrouges >= 0),
            PRIMARY KEY (idjoueur, idsaison)
        );

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            files_total INTEGER NOT NULL,
            files_failed INTEGER NOT NULL DEFAULT 0,
            records_loaded INTEGER NOT NULL DEFAULT 0,
            records_updated INTEGER NOT NULL DEFAULT 0,
            records_skipped INTEGER NOT NULL DEFAULT 0,
            cancelled INTEGER NOT NULL DEFAULT 0,
            errors_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn begin_run(conn: &Connection, files_total: usize) -> Result<i64> {
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, files_total, errors_json)
         VALUES (?1, NULL, ?2, '[]')",
        params![Utc::now().to_rfc3339(), files_total as i64],
    )
    .context("insert ingest run")?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_run(conn: &Connection, run_id: i64, summary: &RunSummary) -> Result<()> {
    let errors_json =
        serde_json::to_string(&summary.error_lines()).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, files_failed = ?2, records_loaded = ?3,
             records_updated = ?4, records_skipped = ?5, cancelled = ?6, errors_json = ?7
         WHERE run_id = ?8",
        params![
            Utc::now().to_rfc3339(),
            summary.files_failed() as i64,
            summary.loaded() as i64,
            summary.updated() as i64,
            summary.skipped() as i64,
            bool_to_i64(summary.cancelled),
            errors_json,
            run_id
        ],
    )
    .context("update ingest run")?;
    Ok(())
}

/// Row counts per output table, in dependency order.
pub fn table_counts(conn: &Connection) -> Result<Vec<(&'static str, i64)>> {
    let mut out = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        let count = conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
                row.get::<_, i64>(0)
            })
            .with_context(|| format!("count rows in {table}"))?;
        out.push((*table, count));
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResultRow {
    pub match_id: i64,
    pub date: NaiveDate,
    pub team: String,
    pub opponent: String,
    pub goals_for: u32,
    pub goals_against: u32,
    pub outcome: String,
}

pub fn load_match_results(conn: &Connection) -> Result<Vec<MatchResultRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                r.idmatch, m.date_match, e.nomequipe, o.nomequipe,
                r.butsmarques, r.butsconcedes, r.resultat
            FROM resultatmatch r
            JOIN "match" m ON m.idmatch = r.idmatch
            JOIN equipe e ON e.idequipe = r.idequipe
            JOIN equipe o ON o.idequipe =
                CASE WHEN m.idteamhome = r.idequipe THEN m.idteamaway ELSE m.idteamhome END
            ORDER BY m.date_match ASC, r.idmatch ASC, e.nomequipe ASC
            "#,
        )
        .context("prepare match results query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(MatchResultRow {
                match_id: row.get(0)?,
                date: row.get(1)?,
                team: row.get(2)?,
                opponent: row.get(3)?,
                goals_for: row.get(4)?,
                goals_against: row.get(5)?,
                outcome: row.get(6)?,
            })
        })
        .context("query match results")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode match result row")?);
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatRow {
    pub player_id: i64,
    pub player: String,
    pub team: String,
    pub season: String,
    pub position: Option<String>,
    pub nationality: Option<String>,
    pub goals: u32,
    pub assists: u32,
    pub matches_played: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

pub fn load_player_stats(conn: &Connection) -> Result<Vec<PlayerStatRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                j.idjoueur, j.nomjoueur, e.nomequipe, sa.annee, j.position, j.nationalite,
                s.buts, s.passesdecisives, s.nbmatchesplayed, s.cartonsjaunes, s.cartonsrouges
            FROM statistiquejoueur s
            JOIN joueur j ON j.idjoueur = s.idjoueur
            JOIN equipe e ON e.idequipe = j.id_equipe
            JOIN saison sa ON sa.id_saison = s.idsaison
            ORDER BY e.nomequipe ASC, j.nomjoueur ASC
            "#,
        )
        .context("prepare player stats query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(PlayerStatRow {
                player_id: row.get(0)?,
                player: row.get(1)?,
                team: row.get(2)?,
                season: row.get(3)?,
                position: row.get(4)?,
                nationality: row.get(5)?,
                goals: row.get(6)?,
                assists: row.get(7)?,
                matches_played: row.get(8)?,
                yellow_cards: row.get(9)?,
                red_cards: row.get(10)?,
            })
        })
        .context("query player stats")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode player stat row")?);
    }
    Ok(out)
}

/// Match results whose team is not one of the match's two sides, or whose
/// match or team row is missing. Empty on a healthy store.
pub fn orphaned_match_results(conn: &Connection) -> Result<Vec<(i64, i64)>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT r.idmatch, r.idequipe
            FROM resultatmatch r
            LEFT JOIN "match" m ON m.idmatch = r.idmatch
            LEFT JOIN equipe e ON e.idequipe = r.idequipe
            WHERE m.idmatch IS NULL
               OR e.idequipe IS NULL
               OR r.idequipe NOT IN (m.idteamhome, m.idteamaway)
            "#,
        )
        .context("prepare integrity query")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))
        .context("query integrity")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode integrity row")?);
    }
    Ok(out)
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_reentrant() {
        let conn = open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let counts = table_counts(&conn).unwrap();
        assert_eq!(counts.len(), 7);
        assert!(counts.iter().all(|(_, n)| *n == 0));
    }

    #[test]
    fn outcome_column_is_closed() {
        let conn = open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO competition(nomcompetition) VALUES ('Premier League');
            INSERT INTO saison(annee) VALUES ('2024-2025');
            INSERT INTO equipe(nomequipe, idcompetition, idsaison) VALUES ('Arsenal', 1, 1);
            INSERT INTO equipe(nomequipe, idcompetition, idsaison) VALUES ('Chelsea', 1, 1);
            INSERT INTO "match"(date_match, idteamhome, idteamaway, id_competition, id_saison)
                VALUES ('2024-09-01', 1, 2, 1, 1);
            "#,
        )
        .unwrap();
        let err = conn.execute(
            "INSERT INTO resultatmatch(idmatch, idequipe, butsmarques, butsconcedes, resultat)
             VALUES (1, 1, 1, 0, 'Win?')",
            [],
        );
        assert!(err.is_err());
    }

    #[test]
    fn match_needs_two_distinct_teams() {
        let conn = open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO competition(nomcompetition) VALUES ('Premier League');
            INSERT INTO saison(annee) VALUES ('2024-2025');
            INSERT INTO equipe(nomequipe, idcompetition, idsaison) VALUES ('Arsenal', 1, 1);
            "#,
        )
        .unwrap();
        let err = conn.execute(
            r#"INSERT INTO "match"(date_match, idteamhome, idteamaway, id_competition, id_saison)
               VALUES ('2024-09-01', 1, 1, 1, 1)"#,
            [],
        );
        assert!(err.is_err());
    }
}
