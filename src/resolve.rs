//! Natural key to surrogate id resolution.
//!
//! Reference entities (competition, season, team, player) get their ids here.
//! The store is the source of truth: a key missing from the run's index is
//! looked up inside the caller's transaction and inserted if absent, so ids
//! are stable across runs without any state outside the database.

use std::collections::HashMap;

use log::debug;
use rusqlite::{Connection, OptionalExtension, ToSql, params};

use crate::error::LoadError;
use crate::normalize::{FixtureRecord, PlayerRecord};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    Competition(String),
    Season(String),
    Team {
        name: String,
        competition: i64,
        season: i64,
    },
    Player {
        name: String,
        team: i64,
        season: i64,
    },
}

/// Identifier index for one run.
///
/// Ids minted inside an open transaction are staged; they only join the
/// index once the caller commits, so a rolled back record cannot leave a
/// dangling id behind.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    index: HashMap<NaturalKey, i64>,
    staged: Vec<(NaturalKey, i64)>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &NaturalKey) -> Option<i64> {
        self.index.get(key).copied().or_else(|| {
            self.staged
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, id)| *id)
        })
    }

    fn stage(&mut self, key: NaturalKey, id: i64) {
        self.staged.push((key, id));
    }

    pub fn commit(&mut self) {
        for (key, id) in self.staged.drain(..) {
            self.index.insert(key, id);
        }
    }

    pub fn rollback(&mut self) {
        self.staged.clear();
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPlayer {
    pub player_id: i64,
    pub team_id: i64,
    pub season_id: i64,
    pub record: PlayerRecord,
}

#[derive(Debug, Clone)]
pub struct ResolvedFixture {
    pub competition_id: i64,
    pub season_id: i64,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub record: FixtureRecord,
}

pub fn resolve_player(
    conn: &Connection,
    ctx: &mut ResolutionContext,
    record: PlayerRecord,
) -> Result<ResolvedPlayer, LoadError> {
    let team = required("team", record.team.as_deref(), &record.name)?;
    let competition = required("competition", record.competition.as_deref(), team)?;
    let season = required("season", record.season.as_deref(), team)?;

    let competition_id = resolve_competition(conn, ctx, competition)?;
    let season_id = resolve_season(conn, ctx, season)?;
    let team_id = resolve_team(conn, ctx, team, competition_id, season_id)?;
    let player_id = resolve_player_id(conn, ctx, &record, team_id, season_id)?;

    Ok(ResolvedPlayer {
        player_id,
        team_id,
        season_id,
        record,
    })
}

pub fn resolve_fixture(
    conn: &Connection,
    ctx: &mut ResolutionContext,
    record: FixtureRecord,
) -> Result<ResolvedFixture, LoadError> {
    let label = record.date.to_string();
    let home = required("team", record.home_team.as_deref(), &label)?;
    let away = required("team", record.away_team.as_deref(), &label)?;
    let competition = required("competition", record.competition.as_deref(), &label)?;
    let season = required("season", record.season.as_deref(), &label)?;
    if home == away {
        return Err(LoadError::validation(
            "away_team",
            format!("`{home}` cannot play itself"),
        ));
    }

    let competition_id = resolve_competition(conn, ctx, competition)?;
    let season_id = resolve_season(conn, ctx, season)?;
    let home_team_id = resolve_team(conn, ctx, home, competition_id, season_id)?;
    let away_team_id = resolve_team(conn, ctx, away, competition_id, season_id)?;

    Ok(ResolvedFixture {
        competition_id,
        season_id,
        home_team_id,
        away_team_id,
        record,
    })
}

pub fn resolve_competition(
    conn: &Connection,
    ctx: &mut ResolutionContext,
    name: &str,
) -> Result<i64, LoadError> {
    find_or_create(
        conn,
        ctx,
        NaturalKey::Competition(name.to_string()),
        "SELECT idcompetition FROM competition WHERE nomcompetition = ?1",
        "INSERT INTO competition(nomcompetition) VALUES (?1)",
        params![name],
    )
}

pub fn resolve_season(
    conn: &Connection,
    ctx: &mut ResolutionContext,
    label: &str,
) -> Result<i64, LoadError> {
    find_or_create(
        conn,
        ctx,
        NaturalKey::Season(label.to_string()),
        "SELECT id_saison FROM saison WHERE annee = ?1",
        "INSERT INTO saison(annee) VALUES (?1)",
        params![label],
    )
}

pub fn resolve_team(
    conn: &Connection,
    ctx: &mut ResolutionContext,
    name: &str,
    competition_id: i64,
    season_id: i64,
) -> Result<i64, LoadError> {
    find_or_create(
        conn,
        ctx,
        NaturalKey::Team {
            name: name.to_string(),
            competition: competition_id,
            season: season_id,
        },
        "SELECT idequipe FROM equipe
         WHERE nomequipe = ?1 AND idcompetition = ?2 AND idsaison = ?3",
        "INSERT INTO equipe(nomequipe, idcompetition, idsaison) VALUES (?1, ?2, ?3)",
        params![name, competition_id, season_id],
    )
}

fn resolve_player_id(
    conn: &Connection,
    ctx: &mut ResolutionContext,
    record: &PlayerRecord,
    team_id: i64,
    season_id: i64,
) -> Result<i64, LoadError> {
    let key = NaturalKey::Player {
        name: record.name.clone(),
        team: team_id,
        season: season_id,
    };
    if let Some(id) = ctx.lookup(&key) {
        update_player_attributes(conn, id, record)?;
        return Ok(id);
    }

    // One team per player per season: the name alone finds the row.
    let existing = conn
        .query_row(
            "SELECT j.idjoueur, j.id_equipe, e.nomequipe
             FROM joueur j JOIN equipe e ON e.idequipe = j.id_equipe
             WHERE j.nomjoueur = ?1 AND j.id_saison = ?2",
            params![record.name, season_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    let id = match existing {
        Some((id, existing_team, _)) if existing_team == team_id => {
            update_player_attributes(conn, id, record)?;
            id
        }
        Some((_, _, other_team)) => {
            return Err(LoadError::unresolved(
                "player",
                format!(
                    "`{}` is already assigned to `{other_team}` this season",
                    record.name
                ),
            ));
        }
        None => {
            conn.execute(
                "INSERT INTO joueur(nomjoueur, position, nationalite, id_equipe, id_saison)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.name,
                    record.position,
                    record.nationality,
                    team_id,
                    season_id
                ],
            )?;
            conn.last_insert_rowid()
        }
    };
    ctx.stage(key, id);
    Ok(id)
}

// Last write wins; a blank incoming value keeps what is already stored.
fn update_player_attributes(
    conn: &Connection,
    player_id: i64,
    record: &PlayerRecord,
) -> Result<(), LoadError> {
    let changed = conn.execute(
        "UPDATE joueur
         SET position = COALESCE(?1, position), nationalite = COALESCE(?2, nationalite)
         WHERE idjoueur = ?3
           AND (position IS NOT COALESCE(?1, position)
                OR nationalite IS NOT COALESCE(?2, nationalite))",
        params![record.position, record.nationality, player_id],
    )?;
    if changed > 0 {
        debug!("updated attributes of player {} ({player_id})", record.name);
    }
    Ok(())
}

fn find_or_create(
    conn: &Connection,
    ctx: &mut ResolutionContext,
    key: NaturalKey,
    select: &str,
    insert: &str,
    args: &[&dyn ToSql],
) -> Result<i64, LoadError> {
    if let Some(id) = ctx.lookup(&key) {
        return Ok(id);
    }
    let existing = conn
        .query_row(select, args, |row| row.get::<_, i64>(0))
        .optional()?;
    let id = match existing {
        Some(id) => id,
        None => {
            conn.execute(insert, args)?;
            conn.last_insert_rowid()
        }
    };
    ctx.stage(key, id);
    Ok(id)
}

fn required<'a>(
    entity: &'static str,
    value: Option<&'a str>,
    owner: &str,
) -> Result<&'a str, LoadError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| LoadError::unresolved(entity, format!("no {entity} known for `{owner}`")))
}
