use log::{debug, warn};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use serde::Serialize;

use crate::error::LoadError;
use crate::normalize::{FixtureRecord, Outcome, PlayerRecord};
use crate::resolve::{
    ResolutionContext, ResolvedFixture, ResolvedPlayer, resolve_fixture, resolve_player,
};

/// What happened to a record's fact row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadOutcome {
    Loaded,
    Updated,
}

/// Resolves and upserts one player row (player, then season stats) atomically.
pub fn load_player(
    conn: &mut Connection,
    ctx: &mut ResolutionContext,
    record: PlayerRecord,
) -> Result<LoadOutcome, LoadError> {
    in_record_transaction(conn, ctx, |tx, ctx| {
        let resolved = resolve_player(tx, ctx, record)?;
        upsert_player_stat(tx, &resolved)
    })
}

/// Resolves and upserts one fixture (match, then both results) atomically.
pub fn load_fixture(
    conn: &mut Connection,
    ctx: &mut ResolutionContext,
    record: FixtureRecord,
) -> Result<LoadOutcome, LoadError> {
    in_record_transaction(conn, ctx, |tx, ctx| {
        let resolved = resolve_fixture(tx, ctx, record)?;
        let (match_id, outcome) = upsert_match(tx, &resolved)?;
        upsert_match_results(tx, match_id, &resolved)?;
        Ok(outcome)
    })
}

fn in_record_transaction<T>(
    conn: &mut Connection,
    ctx: &mut ResolutionContext,
    f: impl FnOnce(&Transaction<'_>, &mut ResolutionContext) -> Result<T, LoadError>,
) -> Result<T, LoadError> {
    // Write lock at BEGIN: a concurrent run waits out busy_timeout here.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    match f(&tx, ctx) {
        Ok(value) => {
            if let Err(err) = tx.commit() {
                ctx.rollback();
                return Err(err.into());
            }
            ctx.commit();
            Ok(value)
        }
        Err(err) => {
            ctx.rollback();
            if let Err(rb) = tx.rollback() {
                warn!("rollback failed after record error: {rb}");
            }
            Err(err)
        }
    }
}

fn upsert_player_stat(tx: &Transaction<'_>, p: &ResolvedPlayer) -> Result<LoadOutcome, LoadError> {
    let exists = tx
        .query_row(
            "SELECT 1 FROM statistiquejoueur WHERE idjoueur = ?1 AND idsaison = ?2",
            params![p.player_id, p.season_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    let r = &p.record;
    tx.execute(
        r#"
        INSERT INTO statistiquejoueur (
            idjoueur, idsaison, buts, passesdecisives, nbmatchesplayed,
            cartonsjaunes, cartonsrouges
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(idjoueur, idsaison) DO UPDATE SET
            buts = excluded.buts,
            passesdecisives = excluded.passesdecisives,
            nbmatchesplayed = excluded.nbmatchesplayed,
            cartonsjaunes = excluded.cartonsjaunes,
            cartonsrouges = excluded.cartonsrouges
        "#,
        params![
            p.player_id,
            p.season_id,
            r.goals,
            r.assists,
            r.matches_played,
            r.yellow_cards,
            r.red_cards,
        ],
    )?;

    Ok(if exists {
        LoadOutcome::Updated
    } else {
        LoadOutcome::Loaded
    })
}

fn upsert_match(tx: &Transaction<'_>, m: &ResolvedFixture) -> Result<(i64, LoadOutcome), LoadError> {
    let r = &m.record;
    let existing = tx
        .query_row(
            r#"SELECT idmatch FROM "match"
               WHERE date_match = ?1 AND idteamhome = ?2 AND idteamaway = ?3
                 AND id_competition = ?4 AND id_saison = ?5"#,
            params![
                r.date,
                m.home_team_id,
                m.away_team_id,
                m.competition_id,
                m.season_id
            ],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match existing {
        Some(match_id) => {
            // A later file may lack kickoff or round; keep what is known.
            tx.execute(
                r#"UPDATE "match"
                   SET heure = COALESCE(?1, heure), round = COALESCE(?2, round), venue = ?3
                   WHERE idmatch = ?4"#,
                params![r.kickoff, r.round, r.venue.label(), match_id],
            )?;
            Ok((match_id, LoadOutcome::Updated))
        }
        None => {
            tx.execute(
                r#"INSERT INTO "match" (
                       date_match, heure, round, venue,
                       idteamhome, idteamaway, id_competition, id_saison
                   ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                params![
                    r.date,
                    r.kickoff,
                    r.round,
                    r.venue.label(),
                    m.home_team_id,
                    m.away_team_id,
                    m.competition_id,
                    m.season_id
                ],
            )?;
            Ok((tx.last_insert_rowid(), LoadOutcome::Loaded))
        }
    }
}

fn upsert_match_results(
    tx: &Transaction<'_>,
    match_id: i64,
    m: &ResolvedFixture,
) -> Result<(), LoadError> {
    let r = &m.record;
    let Some(score) = r.score else {
        debug!("match {match_id} on {} has no score yet", r.date);
        return Ok(());
    };

    let home_outcome = Outcome::from_goals(score.home, score.away);
    if let Some(reported) = r.reported_outcome
        && reported != home_outcome
    {
        warn!(
            "match {match_id} on {}: source says {:?} for the home side, goals say {:?}; using goals",
            r.date, reported, home_outcome
        );
    }

    let sides = [
        (m.home_team_id, score.home, score.away, home_outcome),
        (m.away_team_id, score.away, score.home, home_outcome.inverse()),
    ];
    for (team_id, goals_for, goals_against, outcome) in sides {
        tx.execute(
            r#"
            INSERT INTO resultatmatch (idmatch, idequipe, butsmarques, butsconcedes, resultat)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(idmatch, idequipe) DO UPDATE SET
                butsmarques = excluded.butsmarques,
                butsconcedes = excluded.butsconcedes,
                resultat = excluded.resultat
            "#,
            params![match_id, team_id, goals_for, goals_against, outcome.label()],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{Score, Venue};
    use crate::store::{load_match_results, open_in_memory, table_counts};
    use chrono::NaiveDate;

    fn fixture(home: &str, away: &str, score: Option<(u32, u32)>) -> FixtureRecord {
        FixtureRecord {
            date: NaiveDate::from_ymd_opt(2024, 9, 14).unwrap(),
            kickoff: None,
            round: Some("Matchweek 4".to_string()),
            venue: Venue::Home,
            home_team: Some(home.to_string()),
            away_team: Some(away.to_string()),
            competition: Some("Premier League".to_string()),
            season: Some("2024-2025".to_string()),
            score: score.map(|(home, away)| Score { home, away }),
            reported_outcome: None,
        }
    }

    #[test]
    fn draw_gives_two_nul_rows() {
        let mut conn = open_in_memory().unwrap();
        let mut ctx = ResolutionContext::new();
        let outcome = load_fixture(&mut conn, &mut ctx, fixture("Arsenal", "Chelsea", Some((2, 2))))
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded);

        let rows = load_match_results(&conn).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.outcome == "Nul"));
    }

    #[test]
    fn raw_label_never_overrides_goals() {
        let mut conn = open_in_memory().unwrap();
        let mut ctx = ResolutionContext::new();
        let mut rec = fixture("Arsenal", "Chelsea", Some((3, 1)));
        rec.reported_outcome = Some(Outcome::Loss);
        load_fixture(&mut conn, &mut ctx, rec).unwrap();

        let rows = load_match_results(&conn).unwrap();
        let arsenal = rows.iter().find(|r| r.team == "Arsenal").unwrap();
        let chelsea = rows.iter().find(|r| r.team == "Chelsea").unwrap();
        assert_eq!(arsenal.outcome, "Victoire");
        assert_eq!(chelsea.outcome, "Défaite");
        assert_eq!((chelsea.goals_for, chelsea.goals_against), (1, 3));
    }

    #[test]
    fn reload_updates_score_in_place() {
        let mut conn = open_in_memory().unwrap();
        let mut ctx = ResolutionContext::new();
        load_fixture(&mut conn, &mut ctx, fixture("Arsenal", "Chelsea", None)).unwrap();
        let outcome = load_fixture(&mut conn, &mut ctx, fixture("Arsenal", "Chelsea", Some((1, 0))))
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Updated);

        let counts = table_counts(&conn).unwrap();
        let matches = counts.iter().find(|(t, _)| *t == "match").unwrap().1;
        assert_eq!(matches, 1);
        assert_eq!(load_match_results(&conn).unwrap().len(), 2);
    }

    #[test]
    fn failed_record_leaves_no_rows_behind() {
        let mut conn = open_in_memory().unwrap();
        let mut ctx = ResolutionContext::new();
        let smith = |team: &str| PlayerRecord {
            name: "J. Smith".to_string(),
            team: Some(team.to_string()),
            competition: Some("Premier League".to_string()),
            season: Some("2024-2025".to_string()),
            position: None,
            nationality: None,
            goals: 1,
            assists: 0,
            matches_played: 3,
            yellow_cards: 0,
            red_cards: 0,
        };
        load_player(&mut conn, &mut ctx, smith("Arsenal")).unwrap();
        let known = ctx.len();

        // Chelsea gets created before the player conflict surfaces.
        assert!(load_player(&mut conn, &mut ctx, smith("Chelsea")).is_err());
        let teams: i64 = conn
            .query_row("SELECT COUNT(*) FROM equipe", [], |row| row.get(0))
            .unwrap();
        assert_eq!(teams, 1);
        assert_eq!(ctx.len(), known);
    }
}
