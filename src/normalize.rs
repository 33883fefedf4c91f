//! Typed records built from raw scraper rows.
//!
//! Everything here is a pure function of the raw record and the input's
//! context; nothing touches the store.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::LoadError;
use crate::raw::RawRecord;

/// Column aliases, after header normalization. The long forms are the
/// flattened two-level headers of fbref tables.
pub mod columns {
    pub const PLAYER: &[&str] = &["player", "unnamed:_0_level_0_player", "name", "player_name"];
    pub const NATION: &[&str] = &["nationality", "nation", "unnamed:_1_level_0_nation"];
    pub const POSITION: &[&str] = &["position", "pos", "unnamed:_2_level_0_pos"];
    pub const TEAM: &[&str] = &["team", "squad"];
    pub const COMPETITION: &[&str] = &["competition", "comp"];
    pub const SEASON: &[&str] = &["season"];
    pub const GOALS: &[&str] = &["goals", "gls", "performance_gls"];
    pub const ASSISTS: &[&str] = &["assists", "ast", "performance_ast"];
    pub const MATCHES_PLAYED: &[&str] = &["matches_played", "mp", "playing_time_mp"];
    pub const YELLOW: &[&str] = &["cards_yellow", "crdy", "performance_crdy", "yellow_cards"];
    pub const RED: &[&str] = &["cards_red", "crdr", "performance_crdr", "red_cards"];

    pub const DATE: &[&str] = &["date", "date_match"];
    pub const TIME: &[&str] = &["time", "kickoff", "heure"];
    pub const ROUND: &[&str] = &["round", "matchweek"];
    pub const VENUE: &[&str] = &["venue"];
    pub const OPPONENT: &[&str] = &["opponent"];
    pub const GOALS_FOR: &[&str] = &["gf", "goals_for"];
    pub const GOALS_AGAINST: &[&str] = &["ga", "goals_against"];
    pub const HOME_TEAM: &[&str] = &["home_team", "home"];
    pub const AWAY_TEAM: &[&str] = &["away_team", "away"];
    pub const GOALS_HOME: &[&str] = &["goals_home", "home_goals"];
    pub const GOALS_AWAY: &[&str] = &["goals_away", "away_goals"];
    pub const RESULT: &[&str] = &["result", "outcome", "resultat"];
}

/// Defaults that apply to every record of one input file.
#[derive(Debug, Clone, Default)]
pub struct InputContext {
    pub team: Option<String>,
    pub competition: Option<String>,
    pub season: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    pub fn from_goals(goals_for: u32, goals_against: u32) -> Self {
        if goals_for > goals_against {
            Self::Win
        } else if goals_for < goals_against {
            Self::Loss
        } else {
            Self::Draw
        }
    }

    pub fn inverse(self) -> Self {
        match self {
            Self::Win => Self::Loss,
            Self::Loss => Self::Win,
            Self::Draw => Self::Draw,
        }
    }

    /// Stored label in `resultatmatch.resultat`.
    pub fn label(self) -> &'static str {
        match self {
            Self::Win => "Victoire",
            Self::Loss => "Défaite",
            Self::Draw => "Nul",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        OUTCOME_SYNONYMS.get(fold(label).as_str()).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Venue {
    Home,
    Away,
    Neutral,
}

impl Venue {
    pub fn label(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Away => "Away",
            Self::Neutral => "Neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub name: String,
    pub team: Option<String>,
    pub competition: Option<String>,
    pub season: Option<String>,
    pub position: Option<String>,
    pub nationality: Option<String>,
    pub goals: u32,
    pub assists: u32,
    pub matches_played: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureRecord {
    pub date: NaiveDate,
    pub kickoff: Option<NaiveTime>,
    pub round: Option<String>,
    /// `Home` unless the fixture was played on neutral ground.
    pub venue: Venue,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub competition: Option<String>,
    pub season: Option<String>,
    pub score: Option<Score>,
    /// Label found in the source, seen from the home side. Informational only.
    pub reported_outcome: Option<Outcome>,
}

/// Result of normalizing a player row: either a record, or a table footer
/// that carries no player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerRow {
    Player(PlayerRecord),
    Aggregate,
}

pub fn normalize_player(raw: &RawRecord, ctx: &InputContext) -> Result<PlayerRow, LoadError> {
    let Some(name) = raw.text(columns::PLAYER).map(|s| collapse_whitespace(&s)) else {
        return Err(LoadError::validation("player", "missing player name"));
    };
    if is_aggregate_row(&name) {
        return Ok(PlayerRow::Aggregate);
    }

    let position = match raw.text(columns::POSITION) {
        Some(p) => Some(canonical_position(&p)?),
        None => None,
    };
    let nationality = raw.text(columns::NATION).map(|n| canonical_nationality(&n));

    Ok(PlayerRow::Player(PlayerRecord {
        name,
        team: team_field(raw, columns::TEAM, ctx),
        competition: competition_field(raw, ctx),
        season: season_field(raw, ctx)?,
        position,
        nationality,
        goals: parse_count("goals", raw.text(columns::GOALS))?,
        assists: parse_count("assists", raw.text(columns::ASSISTS))?,
        matches_played: parse_count("matches_played", raw.text(columns::MATCHES_PLAYED))?,
        yellow_cards: parse_count("cards_yellow", raw.text(columns::YELLOW))?,
        red_cards: parse_count("cards_red", raw.text(columns::RED))?,
    }))
}

/// Fixture rows come in two shapes: explicit home/away columns, or one
/// team's schedule (`opponent`, `venue`, `gf`, `ga`) that is turned around
/// so the record always reads from the home side.
pub fn normalize_fixture(raw: &RawRecord, ctx: &InputContext) -> Result<FixtureRecord, LoadError> {
    let Some(date_raw) = raw.text(columns::DATE) else {
        return Err(LoadError::validation("date", "missing match date"));
    };
    let date = parse_date(&date_raw)?;
    let kickoff = match raw.text(columns::TIME) {
        Some(t) => Some(parse_kickoff(&t)?),
        None => None,
    };
    let round = raw.text(columns::ROUND).map(|r| collapse_whitespace(&r));
    let venue = match raw.text(columns::VENUE) {
        Some(v) => Some(parse_venue(&v)?),
        None => None,
    };
    let reported = match raw.text(columns::RESULT) {
        Some(label) => Some(
            Outcome::from_label(&label)
                .ok_or_else(|| LoadError::validation("result", format!("unknown result `{label}`")))?,
        ),
        None => None,
    };

    let competition = competition_field(raw, ctx);
    let season = season_field(raw, ctx)?;

    if raw.has_any(columns::HOME_TEAM) || raw.has_any(columns::AWAY_TEAM) {
        let score = parse_score(
            ("goals_home", raw.text(columns::GOALS_HOME)),
            ("goals_away", raw.text(columns::GOALS_AWAY)),
        )?;
        return Ok(orient_neutral(FixtureRecord {
            date,
            kickoff,
            round,
            venue: match venue {
                Some(Venue::Neutral) => Venue::Neutral,
                _ => Venue::Home,
            },
            home_team: raw.text(columns::HOME_TEAM).map(|s| collapse_whitespace(&s)),
            away_team: raw.text(columns::AWAY_TEAM).map(|s| collapse_whitespace(&s)),
            competition,
            season,
            score,
            reported_outcome: reported,
        }));
    }

    let Some(venue) = venue else {
        return Err(LoadError::validation("venue", "missing venue on team fixture row"));
    };
    let team = team_field(raw, columns::TEAM, ctx);
    let opponent = raw.text(columns::OPPONENT).map(|s| collapse_whitespace(&s));
    let score = parse_score(
        ("gf", raw.text(columns::GOALS_FOR)),
        ("ga", raw.text(columns::GOALS_AGAINST)),
    )?;

    // Away and neutral rows put the opponent on the home side.
    let (home_team, away_team, score, reported_outcome) = if venue == Venue::Home {
        (team, opponent, score, reported)
    } else {
        (
            opponent,
            team,
            score.map(|s| Score {
                home: s.away,
                away: s.home,
            }),
            reported.map(Outcome::inverse),
        )
    };

    Ok(orient_neutral(FixtureRecord {
        date,
        kickoff,
        round,
        venue: if venue == Venue::Neutral {
            Venue::Neutral
        } else {
            Venue::Home
        },
        home_team,
        away_team,
        competition,
        season,
        score,
        reported_outcome,
    }))
}

// Both teams' schedules list a neutral-ground fixture with themselves as the
// "home" side; ordering by name makes the two rows agree on one orientation.
fn orient_neutral(mut rec: FixtureRecord) -> FixtureRecord {
    if rec.venue != Venue::Neutral {
        return rec;
    }
    if let (Some(home), Some(away)) = (&rec.home_team, &rec.away_team)
        && home > away
    {
        std::mem::swap(&mut rec.home_team, &mut rec.away_team);
        rec.score = rec.score.map(|s| Score {
            home: s.away,
            away: s.home,
        });
        rec.reported_outcome = rec.reported_outcome.map(Outcome::inverse);
    }
    rec
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y"];

pub fn parse_date(raw: &str) -> Result<NaiveDate, LoadError> {
    let trimmed = raw.trim();
    // "2024-08-16 00:00:00" and "2024-08-16T00:00:00" both carry a date prefix.
    let date_part = trimmed
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or(trimmed);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .ok_or_else(|| LoadError::validation("date", format!("unparseable date `{trimmed}`")))
}

pub fn parse_kickoff(raw: &str) -> Result<NaiveTime, LoadError> {
    let token = raw.split_whitespace().next().unwrap_or_default();
    NaiveTime::parse_from_str(token, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(token, "%H:%M:%S"))
        .map_err(|_| LoadError::validation("time", format!("unparseable kickoff time `{raw}`")))
}

/// Blank counts are zero; anything else must be a non-negative whole number.
pub fn parse_count(field: &'static str, raw: Option<String>) -> Result<u32, LoadError> {
    match raw {
        None => Ok(0),
        Some(s) => parse_whole_number(field, &s),
    }
}

fn parse_whole_number(field: &'static str, raw: &str) -> Result<u32, LoadError> {
    let mut s = raw.trim();
    // Shoot-out annotation, e.g. "1 (4)".
    if let Some(idx) = s.find('(') {
        s = s[..idx].trim();
    }
    let cleaned = s.replace(',', "");
    if let Ok(n) = cleaned.parse::<i64>() {
        if n < 0 {
            return Err(LoadError::validation(field, format!("negative count `{raw}`")));
        }
        return u32::try_from(n)
            .map_err(|_| LoadError::validation(field, format!("count out of range `{raw}`")));
    }
    match cleaned.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => {
            Ok(f as u32)
        }
        Ok(_) => Err(LoadError::validation(
            field,
            format!("not a non-negative whole number `{raw}`"),
        )),
        Err(_) => Err(LoadError::validation(field, format!("non-numeric value `{raw}`"))),
    }
}

fn parse_score(
    home: (&'static str, Option<String>),
    away: (&'static str, Option<String>),
) -> Result<Option<Score>, LoadError> {
    match (home.1, away.1) {
        (None, None) => Ok(None),
        (Some(h), Some(a)) => Ok(Some(Score {
            home: parse_whole_number(home.0, &h)?,
            away: parse_whole_number(away.0, &a)?,
        })),
        (None, Some(_)) => Err(LoadError::validation(home.0, "missing goals for one side")),
        (Some(_), None) => Err(LoadError::validation(away.0, "missing goals for one side")),
    }
}

/// Accepts `2024-2025`, `2024/2025` and `2024-25`; always yields `YYYY-YYYY`.
pub fn normalize_season(raw: &str) -> Result<String, LoadError> {
    let trimmed = raw.trim();
    let invalid = || LoadError::validation("season", format!("unrecognized season `{trimmed}`"));
    let parts = trimmed.split(['-', '/']).map(str::trim).collect::<Vec<_>>();
    let [start, end] = parts.as_slice() else {
        return Err(invalid());
    };
    if start.len() != 4 {
        return Err(invalid());
    }
    let start = start.parse::<u32>().map_err(|_| invalid())?;
    let next = start + 1;
    let matches_next = match end.len() {
        4 => end.parse::<u32>().map_err(|_| invalid())? == next,
        // Two-digit end: the year after `start` with those last digits, so
        // "1999-00" is 1999-2000.
        2 => end.parse::<u32>().map_err(|_| invalid())? == next % 100,
        _ => return Err(invalid()),
    };
    if !matches_next {
        return Err(invalid());
    }
    Ok(format!("{start}-{next}"))
}

pub fn canonical_position(raw: &str) -> Result<String, LoadError> {
    let mut roles: Vec<&'static str> = Vec::new();
    for part in raw.split([',', '/']).map(str::trim).filter(|p| !p.is_empty()) {
        let role = POSITION_SYNONYMS
            .get(fold(part).as_str())
            .copied()
            .ok_or_else(|| LoadError::validation("position", format!("unknown position `{part}`")))?;
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    if roles.is_empty() {
        return Err(LoadError::validation("position", format!("unknown position `{raw}`")));
    }
    Ok(roles.join(","))
}

/// fbref renders nations as `"eng ENG"`; the trailing code wins.
pub fn canonical_nationality(raw: &str) -> String {
    let folded = fold(raw);
    if let Some(code) = NATION_SYNONYMS.get(folded.as_str()) {
        return (*code).to_string();
    }
    let last = raw.split_whitespace().last().unwrap_or(raw);
    if last.len() == 3 && last.chars().all(|c| c.is_ascii_alphabetic()) {
        return last.to_ascii_uppercase();
    }
    collapse_whitespace(raw).to_uppercase()
}

fn parse_venue(raw: &str) -> Result<Venue, LoadError> {
    match fold(raw).as_str() {
        "home" | "h" | "domicile" => Ok(Venue::Home),
        "away" | "a" | "exterieur" | "extérieur" => Ok(Venue::Away),
        "neutral" | "n" | "neutre" => Ok(Venue::Neutral),
        _ => Err(LoadError::validation("venue", format!("unknown venue `{raw}`"))),
    }
}

fn team_field(raw: &RawRecord, aliases: &[&str], ctx: &InputContext) -> Option<String> {
    raw.text(aliases)
        .or_else(|| ctx.team.clone())
        .map(|s| collapse_whitespace(&s))
        .filter(|s| !s.is_empty())
}

fn competition_field(raw: &RawRecord, ctx: &InputContext) -> Option<String> {
    raw.text(columns::COMPETITION)
        .or_else(|| ctx.competition.clone())
        .map(|s| collapse_whitespace(&s))
        .filter(|s| !s.is_empty())
}

fn season_field(raw: &RawRecord, ctx: &InputContext) -> Result<Option<String>, LoadError> {
    match raw.text(columns::SEASON).or_else(|| ctx.season.clone()) {
        Some(s) if !s.trim().is_empty() => normalize_season(&s).map(Some),
        _ => Ok(None),
    }
}

fn is_aggregate_row(name: &str) -> bool {
    name.starts_with("Squad Total") || name.starts_with("Opponent Total")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold(s: &str) -> String {
    collapse_whitespace(s).to_lowercase()
}

static POSITION_SYNONYMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let table: &[(&str, &[&str])] = &[
        ("GK", &["gk", "g", "goalkeeper", "goalie", "keeper", "gardien"]),
        (
            "DF",
            &["df", "d", "defender", "defence", "defense", "défenseur", "defenseur", "cb", "lb", "rb", "fb", "wb"],
        ),
        (
            "MF",
            &["mf", "m", "midfielder", "midfield", "milieu", "cm", "dm", "am"],
        ),
        (
            "FW",
            &["fw", "f", "forward", "striker", "attaquant", "st", "cf", "lw", "rw", "winger"],
        ),
    ];
    let mut out = HashMap::new();
    for (canonical, synonyms) in table {
        for s in *synonyms {
            out.insert(*s, *canonical);
        }
    }
    out
});

static NATION_SYNONYMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("england", "ENG"),
        ("scotland", "SCO"),
        ("wales", "WAL"),
        ("northern ireland", "NIR"),
        ("ireland", "IRL"),
        ("republic of ireland", "IRL"),
        ("france", "FRA"),
        ("spain", "ESP"),
        ("germany", "GER"),
        ("italy", "ITA"),
        ("portugal", "POR"),
        ("netherlands", "NED"),
        ("belgium", "BEL"),
        ("brazil", "BRA"),
        ("argentina", "ARG"),
        ("norway", "NOR"),
        ("denmark", "DEN"),
        ("sweden", "SWE"),
        ("united states", "USA"),
        ("usa", "USA"),
    ])
});

static OUTCOME_SYNONYMS: Lazy<HashMap<&'static str, Outcome>> = Lazy::new(|| {
    HashMap::from([
        ("w", Outcome::Win),
        ("win", Outcome::Win),
        ("won", Outcome::Win),
        ("v", Outcome::Win),
        ("victoire", Outcome::Win),
        ("l", Outcome::Loss),
        ("loss", Outcome::Loss),
        ("lost", Outcome::Loss),
        ("défaite", Outcome::Loss),
        ("defaite", Outcome::Loss),
        ("d", Outcome::Draw),
        ("draw", Outcome::Draw),
        ("drawn", Outcome::Draw),
        ("n", Outcome::Draw),
        ("nul", Outcome::Draw),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> InputContext {
        InputContext {
            team: Some("Arsenal".to_string()),
            competition: Some("Premier League".to_string()),
            season: Some("2024-2025".to_string()),
        }
    }

    #[test]
    fn counts_coerce_blank_and_reject_text() {
        assert_eq!(parse_count("goals", None).unwrap(), 0);
        assert_eq!(parse_count("goals", Some("7".into())).unwrap(), 7);
        assert_eq!(parse_count("goals", Some("7.0".into())).unwrap(), 7);
        assert_eq!(parse_count("goals", Some("1,234".into())).unwrap(), 1234);
        assert_eq!(parse_count("goals", Some("1 (4)".into())).unwrap(), 1);
        assert!(parse_count("goals", Some("-1".into())).is_err());
        assert!(parse_count("goals", Some("2.5".into())).is_err());
        let err = parse_count("assists", Some("abc".into())).unwrap_err();
        assert!(matches!(err, LoadError::Validation { field: "assists", .. }));
    }

    #[test]
    fn dates_in_several_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 8, 16).unwrap();
        assert_eq!(parse_date("2024-08-16").unwrap(), expected);
        assert_eq!(parse_date("16/08/2024").unwrap(), expected);
        assert_eq!(parse_date("2024-08-16 00:00:00").unwrap(), expected);
        assert!(parse_date("next friday").is_err());
        assert!(parse_date("2024-13-01").is_err());
    }

    #[test]
    fn kickoff_ignores_local_time_suffix() {
        let t = parse_kickoff("20:00 (21:00)").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        assert!(parse_kickoff("eight").is_err());
    }

    #[test]
    fn seasons_are_canonical() {
        assert_eq!(normalize_season("2024-2025").unwrap(), "2024-2025");
        assert_eq!(normalize_season("2024/2025").unwrap(), "2024-2025");
        assert_eq!(normalize_season("2024-25").unwrap(), "2024-2025");
        assert!(normalize_season("2024-2026").is_err());
        assert!(normalize_season("2024-26").is_err());
        assert!(normalize_season("last year").is_err());
    }

    #[test]
    fn season_crossing_a_century() {
        assert_eq!(normalize_season("1999-00").unwrap(), "1999-2000");
        assert_eq!(normalize_season("1999/2000").unwrap(), "1999-2000");
        assert!(normalize_season("1999-01").is_err());
    }

    #[test]
    fn single_year_is_not_a_season() {
        let err = normalize_season("2022").unwrap_err();
        assert!(matches!(err, LoadError::Validation { field: "season", .. }));
    }

    #[test]
    fn positions_map_synonyms() {
        assert_eq!(canonical_position("Goalkeeper").unwrap(), "GK");
        assert_eq!(canonical_position(" gk ").unwrap(), "GK");
        assert_eq!(canonical_position("DF,MF").unwrap(), "DF,MF");
        assert_eq!(canonical_position("FW/Striker").unwrap(), "FW");
        assert!(canonical_position("Coach").is_err());
    }

    #[test]
    fn nationalities_take_the_code() {
        assert_eq!(canonical_nationality("eng ENG"), "ENG");
        assert_eq!(canonical_nationality("England"), "ENG");
        assert_eq!(canonical_nationality("br BRA"), "BRA");
        assert_eq!(canonical_nationality("nor"), "NOR");
    }

    #[test]
    fn outcome_from_goals_and_labels() {
        assert_eq!(Outcome::from_goals(2, 1), Outcome::Win);
        assert_eq!(Outcome::from_goals(0, 1), Outcome::Loss);
        assert_eq!(Outcome::from_goals(2, 2), Outcome::Draw);
        assert_eq!(Outcome::from_label(" W "), Some(Outcome::Win));
        assert_eq!(Outcome::from_label("Défaite"), Some(Outcome::Loss));
        assert_eq!(Outcome::from_label("Nul"), Some(Outcome::Draw));
        assert_eq!(Outcome::from_label("?"), None);
    }

    #[test]
    fn player_row_with_blank_assists() {
        let raw = RawRecord::new(1)
            .with("player", "J. Smith")
            .with("team", "Arsenal")
            .with("season", "2024-2025")
            .with("goals", "7")
            .with("assists", "")
            .with("cards_yellow", "2");
        let PlayerRow::Player(rec) = normalize_player(&raw, &InputContext::default()).unwrap() else {
            panic!("expected a player row");
        };
        assert_eq!(rec.name, "J. Smith");
        assert_eq!(rec.team.as_deref(), Some("Arsenal"));
        assert_eq!(rec.goals, 7);
        assert_eq!(rec.assists, 0);
        assert_eq!(rec.yellow_cards, 2);
        assert_eq!(rec.competition, None);
    }

    #[test]
    fn squad_total_is_aggregate() {
        let raw = RawRecord::new(20).with("player", "Squad Total");
        assert_eq!(normalize_player(&raw, &ctx()).unwrap(), PlayerRow::Aggregate);
    }

    #[test]
    fn away_fixture_is_turned_to_home_side() {
        let raw = RawRecord::new(1)
            .with("date", "2024-08-24")
            .with("time", "17:30")
            .with("venue", "Away")
            .with("opponent", "Aston Villa")
            .with("gf", "2")
            .with("ga", "0")
            .with("result", "W");
        let rec = normalize_fixture(&raw, &ctx()).unwrap();
        assert_eq!(rec.home_team.as_deref(), Some("Aston Villa"));
        assert_eq!(rec.away_team.as_deref(), Some("Arsenal"));
        assert_eq!(rec.score, Some(Score { home: 0, away: 2 }));
        assert_eq!(rec.reported_outcome, Some(Outcome::Loss));
        assert_eq!(rec.venue, Venue::Home);
    }

    #[test]
    fn neutral_fixture_orients_by_name() {
        let raw = RawRecord::new(1)
            .with("date", "2025-03-16")
            .with("venue", "Neutral")
            .with("opponent", "Liverpool")
            .with("gf", "2")
            .with("ga", "1");
        let newcastle = InputContext {
            team: Some("Newcastle Utd".to_string()),
            ..ctx()
        };
        let rec = normalize_fixture(&raw, &newcastle).unwrap();
        assert_eq!(rec.home_team.as_deref(), Some("Liverpool"));
        assert_eq!(rec.away_team.as_deref(), Some("Newcastle Utd"));
        assert_eq!(rec.score, Some(Score { home: 1, away: 2 }));
        assert_eq!(rec.venue, Venue::Neutral);
    }

    #[test]
    fn unplayed_fixture_has_no_score() {
        let raw = RawRecord::new(1)
            .with("date", "2025-05-25")
            .with("venue", "Home")
            .with("opponent", "Southampton")
            .with("gf", "")
            .with("ga", "");
        let rec = normalize_fixture(&raw, &ctx()).unwrap();
        assert_eq!(rec.score, None);
    }

    #[test]
    fn half_score_is_invalid() {
        let raw = RawRecord::new(1)
            .with("date", "2025-05-25")
            .with("home_team", "Arsenal")
            .with("away_team", "Chelsea")
            .with("goals_home", "1");
        let err = normalize_fixture(&raw, &ctx()).unwrap_err();
        assert!(matches!(err, LoadError::Validation { field: "goals_away", .. }));
    }
}
