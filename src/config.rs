use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use crate::normalize::normalize_season;
use crate::store;

pub const DEFAULT_COMPETITION: &str = "Premier League";
pub const DEFAULT_SEASON: &str = "2024-2025";
pub const DEFAULT_INPUT_DIR: &str = "SILVER";

pub const ENV_DB: &str = "FBREF_DB";
pub const ENV_INPUT_DIR: &str = "FBREF_INPUT_DIR";
pub const ENV_COMPETITION: &str = "FBREF_COMPETITION";
pub const ENV_SEASON: &str = "FBREF_SEASON";
pub const ENV_SUMMARY_JSON: &str = "FBREF_SUMMARY_JSON";

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub db_path: PathBuf,
    pub input_dir: PathBuf,
    /// Competition for rows that do not name one.
    pub competition: String,
    /// Season for rows that do not name one, canonical `YYYY-YYYY`.
    pub season: String,
    pub summary_json: Option<PathBuf>,
}

/// Values given on the command line; they win over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<PathBuf>,
    pub input_dir: Option<PathBuf>,
    pub competition: Option<String>,
    pub season: Option<String>,
    pub summary_json: Option<PathBuf>,
}

/// `.env.local` first so it can shadow a shared `.env`.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

impl LoaderConfig {
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(
        overrides: ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env_value = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let db_path = overrides
            .db_path
            .or_else(|| env_value(ENV_DB).map(PathBuf::from))
            .or_else(store::default_db_path)
            .context("unable to resolve sqlite path")?;
        let input_dir = overrides
            .input_dir
            .or_else(|| env_value(ENV_INPUT_DIR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_DIR));
        let competition = overrides
            .competition
            .or_else(|| env_value(ENV_COMPETITION))
            .unwrap_or_else(|| DEFAULT_COMPETITION.to_string())
            .trim()
            .to_string();
        if competition.is_empty() {
            return Err(anyhow!("competition name must not be empty"));
        }
        let season_raw = overrides
            .season
            .or_else(|| env_value(ENV_SEASON))
            .unwrap_or_else(|| DEFAULT_SEASON.to_string());
        let season = normalize_season(&season_raw)
            .map_err(|e| anyhow!("invalid default season: {e}"))?;
        let summary_json = overrides
            .summary_json
            .or_else(|| env_value(ENV_SUMMARY_JSON).map(PathBuf::from));

        Ok(Self {
            db_path,
            input_dir,
            competition,
            season,
            summary_json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_env() {
        let cfg = LoaderConfig::resolve_with(
            ConfigOverrides {
                db_path: Some("x.sqlite".into()),
                ..Default::default()
            },
            env_of(&[]),
        )
        .unwrap();
        assert_eq!(cfg.competition, DEFAULT_COMPETITION);
        assert_eq!(cfg.season, DEFAULT_SEASON);
        assert_eq!(cfg.input_dir, PathBuf::from(DEFAULT_INPUT_DIR));
        assert!(cfg.summary_json.is_none());
    }

    #[test]
    fn overrides_beat_env() {
        let cfg = LoaderConfig::resolve_with(
            ConfigOverrides {
                season: Some("2023/24".into()),
                ..Default::default()
            },
            env_of(&[
                (ENV_DB, "/tmp/env.sqlite"),
                (ENV_SEASON, "2022-2023"),
                (ENV_COMPETITION, "La Liga"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/env.sqlite"));
        assert_eq!(cfg.season, "2023-2024");
        assert_eq!(cfg.competition, "La Liga");
    }

    #[test]
    fn bad_season_is_rejected() {
        let err = LoaderConfig::resolve_with(
            ConfigOverrides {
                db_path: Some("x.sqlite".into()),
                season: Some("soon".into()),
                ..Default::default()
            },
            env_of(&[]),
        );
        assert!(err.is_err());
    }
}
