use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::retry::RetryPolicy;

const DEFAULT_SEASON: i32 = 2025;
const DEFAULT_ODDS_TOLERANCE_MIN: i64 = 20;
const DEFAULT_ODDS_MAX_AGE_HOURS: i64 = 6;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BOOKMAKERS: &[&str] = &["bet365", "pinnacle", "williamhill"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum League {
    Epl,
    LaLiga,
    SerieA,
    Bundesliga,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown league key `{0}` (expected EPL, LaLiga, SerieA or Bundesliga)")]
pub struct UnknownLeague(pub String);

impl League {
    pub const ALL: [League; 4] = [
        League::Epl,
        League::LaLiga,
        League::SerieA,
        League::Bundesliga,
    ];

    /// Internal key stored in `fixtures.league`.
    pub fn key(self) -> &'static str {
        match self {
            League::Epl => "EPL",
            League::LaLiga => "LaLiga",
            League::SerieA => "SerieA",
            League::Bundesliga => "Bundesliga",
        }
    }

    pub fn api_football_id(self) -> u32 {
        match self {
            League::Epl => 39,
            League::LaLiga => 140,
            League::SerieA => 135,
            League::Bundesliga => 78,
        }
    }

    pub fn football_data_code(self) -> &'static str {
        match self {
            League::Epl => "PL",
            League::LaLiga => "PD",
            League::SerieA => "SA",
            League::Bundesliga => "BL1",
        }
    }

    pub fn odds_sport_key(self) -> &'static str {
        match self {
            League::Epl => "soccer_epl",
            League::LaLiga => "soccer_spain_la_liga",
            League::SerieA => "soccer_italy_serie_a",
            League::Bundesliga => "soccer_germany_bundesliga",
        }
    }
}

impl FromStr for League {
    type Err = UnknownLeague;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let t = raw.trim();
        League::ALL
            .into_iter()
            .find(|l| l.key().eq_ignore_ascii_case(t))
            .ok_or_else(|| UnknownLeague(t.to_string()))
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureProvider {
    ApiFootball,
    FootballData,
}

impl FromStr for FixtureProvider {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "api_football" | "apifootball" => Ok(FixtureProvider::ApiFootball),
            "football_data" | "footballdata" => Ok(FixtureProvider::FootballData),
            other => Err(format!(
                "unsupported fixture provider {other}, expected api_football or football_data"
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub rapidapi: Option<String>,
    pub football_data: Option<String>,
    pub odds_api: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EloSettings {
    pub k: f64,
    pub base: f64,
    pub home_adv: f64,
    /// Davidson draw parameter.
    pub draw_nu: f64,
}

impl Default for EloSettings {
    fn default() -> Self {
        Self {
            k: 20.0,
            base: 1500.0,
            home_adv: 55.0,
            draw_nu: 0.95,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OddsSettings {
    pub regions: String,
    /// Empty means every bookmaker.
    pub bookmakers: Vec<String>,
    pub tolerance_minutes: i64,
    /// Events that kicked off longer ago than this are skipped.
    pub max_age_hours: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub season: i32,
    pub provider: FixtureProvider,
    pub keys: ApiKeys,
    pub elo: EloSettings,
    pub odds: OddsSettings,
    pub http_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any variable source; unset or unparsable values fall
    /// back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let num = |key: &str, default: f64| {
            get(key)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(default)
        };

        let data_dir = get("FOOTY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));
        let db_path = get("FOOTY_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("footy.sqlite"));

        let season = get("FOOTY_SEASON")
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(DEFAULT_SEASON);
        let provider = get("FIXTURE_PROVIDER")
            .and_then(|v| v.parse::<FixtureProvider>().ok())
            .unwrap_or(FixtureProvider::FootballData);

        let elo_defaults = EloSettings::default();
        let elo = EloSettings {
            k: num("ELO_K", elo_defaults.k),
            base: num("ELO_BASE", elo_defaults.base),
            home_adv: num("HOME_ADV_ELO", elo_defaults.home_adv),
            draw_nu: num("DRAW_NU", elo_defaults.draw_nu),
        };

        // An explicitly empty ODDS_BOOKMAKERS means "all bookmakers".
        let bookmakers = match lookup("ODDS_BOOKMAKERS") {
            Some(raw) => split_list(&raw),
            None => DEFAULT_BOOKMAKERS.iter().map(|s| s.to_string()).collect(),
        };
        let odds = OddsSettings {
            regions: get("ODDS_REGIONS")
                .unwrap_or_else(|| "eu,uk".to_string())
                .to_ascii_lowercase(),
            bookmakers,
            tolerance_minutes: get("ODDS_MATCH_TOLERANCE_MIN")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(DEFAULT_ODDS_TOLERANCE_MIN)
                .clamp(1, 360),
            max_age_hours: get("ODDS_MAX_AGE_HOURS")
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v >= 0)
                .unwrap_or(DEFAULT_ODDS_MAX_AGE_HOURS),
        };

        Self {
            data_dir,
            db_path,
            season,
            provider,
            keys: ApiKeys {
                rapidapi: get("RAPIDAPI_KEY"),
                football_data: get("FOOTBALLDATA_KEY"),
                odds_api: get("ODDS_API_KEY"),
            },
            elo,
            odds,
            http_timeout_secs: get("HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            retry: RetryPolicy::from_lookup(&lookup),
        }
    }

    /// Season label stored on fixtures, e.g. `2025/2026`.
    pub fn season_label(&self) -> String {
        format!("{}/{}", self.season, self.season + 1)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ';', ' '])
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let cfg = config_from(&[]);
        assert_eq!(cfg.db_path, PathBuf::from("data").join("footy.sqlite"));
        assert_eq!(cfg.season_label(), "2025/2026");
        assert_eq!(cfg.provider, FixtureProvider::FootballData);
        assert_eq!(cfg.odds.tolerance_minutes, 20);
        assert_eq!(cfg.odds.bookmakers, vec!["bet365", "pinnacle", "williamhill"]);
        assert!(cfg.keys.odds_api.is_none());
        assert!((cfg.elo.home_adv - 55.0).abs() < 1e-9);
    }

    #[test]
    fn env_overrides() {
        let cfg = config_from(&[
            ("FOOTY_DATA_DIR", "/tmp/footy"),
            ("FIXTURE_PROVIDER", "api-football"),
            ("ODDS_BOOKMAKERS", ""),
            ("ODDS_MATCH_TOLERANCE_MIN", "9999"),
            ("ODDS_API_KEY", "  key  "),
            ("DRAW_NU", "nope"),
        ]);
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/footy").join("footy.sqlite"));
        assert_eq!(cfg.provider, FixtureProvider::ApiFootball);
        assert!(cfg.odds.bookmakers.is_empty());
        assert_eq!(cfg.odds.tolerance_minutes, 360);
        assert_eq!(cfg.keys.odds_api.as_deref(), Some("key"));
        assert!((cfg.elo.draw_nu - 0.95).abs() < 1e-9);
    }

    #[test]
    fn league_keys_parse_case_insensitively() {
        assert_eq!("epl".parse::<League>(), Ok(League::Epl));
        assert_eq!(" LaLiga ".parse::<League>(), Ok(League::LaLiga));
        assert_eq!(
            "MLS".parse::<League>(),
            Err(UnknownLeague("MLS".to_string()))
        );
    }
}
