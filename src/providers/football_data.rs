use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::blocking::Client;
use rusqlite::Connection;
use serde::Deserialize;
use tracing::{debug, info};

use super::{FixtureBatch, push_seen};
use crate::aliases::register_alias;
use crate::config::{AppConfig, League};
use crate::db::{FixtureRecord, upsert_team_profile};
use crate::http_client::get_text;
use crate::kickoff::{format_kickoff, iso_date, parse_kickoff};

const BASE_URL: &str = "https://api.football-data.org/v4";
pub const ID_PREFIX: &str = "fd_";

#[derive(Debug, Deserialize)]
struct MatchesResponse {
    #[serde(default)]
    matches: Vec<FdMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FdMatch {
    id: u64,
    utc_date: String,
    #[serde(default)]
    status: Option<String>,
    home_team: FdTeamRef,
    away_team: FdTeamRef,
    #[serde(default)]
    score: Option<FdScore>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FdTeamRef {
    id: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    tla: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FdScore {
    #[serde(default)]
    full_time: Option<FdScoreLine>,
}

#[derive(Debug, Deserialize)]
struct FdScoreLine {
    home: Option<i32>,
    away: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct TeamsResponse {
    #[serde(default)]
    teams: Vec<FdTeam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FdTeam {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    tla: Option<String>,
    #[serde(default)]
    area: Option<FdArea>,
}

#[derive(Debug, Deserialize)]
struct FdArea {
    name: Option<String>,
}

/// Official naming of one football-data.org team, as used for alias seeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamProfile {
    pub team_id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub tla: Option<String>,
    pub country: Option<String>,
}

/// Map football-data.org match status onto the internal status set.
pub fn map_status(raw: &str) -> &'static str {
    match raw {
        "SCHEDULED" | "TIMED" => "NS",
        "POSTPONED" => "TBD",
        "IN_PLAY" | "PAUSED" => "LIVE",
        "FINISHED" => "FT",
        _ => "TBD",
    }
}

pub fn fetch_fixtures(
    client: &Client,
    cfg: &AppConfig,
    league: League,
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> Result<FixtureBatch> {
    let token = auth_token(cfg)?;
    let from = iso_date(date_from);
    let to = iso_date(date_to);
    let body = get_text(
        client,
        &cfg.retry,
        &format!("{BASE_URL}/matches"),
        &[
            ("competitions", league.football_data_code()),
            ("dateFrom", from.as_str()),
            ("dateTo", to.as_str()),
        ],
        &[("X-Auth-Token", token)],
    )
    .context("football-data matches request failed")?;

    let batch = parse_matches_json(&body, league, &cfg.season_label())?;
    info!(
        league = league.key(),
        %from,
        %to,
        fixtures = batch.fixtures.len(),
        "football-data fixtures fetched"
    );
    Ok(batch)
}

/// Parse a football-data.org `/matches` payload.
pub fn parse_matches_json(raw: &str, league: League, season_label: &str) -> Result<FixtureBatch> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(FixtureBatch::default());
    }
    let parsed: MatchesResponse =
        serde_json::from_str(trimmed).context("invalid football-data matches json")?;

    let mut batch = FixtureBatch::default();
    for m in parsed.matches {
        let Some(kickoff) = parse_kickoff(&m.utc_date) else {
            debug!(fixture = m.id, date = %m.utc_date, "skipping match with bad date");
            continue;
        };
        for team in [&m.home_team, &m.away_team] {
            if let Some(id) = team.id {
                push_seen(
                    &mut batch.teams,
                    &prefixed(id),
                    &[
                        team.name.as_deref(),
                        team.short_name.as_deref(),
                        team.tla.as_deref(),
                    ],
                );
            }
        }
        let full_time = m.score.as_ref().and_then(|s| s.full_time.as_ref());
        batch.fixtures.push(FixtureRecord {
            fixture_id: prefixed(m.id),
            league,
            season: season_label.to_string(),
            utc_kickoff: format_kickoff(&kickoff),
            home_team_id: m.home_team.id.map(prefixed),
            away_team_id: m.away_team.id.map(prefixed),
            status: map_status(m.status.as_deref().unwrap_or("TBD")).to_string(),
            home_goals: full_time.and_then(|s| s.home),
            away_goals: full_time.and_then(|s| s.away),
        });
    }
    Ok(batch)
}

pub fn fetch_team_profiles(client: &Client, cfg: &AppConfig, league: League) -> Result<Vec<TeamProfile>> {
    let token = auth_token(cfg)?;
    let url = format!(
        "{BASE_URL}/competitions/{}/teams",
        league.football_data_code()
    );
    let body = get_text(client, &cfg.retry, &url, &[], &[("X-Auth-Token", token)])
        .context("football-data teams request failed")?;
    parse_teams_json(&body)
}

/// Parse a football-data.org `/competitions/{code}/teams` payload.
pub fn parse_teams_json(raw: &str) -> Result<Vec<TeamProfile>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let parsed: TeamsResponse =
        serde_json::from_str(trimmed).context("invalid football-data teams json")?;
    Ok(parsed
        .teams
        .into_iter()
        .map(|t| TeamProfile {
            team_id: prefixed(t.id),
            name: t.name.unwrap_or_default(),
            short_name: t.short_name.filter(|s| !s.trim().is_empty()),
            tla: t.tla.filter(|s| !s.trim().is_empty()),
            country: t.area.and_then(|a| a.name),
        })
        .collect())
}

/// Store official team names and register the aliases bookmakers commonly use.
///
/// Besides name, short name and TLA, each team gets `"<name> fc"` (when the name
/// has no "fc") and the name with `&` blanked out. Returns aliases added.
pub fn seed_team_aliases(conn: &Connection, profiles: &[TeamProfile]) -> Result<usize> {
    let mut added = 0usize;
    for p in profiles {
        let name = Some(p.name.as_str()).filter(|s| !s.is_empty());
        upsert_team_profile(conn, &p.team_id, name, p.country.as_deref())?;

        let official = [Some(p.name.as_str()), p.short_name.as_deref(), p.tla.as_deref()];
        added += register_alias(conn, &p.team_id, official.into_iter().flatten())?;

        let mut extra = Vec::new();
        if !p.name.to_lowercase().contains("fc") {
            extra.push(format!("{} fc", p.name));
        }
        extra.push(p.name.replace('&', " "));
        added += register_alias(conn, &p.team_id, &extra)?;
    }
    Ok(added)
}

/// Fetch a league's teams and seed their aliases.
pub fn seed_aliases(conn: &Connection, client: &Client, cfg: &AppConfig, league: League) -> Result<usize> {
    let profiles = fetch_team_profiles(client, cfg, league)?;
    let added = seed_team_aliases(conn, &profiles)?;
    info!(league = league.key(), teams = profiles.len(), added, "seeded team aliases");
    Ok(added)
}

fn auth_token(cfg: &AppConfig) -> Result<&str> {
    cfg.keys
        .football_data
        .as_deref()
        .context("FOOTBALLDATA_KEY missing")
}

fn prefixed(id: u64) -> String {
    format!("{ID_PREFIX}{id}")
}
