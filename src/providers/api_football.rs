use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{FixtureBatch, push_seen};
use crate::config::{AppConfig, League};
use crate::db::FixtureRecord;
use crate::http_client::get_text;
use crate::kickoff::{format_kickoff, iso_date, parse_kickoff};

const FIXTURES_URL: &str = "https://api-football-v1.p.rapidapi.com/v3/fixtures";
const RAPIDAPI_HOST: &str = "api-football-v1.p.rapidapi.com";
pub const ID_PREFIX: &str = "af_";

#[derive(Debug, Deserialize)]
struct FixturesResponse {
    #[serde(default)]
    response: Vec<ApiFixtureItem>,
}

#[derive(Debug, Deserialize)]
struct ApiFixtureItem {
    fixture: ApiFixture,
    teams: ApiTeams,
    #[serde(default)]
    goals: Option<ApiGoals>,
}

#[derive(Debug, Deserialize)]
struct ApiFixture {
    id: u64,
    date: String,
    status: ApiStatus,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    short: String,
}

#[derive(Debug, Deserialize)]
struct ApiTeams {
    home: Option<ApiTeam>,
    away: Option<ApiTeam>,
}

#[derive(Debug, Deserialize)]
struct ApiTeam {
    id: u64,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiGoals {
    home: Option<i32>,
    away: Option<i32>,
}

/// Fetch and parse fixtures for one league between two dates (inclusive).
pub fn fetch_fixtures(
    client: &Client,
    cfg: &AppConfig,
    league: League,
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> Result<FixtureBatch> {
    let api_key = cfg
        .keys
        .rapidapi
        .as_deref()
        .context("RAPIDAPI_KEY missing")?;
    let league_id = league.api_football_id().to_string();
    let season = cfg.season.to_string();
    let from = iso_date(date_from);
    let to = iso_date(date_to);
    let body = get_text(
        client,
        &cfg.retry,
        FIXTURES_URL,
        &[
            ("league", league_id.as_str()),
            ("from", from.as_str()),
            ("to", to.as_str()),
            ("timezone", "UTC"),
            ("season", season.as_str()),
        ],
        &[("X-RapidAPI-Key", api_key), ("X-RapidAPI-Host", RAPIDAPI_HOST)],
    )
    .context("api-football fixtures request failed")?;

    let batch = parse_fixtures_json(&body, league, &cfg.season_label())?;
    info!(
        league = league.key(),
        %from,
        %to,
        fixtures = batch.fixtures.len(),
        "api-football fixtures fetched"
    );
    Ok(batch)
}

/// Parse an API-Football `/fixtures` payload.
pub fn parse_fixtures_json(raw: &str, league: League, season_label: &str) -> Result<FixtureBatch> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(FixtureBatch::default());
    }
    let parsed: FixturesResponse =
        serde_json::from_str(trimmed).context("invalid api-football fixtures json")?;

    let mut batch = FixtureBatch::default();
    for item in parsed.response {
        let Some(kickoff) = parse_kickoff(&item.fixture.date) else {
            debug!(fixture = item.fixture.id, date = %item.fixture.date, "skipping fixture with bad date");
            continue;
        };
        let home_team_id = item.teams.home.as_ref().map(|t| team_id(t.id));
        let away_team_id = item.teams.away.as_ref().map(|t| team_id(t.id));
        for team in [item.teams.home.as_ref(), item.teams.away.as_ref()]
            .into_iter()
            .flatten()
        {
            push_seen(&mut batch.teams, &team_id(team.id), &[team.name.as_deref()]);
        }
        let (home_goals, away_goals) = item
            .goals
            .as_ref()
            .map(|g| (g.home, g.away))
            .unwrap_or((None, None));

        batch.fixtures.push(FixtureRecord {
            fixture_id: format!("{ID_PREFIX}{}", item.fixture.id),
            league,
            season: season_label.to_string(),
            utc_kickoff: format_kickoff(&kickoff),
            home_team_id,
            away_team_id,
            status: item.fixture.status.short,
            home_goals,
            away_goals,
        });
    }
    Ok(batch)
}

fn team_id(id: u64) -> String {
    format!("{ID_PREFIX}{id}")
}
