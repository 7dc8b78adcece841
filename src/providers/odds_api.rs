use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{AppConfig, League, OddsSettings};
use crate::db::{OddsRow, insert_odds};
use crate::fixture_match::match_fixture;
use crate::http_client::get_text;
use crate::kickoff::parse_kickoff;

const ODDS_URL: &str = "https://api.the-odds-api.com/v4/sports";
const MARKET_H2H: &str = "h2h";
const MARKET_LABEL: &str = "1X2";
const SAMPLE_EVENTS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct OddsEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub commence_time: Option<String>,
    #[serde(default)]
    pub home_team: String,
    #[serde(default)]
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<OddsBookmaker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsBookmaker {
    pub key: String,
    #[serde(default)]
    pub markets: Vec<OddsMarket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsMarket {
    pub key: String,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub outcomes: Vec<OddsOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OddsOutcome {
    pub name: Option<String>,
    pub price: Option<f64>,
}

/// Trimmed-down event written to `raw/odds_sample_<league>.json` for inspection.
#[derive(Debug, Serialize)]
struct EventSample<'a> {
    id: Option<&'a str>,
    commence_time: Option<&'a str>,
    home_team: &'a str,
    away_team: &'a str,
    bookmakers: Vec<BookmakerSample<'a>>,
}

#[derive(Debug, Serialize)]
struct BookmakerSample<'a> {
    key: &'a str,
    markets: Vec<&'a str>,
}

/// Outcome of matching one league's events against stored fixtures.
#[derive(Debug, Clone, Default)]
pub struct OddsMatchReport {
    pub rows: Vec<OddsRow>,
    pub matched: usize,
    pub unmatched: usize,
    pub skipped_stale: usize,
}

pub fn parse_events_json(raw: &str) -> Result<Vec<OddsEvent>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).context("invalid odds json")
}

pub fn fetch_events(client: &Client, cfg: &AppConfig, league: League) -> Result<Vec<OddsEvent>> {
    let api_key = cfg.keys.odds_api.as_deref().context("ODDS_API_KEY missing")?;
    let url = format!("{ODDS_URL}/{}/odds", league.odds_sport_key());
    let body = get_text(
        client,
        &cfg.retry,
        &url,
        &[
            ("apiKey", api_key),
            ("markets", MARKET_H2H),
            ("oddsFormat", "decimal"),
            ("dateFormat", "iso"),
            ("regions", cfg.odds.regions.as_str()),
        ],
        &[],
    )
    .context("odds request failed")?;
    parse_events_json(&body)
}

/// True when the event kicked off more than `max_age_hours` before `now`.
/// Events without a parsable kickoff are kept; the matcher rejects them. So is
/// everything when `max_age_hours` reaches past the representable range.
pub fn is_stale(event: &OddsEvent, now: DateTime<Utc>, max_age_hours: i64) -> bool {
    let Some(cutoff) = Duration::try_hours(max_age_hours).and_then(|age| now.checked_sub_signed(age))
    else {
        return false;
    };
    event
        .commence_time
        .as_deref()
        .and_then(parse_kickoff)
        .is_some_and(|ko| ko < cutoff)
}

/// h2h prices of an event as odds rows, limited to `bookmakers` unless empty.
pub fn odds_rows_for_event(event: &OddsEvent, fixture_id: &str, bookmakers: &[String]) -> Vec<OddsRow> {
    let mut rows = Vec::new();
    for book in &event.bookmakers {
        if !bookmakers.is_empty() && !bookmakers.iter().any(|b| b.eq_ignore_ascii_case(&book.key)) {
            continue;
        }
        for market in book.markets.iter().filter(|m| m.key == MARKET_H2H) {
            for outcome in &market.outcomes {
                let (Some(selection), Some(price)) = (outcome.name.as_deref(), outcome.price) else {
                    continue;
                };
                if !price.is_finite() {
                    continue;
                }
                rows.push(OddsRow {
                    fixture_id: fixture_id.to_string(),
                    bookmaker: book.key.clone(),
                    market: MARKET_LABEL.to_string(),
                    selection: selection.to_string(),
                    price,
                    ts_utc: market.last_update.clone(),
                });
            }
        }
    }
    rows
}

/// Match every fresh event to a stored fixture and collect its odds rows.
/// Unmatched events are logged and dropped.
pub fn match_events(
    conn: &Connection,
    league: League,
    events: &[OddsEvent],
    settings: &OddsSettings,
    now: DateTime<Utc>,
) -> Result<OddsMatchReport> {
    let mut report = OddsMatchReport::default();
    for event in events {
        if is_stale(event, now, settings.max_age_hours) {
            report.skipped_stale += 1;
            continue;
        }
        let kickoff = event.commence_time.as_deref().unwrap_or_default();
        let fixture_id = match_fixture(
            conn,
            league.key(),
            kickoff,
            &event.home_team,
            &event.away_team,
            settings.tolerance_minutes,
        )?;
        let Some(fixture_id) = fixture_id else {
            info!(
                league = league.key(),
                home = %event.home_team,
                away = %event.away_team,
                kickoff,
                "odds event without fixture match"
            );
            report.unmatched += 1;
            continue;
        };
        report.matched += 1;
        report
            .rows
            .extend(odds_rows_for_event(event, &fixture_id, &settings.bookmakers));
    }
    Ok(report)
}

/// Rows written across leagues plus the leagues whose fetch or store failed.
#[derive(Debug, Default)]
pub struct OddsRun {
    pub written: usize,
    pub failures: Vec<(League, anyhow::Error)>,
}

/// Fetch, match and store odds for each league. A failing league is logged and
/// kept in [`OddsRun::failures`]; the remaining leagues still run.
pub fn fetch_odds(
    conn: &mut Connection,
    client: &Client,
    cfg: &AppConfig,
    leagues: &[League],
    now: DateTime<Utc>,
) -> OddsRun {
    let mut run = OddsRun::default();
    for &league in leagues {
        match odds_for_league(conn, client, cfg, league, now) {
            Ok(written) => run.written += written,
            Err(err) => {
                error!(league = league.key(), error = %format!("{err:#}"), "odds failed for league");
                run.failures.push((league, err));
            }
        }
    }
    run
}

fn odds_for_league(
    conn: &mut Connection,
    client: &Client,
    cfg: &AppConfig,
    league: League,
    now: DateTime<Utc>,
) -> Result<usize> {
    let events = fetch_events(client, cfg, league)?;
    if let Err(err) = write_sample(&cfg.data_dir, league, &events) {
        warn!(league = league.key(), error = %err, "could not write odds sample");
    }

    let report = match_events(conn, league, &events, &cfg.odds, now)?;
    let written = insert_odds(conn, &report.rows)?;
    info!(
        league = league.key(),
        events = events.len(),
        matched = report.matched,
        unmatched = report.unmatched,
        stale = report.skipped_stale,
        written,
        "odds stored"
    );
    Ok(written)
}

fn write_sample(data_dir: &Path, league: League, events: &[OddsEvent]) -> Result<PathBuf> {
    let sample = events
        .iter()
        .take(SAMPLE_EVENTS)
        .map(|ev| EventSample {
            id: ev.id.as_deref(),
            commence_time: ev.commence_time.as_deref(),
            home_team: &ev.home_team,
            away_team: &ev.away_team,
            bookmakers: ev
                .bookmakers
                .iter()
                .map(|b| BookmakerSample {
                    key: &b.key,
                    markets: b.markets.iter().map(|m| m.key.as_str()).collect(),
                })
                .collect(),
        })
        .collect::<Vec<_>>();

    let path = data_dir
        .join("raw")
        .join(format!("odds_sample_{}.json", league.key()));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create raw sample dir")?;
    }
    let json = serde_json::to_string_pretty(&sample).context("serialize odds sample")?;
    fs::write(&path, json).context("write odds sample")?;
    Ok(path)
}
