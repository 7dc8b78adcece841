//! Daily run and history backfill.
//!
//! Everything a run touches (config, database, HTTP client, rating cache) lives in
//! [`PipelineContext`]. Steps never abort a run: a failing step is logged, recorded
//! in `pipeline_runs`, and the next step still runs.

use std::thread;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::blocking::Client;
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::config::{AppConfig, FixtureProvider, League};
use crate::db::{self, RunCounts};
use crate::elo::{EloRatings, rate_finished_fixtures};
use crate::http_client::build_http_client;
use crate::probabilities::compute_probs_for_upcoming;
use crate::providers::{self, FixtureBatch, api_football, football_data, odds_api};

pub const DEFAULT_DAYS_AHEAD: i64 = 2;
pub const DEFAULT_CHUNK_DAYS: i64 = 1;
const BACKFILL_PAUSE: StdDuration = StdDuration::from_millis(1200);

pub struct PipelineContext {
    pub config: AppConfig,
    pub conn: Connection,
    pub client: Client,
    pub ratings: EloRatings,
}

impl PipelineContext {
    /// Open the configured database (schema included) and build the HTTP client.
    pub fn open(config: AppConfig) -> Result<Self> {
        let conn = db::open_db(&config.db_path)?;
        Self::with_connection(config, conn)
    }

    pub fn with_connection(config: AppConfig, conn: Connection) -> Result<Self> {
        let client = build_http_client(config.http_timeout_secs)?;
        let ratings = EloRatings::new(config.elo.clone());
        Ok(Self {
            config,
            conn,
            client,
            ratings,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DailyOptions {
    pub leagues: Vec<League>,
    pub days_ahead: i64,
    /// Overrides the configured fixture provider.
    pub provider: Option<FixtureProvider>,
}

impl Default for DailyOptions {
    fn default() -> Self {
        Self {
            leagues: vec![League::Epl],
            days_ahead: DEFAULT_DAYS_AHEAD,
            provider: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DailySummary {
    pub run_id: i64,
    pub counts: RunCounts,
    pub errors: Vec<String>,
}

/// Fetch one league's fixtures from `provider` for `[from, to]`.
pub fn fetch_fixtures(
    client: &Client,
    cfg: &AppConfig,
    provider: FixtureProvider,
    league: League,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<FixtureBatch> {
    match provider {
        FixtureProvider::ApiFootball => api_football::fetch_fixtures(client, cfg, league, from, to),
        FixtureProvider::FootballData => football_data::fetch_fixtures(client, cfg, league, from, to),
    }
}

/// Fixtures for today..today+days, odds, Elo updates from finished games, then
/// probabilities for upcoming fixtures.
pub fn run_daily(ctx: &mut PipelineContext, opts: &DailyOptions, now: DateTime<Utc>) -> Result<DailySummary> {
    let run_id = db::begin_run(&ctx.conn, &opts.leagues)?;
    let mut summary = DailySummary {
        run_id,
        ..DailySummary::default()
    };
    let provider = opts.provider.unwrap_or(ctx.config.provider);
    let date_from = now.date_naive();
    let date_to = Duration::try_days(opts.days_ahead.max(0))
        .and_then(|ahead| date_from.checked_add_signed(ahead))
        .unwrap_or(NaiveDate::MAX);

    for &league in &opts.leagues {
        let stored = fetch_fixtures(&ctx.client, &ctx.config, provider, league, date_from, date_to)
            .and_then(|batch| providers::store_fixture_batch(&mut ctx.conn, &batch));
        match stored {
            Ok(n) => summary.counts.fixtures_upserted += n,
            Err(err) => record_failure(&mut summary.errors, &format!("fixtures {}", league.key()), &err),
        }
    }
    info!(fixtures = summary.counts.fixtures_upserted, "fixtures step done");

    if ctx.config.keys.odds_api.is_some() {
        let odds = odds_api::fetch_odds(&mut ctx.conn, &ctx.client, &ctx.config, &opts.leagues, now);
        summary.counts.odds_written = odds.written;
        for (league, err) in &odds.failures {
            record_failure(&mut summary.errors, &format!("odds {}", league.key()), err);
        }
    } else {
        warn!("ODDS_API_KEY not set, skipping odds");
    }

    match rate_finished_fixtures(&mut ctx.conn, &mut ctx.ratings) {
        Ok(n) => summary.counts.fixtures_rated = n,
        Err(err) => record_failure(&mut summary.errors, "elo", &err),
    }

    match compute_probs_for_upcoming(&mut ctx.conn, &mut ctx.ratings) {
        Ok(n) => summary.counts.probs_written = n,
        Err(err) => record_failure(&mut summary.errors, "probabilities", &err),
    }

    db::finish_run(&ctx.conn, run_id, &summary.counts, &summary.errors)?;
    info!(
        run_id,
        fixtures = summary.counts.fixtures_upserted,
        odds = summary.counts.odds_written,
        rated = summary.counts.fixtures_rated,
        probs = summary.counts.probs_written,
        errors = summary.errors.len(),
        "daily run finished"
    );
    Ok(summary)
}

#[derive(Debug, Clone, Default)]
pub struct BackfillSummary {
    pub fixtures_upserted: usize,
    pub fixtures_rated: usize,
    pub failed_chunks: Vec<String>,
}

/// Consecutive `[start, end]` ranges of at most `chunk_days` days covering `[from, to]`.
pub fn date_chunks(from: NaiveDate, to: NaiveDate, chunk_days: i64) -> Vec<(NaiveDate, NaiveDate)> {
    let step = chunk_days.max(1);
    let mut chunks = Vec::new();
    let mut start = from;
    while start <= to {
        let end = Duration::try_days(step - 1)
            .and_then(|span| start.checked_add_signed(span))
            .map_or(to, |end| end.min(to));
        chunks.push((start, end));
        let Some(next) = end.succ_opt() else {
            break;
        };
        start = next;
    }
    chunks
}

/// Load historical fixtures chunk by chunk, pausing between requests to stay
/// under provider rate limits, then fold finished results into the ratings.
pub fn backfill(
    ctx: &mut PipelineContext,
    leagues: &[League],
    from: NaiveDate,
    to: NaiveDate,
    chunk_days: i64,
) -> Result<BackfillSummary> {
    let mut summary = BackfillSummary::default();
    let chunks = date_chunks(from, to, chunk_days);
    info!(%from, %to, chunks = chunks.len(), "starting backfill");

    for (idx, (start, end)) in chunks.iter().enumerate() {
        if idx > 0 {
            thread::sleep(BACKFILL_PAUSE);
        }
        for &league in leagues {
            let stored = fetch_fixtures(&ctx.client, &ctx.config, ctx.config.provider, league, *start, *end)
                .and_then(|batch| providers::store_fixture_batch(&mut ctx.conn, &batch));
            match stored {
                Ok(n) => summary.fixtures_upserted += n,
                Err(err) => {
                    let label = format!("{} {start}..{end}", league.key());
                    error!(chunk = %label, error = %format!("{err:#}"), "backfill chunk failed");
                    summary.failed_chunks.push(label);
                }
            }
        }
    }

    summary.fixtures_rated = rate_finished_fixtures(&mut ctx.conn, &mut ctx.ratings)
        .context("rate backfilled fixtures")?;
    info!(
        fixtures = summary.fixtures_upserted,
        rated = summary.fixtures_rated,
        failed = summary.failed_chunks.len(),
        "backfill finished"
    );
    Ok(summary)
}

/// Seed team aliases from football-data.org's team lists. Returns aliases added.
pub fn seed_aliases(ctx: &PipelineContext, leagues: &[League]) -> Result<usize> {
    let mut added = 0usize;
    for &league in leagues {
        added += football_data::seed_aliases(&ctx.conn, &ctx.client, &ctx.config, league)
            .with_context(|| format!("seed aliases for {}", league.key()))?;
    }
    Ok(added)
}

fn record_failure(errors: &mut Vec<String>, step: &str, err: &anyhow::Error) {
    let detail = format!("{err:#}");
    error!(step, error = %detail, "pipeline step failed");
    errors.push(format!("{step}: {detail}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn chunks_cover_range_without_overlap() {
        let chunks = date_chunks(day("2025-08-01"), day("2025-08-07"), 3);
        assert_eq!(
            chunks,
            vec![
                (day("2025-08-01"), day("2025-08-03")),
                (day("2025-08-04"), day("2025-08-06")),
                (day("2025-08-07"), day("2025-08-07")),
            ]
        );
    }

    #[test]
    fn oversized_chunk_is_single_range() {
        let chunks = date_chunks(day("2025-08-01"), day("2025-08-07"), i64::MAX);
        assert_eq!(chunks, vec![(day("2025-08-01"), day("2025-08-07"))]);
    }

    #[test]
    fn empty_when_range_inverted() {
        assert!(date_chunks(day("2025-08-02"), day("2025-08-01"), 1).is_empty());
    }
}
