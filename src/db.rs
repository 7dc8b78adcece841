use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, Transaction, params};

use crate::config::League;

/// A fixture as delivered by a provider, already mapped to internal ids.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureRecord {
    pub fixture_id: String,
    pub league: League,
    pub season: String,
    /// Canonical `YYYY-MM-DDTHH:MM:SSZ`.
    pub utc_kickoff: String,
    pub home_team_id: Option<String>,
    pub away_team_id: Option<String>,
    pub status: String,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OddsRow {
    pub fixture_id: String,
    pub bookmaker: String,
    pub market: String,
    pub selection: String,
    pub price: f64,
    pub ts_utc: Option<String>,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create db dir {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
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
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS teams (
            team_id TEXT PRIMARY KEY,
            name TEXT NULL,
            country TEXT NULL,
            alias TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE IF NOT EXISTS fixtures (
            fixture_id TEXT PRIMARY KEY,
            league TEXT NOT NULL,
            season TEXT NOT NULL,
            utc_kickoff TEXT NOT NULL,
            home_team_id TEXT NULL,
            away_team_id TEXT NULL,
            status TEXT NOT NULL,
            home_goals INTEGER NULL,
            away_goals INTEGER NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(league, season, utc_kickoff, home_team_id, away_team_id)
        );
        CREATE INDEX IF NOT EXISTS idx_fixtures_league_kickoff ON fixtures(league, utc_kickoff);
        CREATE INDEX IF NOT EXISTS idx_fixtures_status ON fixtures(status);

        CREATE TABLE IF NOT EXISTS odds (
            fixture_id TEXT NOT NULL,
            bookmaker TEXT NOT NULL,
            market TEXT NOT NULL,
            selection TEXT NOT NULL,
            price REAL NOT NULL,
            ts_utc TEXT NOT NULL DEFAULT '',
            PRIMARY KEY(fixture_id, bookmaker, market, selection, ts_utc)
        );

        CREATE TABLE IF NOT EXISTS xg (
            fixture_id TEXT PRIMARY KEY,
            home_xg REAL NOT NULL,
            away_xg REAL NOT NULL,
            source TEXT NOT NULL,
            ts_utc TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ratings_elo (
            ts_utc TEXT NOT NULL,
            team_id TEXT NOT NULL,
            rating REAL NOT NULL,
            PRIMARY KEY(ts_utc, team_id)
        );

        CREATE TABLE IF NOT EXISTS elo_applied (
            fixture_id TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS probs (
            fixture_id TEXT PRIMARY KEY,
            p_home REAL NOT NULL,
            p_draw REAL NOT NULL,
            p_away REAL NOT NULL,
            model TEXT NOT NULL,
            ts_utc TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pipeline_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            leagues TEXT NOT NULL,
            fixtures_upserted INTEGER NOT NULL DEFAULT 0,
            odds_written INTEGER NOT NULL DEFAULT 0,
            fixtures_rated INTEGER NOT NULL DEFAULT 0,
            probs_written INTEGER NOT NULL DEFAULT 0,
            errors_json TEXT NOT NULL DEFAULT '[]'
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Insert new fixtures and refresh kickoff/status/score of known ones.
///
/// Rows that collide on the (league, season, kickoff, home, away) key under a
/// different fixture id are ignored, so two providers reporting the same match
/// never produce two records. Returns the number of rows written.
pub fn upsert_fixtures(conn: &mut Connection, rows: &[FixtureRecord]) -> Result<usize> {
    let tx = conn.transaction().context("begin fixture transaction")?;
    let mut written = 0usize;
    for row in rows {
        written += upsert_fixture(&tx, row)?;
    }
    tx.commit().context("commit fixture transaction")?;
    Ok(written)
}

fn upsert_fixture(tx: &Transaction<'_>, f: &FixtureRecord) -> Result<usize> {
    let changed = tx
        .execute(
            r#"
            INSERT INTO fixtures (
                fixture_id, league, season, utc_kickoff,
                home_team_id, away_team_id, status,
                home_goals, away_goals, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(fixture_id) DO UPDATE SET
                utc_kickoff = excluded.utc_kickoff,
                status = excluded.status,
                home_goals = excluded.home_goals,
                away_goals = excluded.away_goals,
                updated_at = excluded.updated_at
            ON CONFLICT DO NOTHING
            "#,
            params![
                f.fixture_id,
                f.league.key(),
                f.season,
                f.utc_kickoff,
                f.home_team_id,
                f.away_team_id,
                f.status,
                f.home_goals,
                f.away_goals,
                Utc::now().to_rfc3339(),
            ],
        )
        .with_context(|| format!("upsert fixture {}", f.fixture_id))?;
    Ok(changed)
}

/// Create the team row if missing and fill in display name / country when known.
pub fn upsert_team_profile(
    conn: &Connection,
    team_id: &str,
    name: Option<&str>,
    country: Option<&str>,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO teams (team_id, name, country, alias) VALUES (?1, ?2, ?3, '[]')
        ON CONFLICT(team_id) DO UPDATE SET
            name = COALESCE(excluded.name, teams.name),
            country = COALESCE(excluded.country, teams.country)
        "#,
        params![team_id, name, country],
    )
    .with_context(|| format!("upsert team profile {team_id}"))?;
    Ok(())
}

pub fn insert_odds(conn: &mut Connection, rows: &[OddsRow]) -> Result<usize> {
    let tx = conn.transaction().context("begin odds transaction")?;
    let mut written = 0usize;
    for row in rows {
        written += tx
            .execute(
                r#"
                INSERT OR IGNORE INTO odds
                    (fixture_id, bookmaker, market, selection, price, ts_utc)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    row.fixture_id,
                    row.bookmaker,
                    row.market,
                    row.selection,
                    row.price,
                    row.ts_utc.as_deref().unwrap_or_default(),
                ],
            )
            .context("insert odds row")?;
    }
    tx.commit().context("commit odds transaction")?;
    Ok(written)
}

pub fn upsert_xg(conn: &Connection, fixture_id: &str, home_xg: f64, away_xg: f64) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO xg (fixture_id, home_xg, away_xg, source, ts_utc)
        VALUES (?1, ?2, ?3, 'understat', ?4)
        ON CONFLICT(fixture_id) DO UPDATE SET
            home_xg = excluded.home_xg,
            away_xg = excluded.away_xg,
            source = excluded.source,
            ts_utc = excluded.ts_utc
        "#,
        params![fixture_id, home_xg, away_xg, Utc::now().to_rfc3339()],
    )
    .with_context(|| format!("upsert xg for {fixture_id}"))?;
    Ok(())
}

/// Counts recorded for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunCounts {
    pub fixtures_upserted: usize,
    pub odds_written: usize,
    pub fixtures_rated: usize,
    pub probs_written: usize,
}

pub fn begin_run(conn: &Connection, leagues: &[League]) -> Result<i64> {
    let keys = leagues.iter().map(|l| l.key()).collect::<Vec<_>>().join(",");
    conn.execute(
        "INSERT INTO pipeline_runs(started_at, finished_at, leagues) VALUES (?1, NULL, ?2)",
        params![Utc::now().to_rfc3339(), keys],
    )
    .context("insert pipeline run")?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_run(conn: &Connection, run_id: i64, counts: &RunCounts, errors: &[String]) -> Result<()> {
    let errors_json = serde_json::to_string(errors).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        r#"
        UPDATE pipeline_runs
        SET finished_at = ?1, fixtures_upserted = ?2, odds_written = ?3,
            fixtures_rated = ?4, probs_written = ?5, errors_json = ?6
        WHERE run_id = ?7
        "#,
        params![
            Utc::now().to_rfc3339(),
            counts.fixtures_upserted as i64,
            counts.odds_written as i64,
            counts.fixtures_rated as i64,
            counts.probs_written as i64,
            errors_json,
            run_id
        ],
    )
    .context("update pipeline run")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(id: &str, kickoff: &str, status: &str) -> FixtureRecord {
        FixtureRecord {
            fixture_id: id.to_string(),
            league: League::Epl,
            season: "2025/2026".to_string(),
            utc_kickoff: kickoff.to_string(),
            home_team_id: Some("fd_1".to_string()),
            away_team_id: Some("fd_2".to_string()),
            status: status.to_string(),
            home_goals: None,
            away_goals: None,
        }
    }

    #[test]
    fn upsert_updates_status_and_ignores_cross_provider_duplicates() {
        let mut conn = open_in_memory().expect("db");
        let first = fixture("fd_100", "2025-09-01T15:00:00Z", "NS");
        assert_eq!(upsert_fixtures(&mut conn, &[first.clone()]).expect("insert"), 1);

        let mut finished = first.clone();
        finished.status = "FT".to_string();
        finished.home_goals = Some(2);
        finished.away_goals = Some(0);
        assert_eq!(upsert_fixtures(&mut conn, &[finished]).expect("update"), 1);

        // Same match key, different id: ignored.
        let dup = fixture("fd_999", "2025-09-01T15:00:00Z", "NS");
        assert_eq!(upsert_fixtures(&mut conn, &[dup]).expect("dup"), 0);

        let (count, status, goals): (i64, String, Option<i32>) = conn
            .query_row(
                "SELECT COUNT(*), MAX(status), MAX(home_goals) FROM fixtures",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .expect("query");
        assert_eq!(count, 1);
        assert_eq!(status, "FT");
        assert_eq!(goals, Some(2));
    }

    #[test]
    fn odds_insert_is_idempotent() {
        let mut conn = open_in_memory().expect("db");
        let row = OddsRow {
            fixture_id: "fd_100".to_string(),
            bookmaker: "pinnacle".to_string(),
            market: "1X2".to_string(),
            selection: "Arsenal".to_string(),
            price: 1.85,
            ts_utc: Some("2025-09-01T10:00:00Z".to_string()),
        };
        assert_eq!(insert_odds(&mut conn, &[row.clone()]).expect("first"), 1);
        assert_eq!(insert_odds(&mut conn, &[row]).expect("second"), 0);
    }

    #[test]
    fn team_profile_keeps_existing_aliases() {
        let conn = open_in_memory().expect("db");
        conn.execute(
            "INSERT INTO teams(team_id, alias) VALUES ('fd_57', '[\"arsenal\"]')",
            [],
        )
        .expect("seed");
        upsert_team_profile(&conn, "fd_57", Some("Arsenal FC"), Some("England")).expect("profile");
        let (name, alias): (String, String) = conn
            .query_row(
                "SELECT name, alias FROM teams WHERE team_id = 'fd_57'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("query");
        assert_eq!(name, "Arsenal FC");
        assert_eq!(alias, "[\"arsenal\"]");
    }

    #[test]
    fn open_db_reports_unusable_parent_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "not a dir").expect("write");

        let err = open_db(&blocker.join("footy.sqlite")).expect_err("parent is a file");
        assert!(format!("{err:#}").contains("create db dir"));

        let ok = open_db(&dir.path().join("nested").join("footy.sqlite"));
        assert!(ok.is_ok());
    }
}
