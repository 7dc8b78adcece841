use chrono::{TimeZone, Utc};
use rusqlite::Connection;

use footy_pipeline::config::{AppConfig, EloSettings, League};
use footy_pipeline::db::{FixtureRecord, open_in_memory, upsert_fixtures};
use footy_pipeline::elo::{EloRatings, rate_finished_fixtures};
use footy_pipeline::pipeline::{DailyOptions, PipelineContext, run_daily};
use footy_pipeline::probabilities::{MODEL_NAME, compute_probs_for_upcoming, elo_3way};

fn record(
    id: &str,
    kickoff: &str,
    home: Option<&str>,
    away: Option<&str>,
    status: &str,
    goals: Option<(i32, i32)>,
) -> FixtureRecord {
    FixtureRecord {
        fixture_id: id.to_string(),
        league: League::Epl,
        season: "2025/2026".to_string(),
        utc_kickoff: kickoff.to_string(),
        home_team_id: home.map(str::to_string),
        away_team_id: away.map(str::to_string),
        status: status.to_string(),
        home_goals: goals.map(|g| g.0),
        away_goals: goals.map(|g| g.1),
    }
}

fn seeded() -> Connection {
    let mut conn = open_in_memory().expect("db");
    upsert_fixtures(
        &mut conn,
        &[
            record("f1", "2025-08-16T14:00:00Z", Some("t_a"), Some("t_b"), "FT", Some((2, 0))),
            record("f2", "2025-08-23T14:00:00Z", Some("t_b"), Some("t_c"), "FT", Some((1, 1))),
            // Finished but score missing: not rated.
            record("f3", "2025-08-24T14:00:00Z", Some("t_a"), Some("t_c"), "FT", None),
            record("f4", "2025-09-01T15:00:00Z", Some("t_a"), Some("t_c"), "NS", None),
            record("f5", "2025-09-02T15:00:00Z", Some("t_b"), None, "TBD", None),
        ],
    )
    .expect("fixtures");
    conn
}

#[test]
fn davidson_probabilities_sum_to_one() {
    for (home, away, adv, nu) in [
        (1500.0, 1500.0, 55.0, 0.95),
        (1700.0, 1400.0, 55.0, 0.95),
        (1350.0, 1620.0, 0.0, 1.4),
    ] {
        let p = elo_3way(home, away, adv, nu);
        assert!((p.p_home + p.p_draw + p.p_away - 1.0).abs() < 1e-12);
        assert!(p.p_home > 0.0 && p.p_draw > 0.0 && p.p_away > 0.0);
    }
    let even = elo_3way(1500.0, 1500.0, 55.0, 0.95);
    assert!(even.p_home > even.p_away, "home advantage favours the home side");
    assert_eq!(elo_3way(1500.0, 1500.0, 0.0, 0.0).p_draw, 0.0);
}

#[test]
fn update_is_zero_sum_and_persisted() {
    let conn = open_in_memory().expect("db");
    let mut ratings = EloRatings::new(EloSettings::default());

    let (home, away) = ratings
        .update_match(&conn, "2025-08-16T14:00:00Z", "t_a", "t_b", 1.0)
        .expect("update");
    assert!(home > 1500.0);
    assert!((home + away - 3000.0).abs() < 1e-9);

    // Expected home score with 55 points of advantage is ~0.578.
    assert!((home - 1500.0 - 20.0 * (1.0 - 0.5784)).abs() < 0.01);

    let mut fresh = EloRatings::new(EloSettings::default());
    assert_eq!(fresh.rating(&conn, "t_a").expect("reload"), home);
    assert_eq!(fresh.rating(&conn, "t_unknown").expect("base"), 1500.0);
}

#[test]
fn finished_fixtures_are_rated_once() {
    let mut conn = seeded();
    let mut ratings = EloRatings::new(EloSettings::default());

    assert_eq!(rate_finished_fixtures(&mut conn, &mut ratings).expect("rate"), 2);
    assert_eq!(rate_finished_fixtures(&mut conn, &mut ratings).expect("again"), 0);

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM ratings_elo", [], |row| row.get(0))
        .expect("count");
    assert_eq!(rows, 4);

    // t_b lost away, then only drew at home where it was favoured.
    let t_b = ratings.rating(&conn, "t_b").expect("t_b");
    assert!(t_b < 1500.0);
}

#[test]
fn probabilities_only_for_upcoming_fixtures_without_probs() {
    let mut conn = seeded();
    let mut ratings = EloRatings::new(EloSettings::default());

    // f4 only: f5 has no away team and the rest are finished.
    assert_eq!(compute_probs_for_upcoming(&mut conn, &mut ratings).expect("probs"), 1);
    assert_eq!(compute_probs_for_upcoming(&mut conn, &mut ratings).expect("again"), 0);

    let (fixture_id, sum, model): (String, f64, String) = conn
        .query_row(
            "SELECT fixture_id, p_home + p_draw + p_away, model FROM probs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .expect("probs row");
    assert_eq!(fixture_id, "f4");
    assert!((sum - 1.0).abs() < 1e-9);
    assert_eq!(model, MODEL_NAME);
}

#[test]
fn daily_run_records_failed_steps_and_keeps_going() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_dir = dir.path().to_string_lossy().to_string();
    // No API keys: the fixture step fails, odds are skipped, ratings still run.
    let config = AppConfig::from_lookup(|key| match key {
        "FOOTY_DATA_DIR" => Some(data_dir.clone()),
        _ => None,
    });
    let mut ctx = PipelineContext::with_connection(config, seeded()).expect("context");
    let opts = DailyOptions {
        leagues: vec![League::Epl],
        ..DailyOptions::default()
    };
    let now = Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap();

    let summary = run_daily(&mut ctx, &opts, now).expect("run");
    assert_eq!(summary.counts.fixtures_upserted, 0);
    assert_eq!(summary.counts.odds_written, 0);
    assert_eq!(summary.counts.fixtures_rated, 2);
    assert_eq!(summary.counts.probs_written, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("fixtures EPL"));
    assert!(summary.errors[0].contains("FOOTBALLDATA_KEY"));

    let (finished, probs_written, errors_json): (Option<String>, i64, String) = ctx
        .conn
        .query_row(
            "SELECT finished_at, probs_written, errors_json FROM pipeline_runs WHERE run_id = ?1",
            [summary.run_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .expect("run row");
    assert!(finished.is_some());
    assert_eq!(probs_written, 1);
    assert!(errors_json.contains("FOOTBALLDATA_KEY"));
}
