use chrono::NaiveDate;
use rusqlite::params;

use footy_pipeline::config::League;
use footy_pipeline::dashboard::{load_dashboard_rows, render_plain};
use footy_pipeline::db::{FixtureRecord, open_in_memory, upsert_fixtures, upsert_team_profile};

fn upcoming(id: &str, kickoff: &str, home: &str, away: &str) -> FixtureRecord {
    FixtureRecord {
        fixture_id: id.to_string(),
        league: League::Epl,
        season: "2025/2026".to_string(),
        utc_kickoff: kickoff.to_string(),
        home_team_id: Some(home.to_string()),
        away_team_id: Some(away.to_string()),
        status: "NS".to_string(),
        home_goals: None,
        away_goals: None,
    }
}

#[test]
fn lists_todays_and_later_fixtures_in_kickoff_order() {
    let mut conn = open_in_memory().expect("db");
    upsert_fixtures(
        &mut conn,
        &[
            upcoming("late", "2025-09-02T19:30:00Z", "fd_73", "fd_76"),
            upcoming("past", "2025-08-31T15:00:00Z", "fd_57", "fd_61"),
            upcoming("early", "2025-09-01T00:30:00Z", "fd_66", "fd_65"),
        ],
    )
    .expect("fixtures");
    upsert_team_profile(&conn, "fd_66", Some("Manchester United FC"), Some("England")).expect("team");
    upsert_team_profile(&conn, "fd_65", Some("Manchester City FC"), None).expect("team");
    conn.execute(
        "INSERT INTO probs (fixture_id, p_home, p_draw, p_away, model, ts_utc) VALUES (?1, ?2, ?3, ?4, 'elo-davidson', '')",
        params!["early", 0.4567, 0.27, 0.2733],
    )
    .expect("probs");

    let today = NaiveDate::from_ymd_opt(2025, 9, 1).expect("date");
    let rows = load_dashboard_rows(&conn, today).expect("rows");
    let ids = rows.iter().map(|r| r.fixture_id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["early", "late"]);

    assert_eq!(rows[0].home, "Manchester United FC");
    assert_eq!(rows[0].p_home, Some(0.4567));
    assert_eq!(rows[0].model.as_deref(), Some("elo-davidson"));
    // No team profile and no probabilities yet.
    assert_eq!(rows[1].home, "fd_73");
    assert_eq!(rows[1].p_home, None);

    let table = render_plain(&rows);
    assert!(table.contains("0.457"));
    assert!(table.contains("Manchester City FC"));
    assert_eq!(table.lines().count(), 4);
}
